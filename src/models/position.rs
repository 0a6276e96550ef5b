use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TradingError;
use crate::models::order::Direction;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionType {
    Long,
    Short,
}

impl PositionType {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Buy => PositionType::Long,
            Direction::Sell => PositionType::Short,
        }
    }

    /// 진입 주문 방향
    pub fn opening_direction(&self) -> Direction {
        match self {
            PositionType::Long => Direction::Buy,
            PositionType::Short => Direction::Sell,
        }
    }

    /// 청산 주문 방향
    pub fn closing_direction(&self) -> Direction {
        match self {
            PositionType::Long => Direction::Sell,
            PositionType::Short => Direction::Buy,
        }
    }

    fn sign(&self) -> i64 {
        match self {
            PositionType::Long => 1,
            PositionType::Short => -1,
        }
    }
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionType::Long => write!(f, "LONG"),
            PositionType::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Partial,
    Closed,
}

impl PositionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, PositionStatus::Open | PositionStatus::Partial)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "OPEN"),
            PositionStatus::Partial => write!(f, "PARTIAL"),
            PositionStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// 원장 내 포지션 식별 키
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub symbol: String,
    pub position_type: PositionType,
    pub deal_reference: String,
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.position_type, self.deal_reference)
    }
}

/// 보유 포지션
///
/// 수량은 부호 있는 정수이다. LONG은 양수, SHORT는 음수로 저장하며
/// 손익은 항상 `(현재가 - 진입가) * quantity` 로 계산한다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: Decimal,
    pub entry_date: DateTime<Utc>,
    pub position_type: PositionType,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
    pub deal_reference: String,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// 새 포지션 생성
    ///
    /// `quantity` 는 절대 수량이며 부호는 `position_type` 에서 결정된다.
    pub fn new(
        symbol: impl Into<String>,
        position_type: PositionType,
        quantity: u64,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        deal_reference: impl Into<String>,
    ) -> Result<Self, TradingError> {
        let quantity = i64::try_from(quantity)
            .map_err(|_| TradingError::InvalidPosition(format!("quantity {} out of range", quantity)))?;
        let now = Utc::now();
        let position = Position {
            symbol: symbol.into(),
            quantity: quantity * position_type.sign(),
            entry_price,
            entry_date: now,
            position_type,
            stop_loss,
            take_profit,
            current_price: None,
            unrealized_pnl: None,
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            deal_reference: deal_reference.into(),
            updated_at: now,
        };
        position.validate()?;
        Ok(position)
    }

    /// 불변 조건 검증
    pub fn validate(&self) -> Result<(), TradingError> {
        let invalid = |msg: String| Err(TradingError::InvalidPosition(format!("{}: {}", self.symbol, msg)));

        if self.symbol.trim().is_empty() {
            return Err(TradingError::InvalidPosition("symbol must not be empty".to_string()));
        }
        if self.entry_price <= Decimal::ZERO {
            return invalid(format!("entry price must be positive, got {}", self.entry_price));
        }
        if let Some(price) = self.current_price {
            if price <= Decimal::ZERO {
                return invalid(format!("current price must be positive, got {}", price));
            }
        }
        if self.status.is_active() {
            if self.quantity == 0 {
                return invalid(format!("quantity must be non-zero while {}", self.status));
            }
            if self.quantity.signum() != self.position_type.sign() {
                return invalid(format!("quantity {} does not match {}", self.quantity, self.position_type));
            }
        }

        match self.position_type {
            PositionType::Long => {
                if let Some(stop) = self.stop_loss {
                    if stop >= self.entry_price {
                        return invalid(format!("LONG stop loss {} must be below entry {}", stop, self.entry_price));
                    }
                }
                if let Some(target) = self.take_profit {
                    if target <= self.entry_price {
                        return invalid(format!("LONG take profit {} must be above entry {}", target, self.entry_price));
                    }
                }
            }
            PositionType::Short => {
                if let Some(stop) = self.stop_loss {
                    if stop <= self.entry_price {
                        return invalid(format!("SHORT stop loss {} must be above entry {}", stop, self.entry_price));
                    }
                }
                if let Some(target) = self.take_profit {
                    if target >= self.entry_price {
                        return invalid(format!("SHORT take profit {} must be below entry {}", target, self.entry_price));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            position_type: self.position_type,
            deal_reference: self.deal_reference.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// 보유 절대 수량
    pub fn held_quantity(&self) -> u64 {
        self.quantity.unsigned_abs()
    }

    pub fn is_long(&self) -> bool {
        self.position_type == PositionType::Long
    }

    pub fn is_short(&self) -> bool {
        self.position_type == PositionType::Short
    }

    /// 현재가 갱신 후 미실현 손익 재계산
    pub fn mark_price(&mut self, price: Decimal) {
        self.current_price = Some(price);
        self.unrealized_pnl = Some(self.pnl_at(price, self.quantity));
        self.updated_at = Utc::now();
    }

    /// 주어진 가격과 부호 있는 수량에 대한 손익
    pub fn pnl_at(&self, price: Decimal, signed_quantity: i64) -> Decimal {
        (price - self.entry_price) * Decimal::from(signed_quantity)
    }

    /// 현재 포지션 가치 (현재가가 없으면 진입가 기준)
    pub fn position_value(&self) -> Decimal {
        self.current_price.unwrap_or(self.entry_price) * Decimal::from(self.held_quantity())
    }

    /// 진입 금액 대비 미실현 손익률 (%)
    pub fn pnl_percentage(&self) -> Decimal {
        let Some(pnl) = self.unrealized_pnl else {
            return Decimal::ZERO;
        };
        let entry_value = self.entry_price * Decimal::from(self.held_quantity());
        if entry_value > Decimal::ZERO {
            pnl / entry_value * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        }
    }

    pub fn closing_direction(&self) -> Direction {
        self.position_type.closing_direction()
    }
}
