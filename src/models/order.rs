use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

/// 게이트웨이 체결 결과 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Success,
    Simulated,
    Error,
}

impl ExecutionStatus {
    /// 주문이 실제로(또는 모의로) 체결되었는지
    pub fn is_filled(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Simulated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRequest {
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    pub order_type: OrderType,
    /// 시장가 주문의 기준 가격. 지정가가 아니다
    pub reference_price: Option<Decimal>,
}

impl TradeRequest {
    pub fn market(symbol: impl Into<String>, direction: Direction, quantity: u64) -> Self {
        TradeRequest {
            symbol: symbol.into(),
            direction,
            quantity,
            order_type: OrderType::Market,
            reference_price: None,
        }
    }

    /// 모의 체결 시 참고 가격
    pub fn with_reference_price(mut self, price: Decimal) -> Self {
        self.reference_price = Some(price);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    pub deal_reference: Option<String>,
    pub reason: Option<String>,
    pub fill_price: Option<Decimal>,
}

impl ExecutionReport {
    pub fn filled(status: ExecutionStatus, deal_reference: impl Into<String>) -> Self {
        ExecutionReport {
            status,
            deal_reference: Some(deal_reference.into()),
            reason: None,
            fill_price: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        ExecutionReport {
            status: ExecutionStatus::Error,
            deal_reference: None,
            reason: Some(reason.into()),
            fill_price: None,
        }
    }

    pub fn with_fill_price(mut self, price: Decimal) -> Self {
        self.fill_price = Some(price);
        self
    }
}

/// 브로커가 보고하는 보유 포지션
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerPosition {
    pub symbol: String,
    pub direction: Direction,
    pub size: u64,
    pub level: Decimal,
    pub bid: Option<Decimal>,
    pub deal_id: String,
}
