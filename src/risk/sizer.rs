//! 포지션 크기 계산
//!
//! 손절 거리 기반 수량과 금액 상한 기반 수량 중 작은 쪽을 택한다.

use rust_decimal::prelude::*;

use crate::config::RiskConfig;

/// 주문 수량 계산
///
/// - 위험 기반: `floor(account_balance * risk_fraction / |entry_price - stop_loss|)`
/// - 금액 상한: `floor(max_position_value / entry_price)`
///
/// 손절가가 없거나 진입가와 같으면 금액 상한만 적용한다.
/// 0 은 오류가 아니라 "거래하지 않음" 을 뜻한다.
pub fn size(
    entry_price: Decimal,
    stop_loss: Option<Decimal>,
    account_balance: Decimal,
    risk_fraction: Decimal,
    max_position_value: Decimal,
) -> u64 {
    if entry_price <= Decimal::ZERO {
        return 0;
    }

    let value_based = (max_position_value / entry_price).floor();

    let risk_based = stop_loss
        .map(|stop| (entry_price - stop).abs())
        .filter(|distance| !distance.is_zero())
        .map(|distance| (account_balance * risk_fraction / distance).floor());

    let quantity = match risk_based {
        Some(risk_based) => risk_based.min(value_based),
        None => value_based,
    };

    quantity.max(Decimal::ZERO).to_u64().unwrap_or(0)
}

/// 설정값을 묶어 둔 크기 계산기
#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_fraction: Decimal,
    max_position_value: Decimal,
}

impl PositionSizer {
    pub fn new(config: &RiskConfig) -> Self {
        PositionSizer {
            risk_fraction: config.default_risk_fraction,
            max_position_value: config.max_position_value,
        }
    }

    pub fn risk_fraction(&self) -> Decimal {
        self.risk_fraction
    }

    pub fn max_position_value(&self) -> Decimal {
        self.max_position_value
    }

    /// 기본 위험 비율로 계산
    pub fn size(&self, entry_price: Decimal, stop_loss: Option<Decimal>, account_balance: Decimal) -> u64 {
        self.size_with_risk(entry_price, stop_loss, account_balance, self.risk_fraction)
    }

    pub fn size_with_risk(
        &self,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        account_balance: Decimal,
        risk_fraction: Decimal,
    ) -> u64 {
        self.size_capped(entry_price, stop_loss, account_balance, risk_fraction, self.max_position_value)
    }

    /// 금액 상한을 직접 지정. 설정된 상한보다 커질 수는 없다
    pub fn size_capped(
        &self,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        account_balance: Decimal,
        risk_fraction: Decimal,
        max_value: Decimal,
    ) -> u64 {
        let cap = max_value.min(self.max_position_value);
        let quantity = size(entry_price, stop_loss, account_balance, risk_fraction, cap);
        log::debug!(
            "포지션 크기 계산: 진입 ${} 손절 {:?} 잔고 ${} 위험 {} -> {}",
            entry_price, stop_loss, account_balance, risk_fraction, quantity
        );
        quantity
    }
}
