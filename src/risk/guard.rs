//! 노출 한도 검사
//!
//! 부수 효과 없는 순수 판정 함수. 입력만으로 결과가 정해진다.

use rust_decimal::Decimal;

use crate::models::position::{Position, PositionType};

/// 신규 포지션 허용 여부와 사유
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    pub reason: String,
}

impl Admission {
    fn allow() -> Self {
        Admission { allowed: true, reason: "Position can be opened".to_string() }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Admission { allowed: false, reason: reason.into() }
    }
}

/// 노출 한도
#[derive(Debug, Clone, Copy)]
pub struct ExposureLimits {
    pub max_trade_value: Decimal,
    pub max_portfolio_exposure_ratio: Decimal,
}

/// 활성 포지션의 총 노출 금액
pub fn total_exposure(positions: &[Position]) -> Decimal {
    positions
        .iter()
        .filter(|p| p.is_active())
        .map(|p| p.position_value())
        .sum()
}

pub fn duplicate_reason(symbol: &str, position_type: PositionType) -> String {
    format!("{} position already exists for {}", position_type, symbol)
}

/// 신규 포지션 허용 판정. 첫 번째 실패에서 멈춘다.
///
/// 1. 같은 (심볼, 방향)의 활성 포지션이 없어야 한다
/// 2. 계좌 잔고 > 0
/// 3. (현재 노출 + 신규 금액) / 잔고 <= 최대 노출 비율
/// 4. 신규 금액 <= 거래당 최대 금액
pub fn can_open(
    symbol: &str,
    position_type: PositionType,
    proposed_quantity: u64,
    entry_price: Decimal,
    existing_positions: &[Position],
    account_balance: Decimal,
    limits: ExposureLimits,
) -> Admission {
    let duplicate = existing_positions
        .iter()
        .any(|p| p.is_active() && p.symbol == symbol && p.position_type == position_type);
    if duplicate {
        return Admission::reject(duplicate_reason(symbol, position_type));
    }

    if account_balance <= Decimal::ZERO {
        return Admission::reject("Insufficient account balance");
    }

    let new_value = Decimal::from(proposed_quantity) * entry_price;
    let exposure_ratio = (total_exposure(existing_positions) + new_value) / account_balance;
    if exposure_ratio > limits.max_portfolio_exposure_ratio {
        return Admission::reject(format!(
            "Would exceed maximum portfolio exposure ({}%): projected {}%",
            (limits.max_portfolio_exposure_ratio * Decimal::ONE_HUNDRED).normalize(),
            (exposure_ratio * Decimal::ONE_HUNDRED).round_dp(2).normalize()
        ));
    }

    if new_value > limits.max_trade_value {
        return Admission::reject(format!(
            "Position size exceeds maximum limit (${})",
            limits.max_trade_value.normalize()
        ));
    }

    Admission::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits() -> ExposureLimits {
        ExposureLimits {
            max_trade_value: dec!(10000),
            max_portfolio_exposure_ratio: dec!(0.20),
        }
    }

    fn held(symbol: &str, position_type: PositionType, quantity: u64, price: Decimal) -> Position {
        Position::new(symbol, position_type, quantity, price, None, None, format!("DEAL-{}", symbol)).unwrap()
    }

    #[test]
    fn test_rejects_when_exposure_would_reach_21_percent() {
        let existing = vec![held("CBA.AX", PositionType::Long, 180, dec!(100))];
        let admission = can_open("BHP.AX", PositionType::Long, 30, dec!(100), &existing, dec!(100000), limits());
        assert!(!admission.allowed);
        assert!(admission.reason.contains("exposure"));
    }

    #[test]
    fn test_admits_exactly_at_the_ratio() {
        let existing = vec![held("CBA.AX", PositionType::Long, 180, dec!(100))];
        let admission = can_open("BHP.AX", PositionType::Long, 20, dec!(100), &existing, dec!(100000), limits());
        assert!(admission.allowed, "{}", admission.reason);
    }

    #[test]
    fn test_one_position_per_symbol_and_direction() {
        let existing = vec![held("CBA.AX", PositionType::Long, 1, dec!(100))];
        let admission = can_open("CBA.AX", PositionType::Long, 1, dec!(100), &existing, dec!(100000), limits());
        assert_eq!(admission.reason, "LONG position already exists for CBA.AX");

        let admission = can_open("CBA.AX", PositionType::Short, 1, dec!(100), &existing, dec!(100000), limits());
        assert!(admission.allowed);
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        let existing = vec![held("CBA.AX", PositionType::Long, 1, dec!(100))];
        // 중복과 잔고 부족이 동시에 해당되면 중복이 먼저 보고된다
        let admission = can_open("CBA.AX", PositionType::Long, 1, dec!(100), &existing, Decimal::ZERO, limits());
        assert!(admission.reason.contains("already exists"));

        let admission = can_open("BHP.AX", PositionType::Long, 1, dec!(100), &existing, Decimal::ZERO, limits());
        assert_eq!(admission.reason, "Insufficient account balance");
    }

    #[test]
    fn test_trade_value_cap() {
        let admission = can_open("CBA.AX", PositionType::Long, 101, dec!(100), &[], dec!(1000000), limits());
        assert!(!admission.allowed);
        assert_eq!(admission.reason, "Position size exceeds maximum limit ($10000)");
    }

    #[test]
    fn test_closed_positions_do_not_count() {
        let mut closed = held("CBA.AX", PositionType::Long, 500, dec!(100));
        closed.status = crate::models::position::PositionStatus::Closed;
        let admission = can_open("CBA.AX", PositionType::Long, 10, dec!(100), &[closed], dec!(100000), limits());
        assert!(admission.allowed);
    }

    #[test]
    fn test_never_admits_above_ratio() {
        let existing = vec![
            held("CBA.AX", PositionType::Long, 37, dec!(101.25)),
            held("WES.AX", PositionType::Short, 12, dec!(64.80)),
        ];
        let balance = dec!(25000);
        for quantity in 0..200u64 {
            let admission = can_open("BHP.AX", PositionType::Long, quantity, dec!(43.10), &existing, balance, limits());
            if admission.allowed {
                let projected = total_exposure(&existing) + Decimal::from(quantity) * dec!(43.10);
                assert!(projected / balance <= dec!(0.20));
            }
        }
    }
}
