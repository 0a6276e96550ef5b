//! 청산 조건 평가
//!
//! `ExitEvaluator` 는 손절/익절 가격만 본다. 신호 기반 청산은
//! `SignalExitPolicy` 의 결정 테이블을 오케스트레이터가 호출한다.

use rust_decimal::Decimal;

use crate::config::ExitPolicyConfig;
use crate::models::position::{Position, PositionType};
use crate::signals::Confidence;

#[derive(Debug, Clone, PartialEq)]
pub enum ExitDecision {
    Hold,
    Close { reason: String },
    PartialClose { quantity: u64, reason: String },
}

impl ExitDecision {
    pub fn is_hold(&self) -> bool {
        matches!(self, ExitDecision::Hold)
    }

    /// 청산할 수량. 전량 청산은 None
    pub fn close_quantity(&self) -> Option<u64> {
        match self {
            ExitDecision::PartialClose { quantity, .. } => Some(*quantity),
            _ => None,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ExitDecision::Hold => "hold",
            ExitDecision::Close { reason } | ExitDecision::PartialClose { reason, .. } => reason,
        }
    }
}

/// 손절/익절 평가기
pub struct ExitEvaluator;

impl ExitEvaluator {
    /// 현재가를 먼저 반영한 뒤 평가
    pub fn mark_and_evaluate(position: &mut Position, price: Decimal) -> ExitDecision {
        position.mark_price(price);
        Self::evaluate(position)
    }

    /// 현재가 기준 청산 여부. 현재가가 없으면 보유
    pub fn evaluate(position: &Position) -> ExitDecision {
        let Some(price) = position.current_price else {
            return ExitDecision::Hold;
        };

        if let Some(stop) = position.stop_loss {
            let crossed = match position.position_type {
                PositionType::Long => price <= stop,
                PositionType::Short => price >= stop,
            };
            if crossed {
                return ExitDecision::Close {
                    reason: format!("Stop loss triggered at ${} (stop ${})", price, stop),
                };
            }
        }

        if let Some(target) = position.take_profit {
            let crossed = match position.position_type {
                PositionType::Long => price >= target,
                PositionType::Short => price <= target,
            };
            if crossed {
                return ExitDecision::Close {
                    reason: format!("Take profit triggered at ${} (target ${})", price, target),
                };
            }
        }

        ExitDecision::Hold
    }
}

/// 보유 포지션에 반대 신호가 들어왔을 때의 결정 테이블
#[derive(Debug, Clone)]
pub struct SignalExitPolicy {
    /// 이 손익률(%) 이하이면 신뢰도와 무관하게 전량 청산
    pub loss_exit_pct: Decimal,
    /// medium 신뢰도에서 절반 익절하는 손익률(%) 기준
    pub profit_take_pct: Decimal,
    /// medium 신뢰도에서 절반 축소하는 소폭 손실 하한(%)
    pub small_loss_pct: Decimal,
}

impl SignalExitPolicy {
    pub fn new(config: &ExitPolicyConfig) -> Self {
        SignalExitPolicy {
            loss_exit_pct: config.loss_exit_pct,
            profit_take_pct: config.profit_take_pct,
            small_loss_pct: config.small_loss_pct,
        }
    }

    /// 신뢰도와 미실현 손익률로 청산 결정
    pub fn decide(&self, confidence: Confidence, pnl_pct: Decimal, held_quantity: u64) -> ExitDecision {
        if held_quantity == 0 {
            return ExitDecision::Hold;
        }

        if confidence == Confidence::High {
            return ExitDecision::Close { reason: "High confidence exit signal".to_string() };
        }

        if pnl_pct <= self.loss_exit_pct {
            return ExitDecision::Close {
                reason: format!("Capital preservation exit at {}% loss", pnl_pct.round_dp(1)),
            };
        }

        if confidence == Confidence::Medium && pnl_pct > self.profit_take_pct {
            return Self::half(held_quantity, format!("Taking partial profits at {}% gain", pnl_pct.round_dp(1)));
        }

        if confidence == Confidence::Medium && pnl_pct > self.small_loss_pct && pnl_pct < Decimal::ZERO {
            return Self::half(held_quantity, "Reducing position due to medium confidence signal".to_string());
        }

        ExitDecision::Hold
    }

    fn half(held_quantity: u64, reason: String) -> ExitDecision {
        let quantity = (held_quantity / 2).max(1);
        if quantity >= held_quantity {
            ExitDecision::Close { reason }
        } else {
            ExitDecision::PartialClose { quantity, reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn long_with_stop(entry: Decimal, stop: Option<Decimal>, target: Option<Decimal>) -> Position {
        Position::new("CBA.AX", PositionType::Long, 10, entry, stop, target, "DEAL-1").unwrap()
    }

    #[test]
    fn test_long_stop_loss_crossed() {
        let mut position = long_with_stop(dec!(50), Some(dec!(48)), None);
        let decision = ExitEvaluator::mark_and_evaluate(&mut position, dec!(47.5));
        assert!(matches!(decision, ExitDecision::Close { .. }));
        assert_eq!(position.unrealized_pnl, Some(dec!(-25)));
    }

    #[test]
    fn test_stop_at_exact_price_closes() {
        let mut position = long_with_stop(dec!(50), Some(dec!(48)), None);
        assert!(!ExitEvaluator::mark_and_evaluate(&mut position, dec!(48)).is_hold());
    }

    #[test]
    fn test_short_take_profit_crossed() {
        let mut position = Position::new("BHP.AX", PositionType::Short, 10, dec!(80), None, Some(dec!(70)), "D").unwrap();
        let decision = ExitEvaluator::mark_and_evaluate(&mut position, dec!(69));
        assert!(decision.reason().starts_with("Take profit"));
    }

    #[test]
    fn test_short_stop_loss_crossed() {
        let mut position = Position::new("BHP.AX", PositionType::Short, 10, dec!(80), Some(dec!(84)), None, "D").unwrap();
        assert!(ExitEvaluator::mark_and_evaluate(&mut position, dec!(83.99)).is_hold());
        assert!(ExitEvaluator::mark_and_evaluate(&mut position, dec!(84.01)).reason().starts_with("Stop loss"));
    }

    #[test]
    fn test_holds_between_levels_and_without_levels() {
        let mut position = long_with_stop(dec!(50), Some(dec!(48)), Some(dec!(55)));
        assert!(ExitEvaluator::mark_and_evaluate(&mut position, dec!(51)).is_hold());

        let mut bare = long_with_stop(dec!(50), None, None);
        assert!(ExitEvaluator::mark_and_evaluate(&mut bare, dec!(1)).is_hold());
        assert!(ExitEvaluator::evaluate(&long_with_stop(dec!(50), Some(dec!(48)), None)).is_hold());
    }

    fn policy() -> SignalExitPolicy {
        SignalExitPolicy::new(&ExitPolicyConfig::default())
    }

    #[rstest]
    #[case::high_small_gain(Confidence::High, dec!(3), ExitDecision::Close { reason: String::new() })]
    #[case::high_big_loss(Confidence::High, dec!(-20), ExitDecision::Close { reason: String::new() })]
    #[case::low_deep_loss(Confidence::Low, dec!(-8.5), ExitDecision::Close { reason: String::new() })]
    #[case::low_loss_at_threshold(Confidence::Low, dec!(-8), ExitDecision::Close { reason: String::new() })]
    #[case::medium_deep_loss(Confidence::Medium, dec!(-12), ExitDecision::Close { reason: String::new() })]
    #[case::medium_big_gain(Confidence::Medium, dec!(12.5), ExitDecision::PartialClose { quantity: 50, reason: String::new() })]
    #[case::medium_small_loss(Confidence::Medium, dec!(-2), ExitDecision::PartialClose { quantity: 50, reason: String::new() })]
    #[case::medium_gain_at_threshold(Confidence::Medium, dec!(10), ExitDecision::Hold)]
    #[case::medium_loss_at_floor(Confidence::Medium, dec!(-5), ExitDecision::Hold)]
    #[case::medium_moderate_loss(Confidence::Medium, dec!(-6.5), ExitDecision::Hold)]
    #[case::medium_flat(Confidence::Medium, dec!(0), ExitDecision::Hold)]
    #[case::low_small_loss(Confidence::Low, dec!(-2), ExitDecision::Hold)]
    #[case::low_big_gain(Confidence::Low, dec!(25), ExitDecision::Hold)]
    fn test_signal_exit_table(#[case] confidence: Confidence, #[case] pnl_pct: Decimal, #[case] expected: ExitDecision) {
        let decision = policy().decide(confidence, pnl_pct, 100);
        match (&decision, &expected) {
            (ExitDecision::Hold, ExitDecision::Hold) => {}
            (ExitDecision::Close { .. }, ExitDecision::Close { .. }) => {}
            (ExitDecision::PartialClose { quantity, .. }, ExitDecision::PartialClose { quantity: want, .. }) => {
                assert_eq!(quantity, want)
            }
            _ => panic!("expected {:?}, got {:?}", expected, decision),
        }
    }

    #[test]
    fn test_half_of_single_share_becomes_full_close() {
        let decision = policy().decide(Confidence::Medium, dec!(-1), 1);
        assert!(matches!(decision, ExitDecision::Close { .. }));

        let decision = policy().decide(Confidence::Medium, dec!(-1), 7);
        assert_eq!(decision.close_quantity(), Some(3));
    }
}
