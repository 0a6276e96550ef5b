//! 포지션 경보
//!
//! 손익률 급변, 손절/익절가 근접을 감지한다. 경보 전달(알림)은 다루지 않고 로그로만 남긴다.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::config::AlertConfig;
use crate::models::position::Position;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PositionLoss,
    PositionGain,
    StopLossNear,
    TakeProfitNear,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PositionAlert {
    pub symbol: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub current_price: Decimal,
    pub trigger_value: Decimal,
}

/// 활성 포지션별 경보 생성
pub fn check_position_alerts(positions: &[Position], config: &AlertConfig) -> Vec<PositionAlert> {
    let mut alerts = Vec::new();

    for position in positions.iter().filter(|p| p.is_active()) {
        let Some(price) = position.current_price else {
            continue;
        };
        let pnl_pct = position.pnl_percentage();
        let pnl = position.unrealized_pnl.unwrap_or(Decimal::ZERO);

        if pnl_pct <= config.loss_pct {
            alerts.push(PositionAlert {
                symbol: position.symbol.clone(),
                alert_type: AlertType::PositionLoss,
                severity: if pnl_pct <= config.severe_loss_pct { Severity::High } else { Severity::Medium },
                message: format!("Position {} down {}% (${})", position.symbol, pnl_pct.abs().round_dp(1), pnl.round_dp(2)),
                current_price: price,
                trigger_value: pnl_pct,
            });
        } else if pnl_pct >= config.gain_pct {
            alerts.push(PositionAlert {
                symbol: position.symbol.clone(),
                alert_type: AlertType::PositionGain,
                severity: Severity::Medium,
                message: format!("Position {} up {}% (${})", position.symbol, pnl_pct.round_dp(1), pnl.round_dp(2)),
                current_price: price,
                trigger_value: pnl_pct,
            });
        }

        if let Some(stop) = position.stop_loss {
            if (price - stop).abs() / price <= config.proximity_ratio {
                alerts.push(PositionAlert {
                    symbol: position.symbol.clone(),
                    alert_type: AlertType::StopLossNear,
                    severity: Severity::High,
                    message: format!("Position {} approaching stop loss: ${} (stop: ${})", position.symbol, price, stop),
                    current_price: price,
                    trigger_value: stop,
                });
            }
        }

        if let Some(target) = position.take_profit {
            if (price - target).abs() / price <= config.proximity_ratio {
                alerts.push(PositionAlert {
                    symbol: position.symbol.clone(),
                    alert_type: AlertType::TakeProfitNear,
                    severity: Severity::Medium,
                    message: format!("Position {} approaching take profit: ${} (target: ${})", position.symbol, price, target),
                    current_price: price,
                    trigger_value: target,
                });
            }
        }
    }

    alerts
}
