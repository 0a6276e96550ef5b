//! 포지션 및 리스크 관리 엔진
//!
//! 매매 신호를 위험 한도 안의 주문으로 바꾸고, 보유 포지션을 시세에 맞춰 추적하며
//! 손절/익절/신호 조건에 따라 청산합니다.

pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod market_data;
pub mod models;
pub mod risk;
pub mod signals;
pub mod utils;

// 핵심 타입 재노출
pub use crate::config::Config;
pub use crate::core::{Outcome, PortfolioSummary, PositionManager, PositionMonitor, TradingCycle};
pub use crate::error::TradingError;
pub use crate::gateway::{OrderGateway, SimulatedGateway};
pub use crate::ledger::{PositionLedger, PositionStore};
pub use crate::market_data::QuoteFeed;
pub use crate::models::position::{Position, PositionKey, PositionStatus, PositionType};
pub use crate::signals::{Confidence, Signal, SignalAction, SignalSource};

/// 버전 정보
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 결과 타입 별칭
pub type Result<T> = std::result::Result<T, TradingError>;
