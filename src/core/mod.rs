//! 포지션 관리 엔진의 핵심 구현체

pub mod monitor;
pub mod position_manager;
pub mod trading_cycle;

pub use monitor::{MonitorReport, PositionMonitor};
pub use position_manager::{Outcome, PortfolioSummary, PositionManager, UpdateReport};
pub use trading_cycle::{CycleReport, TradingCycle};
