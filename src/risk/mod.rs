//! 리스크 관리 모듈
//!
//! 포지션 크기, 노출 한도, 청산 조건, 포지션 경보

pub mod alerts;
pub mod exit;
pub mod guard;
pub mod sizer;

pub use alerts::{check_position_alerts, AlertType, PositionAlert, Severity};
pub use exit::{ExitDecision, ExitEvaluator, SignalExitPolicy};
pub use guard::{can_open, total_exposure, Admission, ExposureLimits};
pub use sizer::PositionSizer;
