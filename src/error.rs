/**
* filename : error
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Duplicate position: {0}")]
    DuplicatePosition(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Reconciliation conflict: {0}")]
    ReconciliationConflict(String),

    #[error("Data not found: {0}")]
    DataNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Already running: {0}")]
    AlreadyRunning(String),

    #[error("Not running: {0}")]
    NotRunning(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl TradingError {
    /// 재시도 가능한 I/O 계열 오류인지 확인
    ///
    /// 원장 상태는 이 경로에서 절대 변경되지 않으므로 호출자가 재시도 여부를 결정한다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::GatewayError(_) | TradingError::PersistenceError(_) | TradingError::IoError(_)
        )
    }
}
