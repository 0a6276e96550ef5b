use async_trait::async_trait;
use mockall::automock;

use crate::error::TradingError;
use crate::models::account::AccountInfo;
use crate::models::order::{BrokerPosition, ExecutionReport, TradeRequest};

/// The `OrderGateway` trait is the engine's only route to the broker.
/// It will be implemented by live broker connectors and the in-process simulator.
///
/// `Err` means the call itself failed (network, non-2xx, malformed response) and is
/// retryable. A broker-side rejection is a successful call returning
/// `ExecutionStatus::Error`.
#[automock]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Execute an order and wait for a terminal settlement status
    async fn execute_trade(&mut self, request: TradeRequest) -> Result<ExecutionReport, TradingError>;

    /// Positions the broker currently holds for the account
    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, TradingError>;

    /// Account snapshot, refreshed before each sizing or admission decision
    async fn get_account_info(&self) -> Result<AccountInfo, TradingError>;
}
