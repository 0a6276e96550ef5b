pub mod account;
pub mod market_data;
pub mod order;
pub mod position;

pub use account::{Account, AccountInfo, Balance};
pub use market_data::{Quote, QuoteMap};
pub use order::{BrokerPosition, Direction, ExecutionReport, ExecutionStatus, OrderType, TradeRequest};
pub use position::{Position, PositionKey, PositionStatus, PositionType};
