pub mod provider;

pub use provider::{QuoteFeed, RandomWalkQuoteFeed, StaticQuoteFeed};
