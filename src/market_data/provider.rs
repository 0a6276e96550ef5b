use std::collections::HashMap;
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::*;
use tokio::sync::RwLock;

use crate::error::TradingError;
use crate::models::market_data::{Quote, QuoteMap};

/// 시세 공급원 인터페이스
///
/// 요청한 심볼 중 시세가 없는 심볼은 결과 맵에서 빠질 수 있다.
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    /// 심볼 목록의 현재 시세 조회
    async fn get_market_data(&self, symbols: &[String]) -> Result<QuoteMap, TradingError>;
}

/// 고정 시세 공급원
pub struct StaticQuoteFeed {
    quotes: RwLock<QuoteMap>,
}

impl StaticQuoteFeed {
    pub fn new() -> Self {
        StaticQuoteFeed { quotes: RwLock::new(HashMap::new()) }
    }

    /// 심볼 시세 설정
    pub async fn set_quote(&self, symbol: impl Into<String>, quote: Quote) {
        self.quotes.write().await.insert(symbol.into(), quote);
    }

    /// 심볼 가격만 설정
    pub async fn set_price(&self, symbol: impl Into<String>, price: Decimal) {
        self.set_quote(symbol, Quote::with_price(price)).await;
    }
}

impl Default for StaticQuoteFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteFeed for StaticQuoteFeed {
    async fn get_market_data(&self, symbols: &[String]) -> Result<QuoteMap, TradingError> {
        let quotes = self.quotes.read().await;
        Ok(symbols
            .iter()
            .filter_map(|s| quotes.get(s).map(|q| (s.clone(), q.clone())))
            .collect())
    }
}

/// 랜덤 워크 시세 공급원 (데모용)
///
/// 조회할 때마다 각 심볼 가격을 최대 ±max_step_pct% 만큼 움직인다.
pub struct RandomWalkQuoteFeed {
    prices: RwLock<HashMap<String, Decimal>>,
    max_step_pct: f64,
}

impl RandomWalkQuoteFeed {
    pub fn new(seed_prices: HashMap<String, Decimal>, max_step_pct: f64) -> Self {
        RandomWalkQuoteFeed {
            prices: RwLock::new(seed_prices),
            max_step_pct,
        }
    }

    fn step(price: Decimal, max_step_pct: f64) -> Decimal {
        let change = rand::thread_rng().gen_range(-max_step_pct..=max_step_pct) / 100.0;
        let factor = Decimal::from_f64(1.0 + change).unwrap_or(Decimal::ONE);
        (price * factor).round_dp(3).max(Decimal::new(1, 3))
    }
}

#[async_trait]
impl QuoteFeed for RandomWalkQuoteFeed {
    async fn get_market_data(&self, symbols: &[String]) -> Result<QuoteMap, TradingError> {
        let mut prices = self.prices.write().await;
        let mut quotes = HashMap::new();

        for symbol in symbols {
            let Some(previous) = prices.get(symbol).copied() else {
                continue;
            };
            let next = Self::step(previous, self.max_step_pct);
            prices.insert(symbol.clone(), next);

            let change_pct = if previous > Decimal::ZERO {
                ((next - previous) / previous).round_dp(4)
            } else {
                Decimal::ZERO
            };
            quotes.insert(symbol.clone(), Quote {
                current_price: Some(next),
                volume: Some(rand::thread_rng().gen_range(10_000..1_000_000)),
                price_change_pct: Some(change_pct),
                ..Default::default()
            });
        }

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_feed_returns_only_known_symbols() {
        let feed = StaticQuoteFeed::new();
        feed.set_price("CBA.AX", dec!(120)).await;

        let quotes = feed.get_market_data(&["CBA.AX".to_string(), "BHP.AX".to_string()]).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["CBA.AX"].usable_price(), Some(dec!(120)));
    }

    #[tokio::test]
    async fn test_random_walk_stays_within_step() {
        let mut seed = HashMap::new();
        seed.insert("CBA.AX".to_string(), dec!(100));
        let feed = RandomWalkQuoteFeed::new(seed, 2.0);

        let quotes = feed.get_market_data(&["CBA.AX".to_string(), "NOPE.AX".to_string()]).await.unwrap();
        let price = quotes["CBA.AX"].current_price.unwrap();
        assert!(price >= dec!(97.9) && price <= dec!(102.1));
        assert!(!quotes.contains_key("NOPE.AX"));
    }
}
