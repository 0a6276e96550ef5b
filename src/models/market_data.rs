use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 심볼별 시세 맵
pub type QuoteMap = HashMap<String, Quote>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Quote {
    pub current_price: Option<Decimal>,
    pub volume: Option<u64>,
    pub price_change_pct: Option<Decimal>,
    #[serde(rename = "52w_high")]
    pub high_52w: Option<Decimal>,
    #[serde(rename = "52w_low")]
    pub low_52w: Option<Decimal>,
    pub avg_volume: Option<u64>,
}

impl Quote {
    pub fn with_price(price: Decimal) -> Self {
        Quote {
            current_price: Some(price),
            ..Default::default()
        }
    }

    /// 갱신에 쓸 수 있는 가격. 누락되었거나 0 이하이면 이번 주기에는 갱신하지 않는다.
    pub fn usable_price(&self) -> Option<Decimal> {
        self.current_price.filter(|p| *p > Decimal::ZERO)
    }
}
