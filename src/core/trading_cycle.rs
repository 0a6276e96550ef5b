/**
* filename : trading_cycle
* author : HAMA
* date: 2025. 5. 12.
* description: 신호 소비 -> 신호 기반 청산 -> 신규 진입 매매 주기
**/

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use rust_decimal::Decimal;

use crate::config::EntryProfilesConfig;
use crate::core::position_manager::{Outcome, PositionManager};
use crate::error::TradingError;
use crate::market_data::QuoteFeed;
use crate::models::order::Direction;
use crate::models::position::PositionType;
use crate::signals::{Signal, SignalAction, SignalSource};

/// 매매 주기 1회 결과
#[derive(Debug, Default)]
pub struct CycleReport {
  /// 거래 비활성으로 건너뛰었는지
  pub skipped: bool,
  pub signals: usize,
  pub exits: Vec<Outcome>,
  pub entries: Vec<Outcome>,
  pub failures: Vec<String>,
}

pub struct TradingCycle {
  manager: Arc<PositionManager>,
  signals: Arc<dyn SignalSource>,
  feed: Arc<dyn QuoteFeed>,
  profiles: EntryProfilesConfig,
  trading_enabled: bool,
}

impl TradingCycle {
  pub fn new(
    manager: Arc<PositionManager>,
    signals: Arc<dyn SignalSource>,
    feed: Arc<dyn QuoteFeed>,
    profiles: EntryProfilesConfig,
    trading_enabled: bool,
  ) -> Self {
    TradingCycle {
      manager,
      signals,
      feed,
      profiles,
      trading_enabled,
    }
  }

  /// 매매 주기 1회 실행
  pub async fn run_once(&self) -> Result<CycleReport, TradingError> {
    let mut report = CycleReport::default();

    if !self.trading_enabled {
      log::info!("거래 비활성 상태, 매매 주기 건너뜀");
      report.skipped = true;
      return Ok(report);
    }

    let signals = self.signals.next_signals().await?;
    report.signals = signals.len();
    if signals.is_empty() {
      log::info!("처리할 신호 없음");
      return Ok(report);
    }

    let symbols: Vec<String> = signals
      .iter()
      .map(|s| s.symbol.clone())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    let quotes = self.feed.get_market_data(&symbols).await?;
    let held_before: HashSet<String> = self.manager.held_symbols().await.into_iter().collect();

    // 보유 포지션에 대한 반대 신호
    for signal in signals.iter().filter(|s| s.action != SignalAction::Hold) {
      let target = match signal.action {
        SignalAction::Sell => PositionType::Long,
        _ => PositionType::Short,
      };
      if !self.manager.is_held(&signal.symbol, target).await {
        continue;
      }
      let price = quotes.get(&signal.symbol).and_then(|q| q.usable_price());
      match self.manager.apply_signal_exit(signal, price).await {
        Ok(Some(outcome)) => report.exits.push(outcome),
        Ok(None) => {}
        Err(e) => {
          log::error!("신호 기반 청산 실패 {}: {}", signal.symbol, e);
          report.failures.push(format!("{}: {}", signal.symbol, e));
        }
      }
    }

    // 신규 진입 후보: 보유하지 않은 종목의 BUY 신호
    let mut candidates: HashMap<String, (&Signal, Decimal, Decimal)> = HashMap::new();
    for signal in signals.iter().filter(|s| s.action == SignalAction::Buy) {
      if held_before.contains(&signal.symbol) {
        continue;
      }
      let Some(quote) = quotes.get(&signal.symbol) else {
        log::info!("{} 시세 없음, 진입 보류", signal.symbol);
        continue;
      };
      let Some(price) = quote.usable_price() else {
        log::info!("{} 유효한 가격 없음, 진입 보류", signal.symbol);
        continue;
      };
      let momentum = quote.price_change_pct.unwrap_or(Decimal::ZERO);
      let stronger = candidates
        .get(&signal.symbol)
        .map_or(true, |(existing, _, _)| signal.confidence > existing.confidence);
      if stronger {
        candidates.insert(signal.symbol.clone(), (signal, price, momentum));
      }
    }

    let mut ordered: Vec<(&Signal, Decimal, Decimal)> = candidates.into_values().collect();
    ordered.sort_by(|a, b| {
      b.0.confidence
        .cmp(&a.0.confidence)
        .then_with(|| b.2.cmp(&a.2))
        .then_with(|| a.0.symbol.cmp(&b.0.symbol))
    });

    for (signal, price, _) in ordered {
      let profile = self.profiles.for_confidence(signal.confidence);
      let stop_loss = (price * (Decimal::ONE - profile.stop_loss_pct)).round_dp(3);
      let take_profit = (price * (Decimal::ONE + profile.take_profit_pct)).round_dp(3);

      log::info!(
        "진입 시도: {} @ ${} (신뢰도 {}, 손절 ${}, 익절 ${})",
        signal.symbol, price, signal.confidence, stop_loss, take_profit
      );
      match self
        .manager
        .open_with_limits(
          &signal.symbol,
          Direction::Buy,
          price,
          Some(stop_loss),
          Some(take_profit),
          profile.risk_fraction,
          Some(self.profiles.max_account_fraction),
        )
        .await
      {
        Ok(outcome) => report.entries.push(outcome),
        Err(e) => {
          log::error!("진입 실패 {}: {}", signal.symbol, e);
          report.failures.push(format!("{}: {}", signal.symbol, e));
        }
      }
    }

    log::info!(
      "매매 주기 완료: 신호 {}건, 청산 {}건, 진입 {}건, 실패 {}건",
      report.signals,
      report.exits.iter().filter(|o| o.success).count(),
      report.entries.iter().filter(|o| o.success).count(),
      report.failures.len()
    );
    Ok(report)
  }
}
