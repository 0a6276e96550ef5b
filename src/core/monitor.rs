/**
* filename : monitor
* author : HAMA
* date: 2025. 5. 12.
* description: 주기적 시세 갱신 및 손절/익절 감시 태스크
**/

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::AlertConfig;
use crate::core::position_manager::{PositionManager, UpdateReport};
use crate::error::TradingError;
use crate::market_data::QuoteFeed;
use crate::risk::alerts::{check_position_alerts, PositionAlert, Severity};

/// 감시 1회 결과
#[derive(Debug, Default)]
pub struct MonitorReport {
  /// 시세를 받은 심볼 수
  pub quotes: usize,
  pub update: UpdateReport,
  pub alerts: Vec<PositionAlert>,
}

/// 포지션 감시자
///
/// 관심 종목과 보유 종목의 시세를 주기적으로 받아 `update_all` 을 호출하고
/// 포지션 경보를 로그로 남긴다.
pub struct PositionMonitor {
  manager: Arc<PositionManager>,
  feed: Arc<dyn QuoteFeed>,
  watchlist: Vec<String>,
  alert_config: AlertConfig,
  period: Duration,
  is_active: Arc<RwLock<bool>>,
  shutdown: Arc<Notify>,
  handle: Option<JoinHandle<()>>,
}

impl PositionMonitor {
  pub fn new(
    manager: Arc<PositionManager>,
    feed: Arc<dyn QuoteFeed>,
    watchlist: Vec<String>,
    alert_config: AlertConfig,
    period: Duration,
  ) -> Self {
    PositionMonitor {
      manager,
      feed,
      watchlist,
      alert_config,
      period,
      is_active: Arc::new(RwLock::new(false)),
      shutdown: Arc::new(Notify::new()),
      handle: None,
    }
  }

  pub async fn is_running(&self) -> bool {
    *self.is_active.read().await
  }

  /// 감시 1회 실행
  pub async fn run_once(&self) -> Result<MonitorReport, TradingError> {
    monitor_pass(&self.manager, self.feed.as_ref(), &self.watchlist, &self.alert_config).await
  }

  /// 감시 태스크 시작
  pub async fn start(&mut self) -> Result<(), TradingError> {
    {
      let mut active = self.is_active.write().await;
      if *active {
        return Err(TradingError::AlreadyRunning("Position monitor already running".to_string()));
      }
      *active = true;
    }

    let manager = self.manager.clone();
    let feed = self.feed.clone();
    let watchlist = self.watchlist.clone();
    let alert_config = self.alert_config.clone();
    let is_active = self.is_active.clone();
    let shutdown = self.shutdown.clone();
    let period = self.period;

    log::info!("포지션 감시 시작: 주기 {}초", period.as_secs());

    self.handle = Some(tokio::spawn(async move {
      let mut ticker = interval(period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = ticker.tick() => {}
          _ = shutdown.notified() => break,
        }
        if !*is_active.read().await {
          break;
        }

        // 한 번의 감시 도중에는 취소하지 않는다
        match monitor_pass(&manager, feed.as_ref(), &watchlist, &alert_config).await {
          Ok(report) => log::debug!(
            "감시 완료: 시세 {}건, 갱신 {}건, 청산 {}건, 경보 {}건",
            report.quotes, report.update.updated, report.update.exits.len(), report.alerts.len()
          ),
          Err(e) => log::error!("포지션 감시 오류: {}", e),
        }
      }

      log::info!("포지션 감시 종료");
    }));

    Ok(())
  }

  /// 감시 태스크 중지. 진행 중인 감시가 끝날 때까지 기다린다
  pub async fn stop(&mut self) -> Result<(), TradingError> {
    {
      let mut active = self.is_active.write().await;
      if !*active {
        return Err(TradingError::NotRunning("Position monitor is not running".to_string()));
      }
      *active = false;
    }

    self.shutdown.notify_one();
    if let Some(handle) = self.handle.take() {
      if let Err(e) = handle.await {
        log::error!("포지션 감시 태스크 비정상 종료: {}", e);
      }
    }
    Ok(())
  }
}

async fn monitor_pass(
  manager: &PositionManager,
  feed: &dyn QuoteFeed,
  watchlist: &[String],
  alert_config: &AlertConfig,
) -> Result<MonitorReport, TradingError> {
  let symbols: Vec<String> = watchlist
    .iter()
    .cloned()
    .chain(manager.held_symbols().await)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();
  if symbols.is_empty() {
    return Ok(MonitorReport::default());
  }

  let quotes = feed.get_market_data(&symbols).await?;
  let update = manager.update_all(&quotes).await;

  let positions = manager.positions().await;
  let alerts = check_position_alerts(&positions, alert_config);
  for alert in &alerts {
    match alert.severity {
      Severity::High => log::warn!("[{}] {}", alert.severity, alert.message),
      _ => log::info!("[{}] {}", alert.severity, alert.message),
    }
  }

  Ok(MonitorReport {
    quotes: quotes.len(),
    update,
    alerts,
  })
}
