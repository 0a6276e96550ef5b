/**
* filename : main
* author : HAMA
* date: 2025. 5. 12.
* description: 모의 브로커 기반 포지션 관리 스케줄러
**/

use std::collections::HashMap;
use std::sync::Arc;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};

use xRisk::config::Config;
use xRisk::core::{PositionManager, PositionMonitor, TradingCycle};
use xRisk::gateway::{OrderGateway, SimulatedGateway};
use xRisk::ledger::{export_history_csv, InMemoryPositionStore, JsonFilePositionStore, PositionStore};
use xRisk::market_data::{QuoteFeed, RandomWalkQuoteFeed};
use xRisk::signals::{JsonFileSignalSource, SignalSource, StaticSignalSource};
use xRisk::utils::logging;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // 설정 로드
    let config = Config::load()?;

    // 로깅 초기화
    logging::init(&config.logging.level, config.logging.file_path.as_deref())?;
    log::info!("포지션 관리 엔진 시작 (v{})", xRisk::VERSION);
    if !config.scheduler.trading_enabled {
        log::warn!("TRADING_ENABLED 가 꺼져 있어 신규 주문 없이 감시만 수행");
    }

    // 시세 공급원 (데모용 랜덤 워크)
    let seed_prices: HashMap<String, _> = config
        .scheduler
        .watchlist
        .iter()
        .map(|symbol| (symbol.clone(), dec!(50)))
        .collect();
    let feed: Arc<dyn QuoteFeed> = Arc::new(RandomWalkQuoteFeed::new(seed_prices.clone(), 2.0));

    // 모의 브로커
    let mut simulated = SimulatedGateway::new(config.gateway.initial_balance);
    for (symbol, price) in &seed_prices {
        simulated.set_price(symbol.clone(), *price);
    }
    let gateway: Arc<RwLock<dyn OrderGateway>> = Arc::new(RwLock::new(simulated));

    // 포지션 저장소
    let store: Arc<RwLock<dyn PositionStore>> = match config.store.path.as_deref() {
        Some(path) => Arc::new(RwLock::new(JsonFilePositionStore::open(path).await?)),
        None => {
            log::warn!("POSITION_STORE_PATH 미설정, 메모리 저장소 사용 (재시작 시 손절/익절가 유실)");
            Arc::new(RwLock::new(InMemoryPositionStore::new()))
        }
    };

    // 신호 공급원
    let signals: Arc<dyn SignalSource> = match config.store.signals_path.as_deref() {
        Some(path) => Arc::new(JsonFileSignalSource::new(path)),
        None => Arc::new(StaticSignalSource::new(Vec::new())),
    };

    // 포지션 관리자
    let manager = Arc::new(PositionManager::new(gateway, store, &config));
    let loaded = manager.load().await?;
    log::info!("활성 포지션 {}건 복원", loaded);

    // 감시 시작
    let mut monitor = PositionMonitor::new(
        manager.clone(),
        feed.clone(),
        config.scheduler.watchlist.clone(),
        config.alerts.clone(),
        Duration::from_secs(config.scheduler.monitor_interval_secs),
    );
    monitor.start().await?;

    // 매매 주기
    let cycle = TradingCycle::new(
        manager.clone(),
        signals,
        feed,
        config.entry_profiles.clone(),
        config.scheduler.trading_enabled,
    );
    let mut ticker = interval(Duration::from_secs(config.scheduler.cycle_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = cycle.run_once().await {
                    logging::log_error("매매 주기", &e);
                }
                logging::log_portfolio_summary(&manager.summary().await);
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("종료 신호 수신");
                break;
            }
        }
    }

    // 종료 처리
    monitor.stop().await?;
    logging::log_portfolio_summary(&manager.summary().await);

    if let Some(path) = config.store.history_csv.as_deref() {
        let history = manager.history().await;
        export_history_csv(path, &history)?;
    }

    log::info!("포지션 관리 엔진 종료");
    Ok(())
}
