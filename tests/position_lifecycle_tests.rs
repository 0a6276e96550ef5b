//! 포지션 생명주기 통합 테스트
//!
//! 모의 브로커와 파일 저장소로 개설 -> 부분 청산 -> 재시작 복원 -> 전량 청산 흐름 검증

use std::collections::HashMap;
use std::sync::Arc;
use rust_decimal_macros::dec;
use tempfile::tempdir;
use tokio::sync::RwLock;
use xRisk::config::Config;
use xRisk::core::PositionManager;
use xRisk::gateway::{OrderGateway, SimulatedGateway};
use xRisk::ledger::{export_history_csv, InMemoryPositionStore, JsonFilePositionStore, PositionStore};
use xRisk::models::market_data::Quote;
use xRisk::models::order::Direction;
use xRisk::models::position::{PositionStatus, PositionType};
use xRisk::signals::{Confidence, Signal, SignalAction};

fn config() -> Config {
  let mut config = Config::default();
  config.risk.max_portfolio_exposure = dec!(0.5);
  config
}

#[tokio::test]
async fn test_open_partial_restart_and_close() {
  let dir = tempdir().unwrap();
  let store_path = dir.path().join("positions.json");

  let mut simulated = SimulatedGateway::new(dec!(50000));
  simulated.set_price("CBA.AX", dec!(100));
  let gateway: Arc<RwLock<dyn OrderGateway>> = Arc::new(RwLock::new(simulated));

  // 첫 실행: 개설 후 부분 청산
  {
    let store: Arc<RwLock<dyn PositionStore>> = Arc::new(RwLock::new(JsonFilePositionStore::open(&store_path).await.unwrap()));
    let manager = PositionManager::new(gateway.clone(), store, &config());

    // 위험 예산 1000 / 손절 거리 5 = 200, 금액 상한 10000 / 100 = 100
    let outcome = manager
      .open("CBA.AX", Direction::Buy, dec!(100), Some(dec!(95)), Some(dec!(115)))
      .await
      .unwrap();
    assert!(outcome.success, "{}", outcome.message);

    let outcome = manager.close("CBA.AX", PositionType::Long, Some(40)).await.unwrap();
    assert!(outcome.success, "{}", outcome.message);
  }

  // 재시작: 브로커 수량 + 저장된 손절/익절가
  let store: Arc<RwLock<dyn PositionStore>> = Arc::new(RwLock::new(JsonFilePositionStore::open(&store_path).await.unwrap()));
  let manager = PositionManager::new(gateway.clone(), store, &config());
  assert_eq!(manager.load().await.unwrap(), 1);

  let position = manager.positions().await.remove(0);
  assert_eq!(position.quantity, 60);
  assert_eq!(position.status, PositionStatus::Partial);
  assert_eq!(position.stop_loss, Some(dec!(95)));
  assert_eq!(position.take_profit, Some(dec!(115)));

  // 익절가 도달 -> 전량 청산
  let mut quotes = HashMap::new();
  quotes.insert("CBA.AX".to_string(), Quote::with_price(dec!(116)));
  let report = manager.update_all(&quotes).await;
  assert_eq!(report.exits.len(), 1);
  assert!(report.exits[0].success);
  assert!(manager.positions().await.is_empty());

  let history = manager.history().await;
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].status, PositionStatus::Closed);

  let csv_path = dir.path().join("history.csv");
  assert_eq!(export_history_csv(&csv_path, &history).unwrap(), 1);
}

#[tokio::test]
async fn test_signal_exit_medium_confidence_halves_position() {
  let mut simulated = SimulatedGateway::new(dec!(50000));
  simulated.set_price("WES.AX", dec!(60));
  let gateway: Arc<RwLock<dyn OrderGateway>> = Arc::new(RwLock::new(simulated));
  let store: Arc<RwLock<dyn PositionStore>> = Arc::new(RwLock::new(InMemoryPositionStore::new()));
  let manager = PositionManager::new(gateway, store, &config());

  // 위험 예산 1000 / 손절 거리 3 = 333, 금액 상한 10000 / 60 = 166
  manager.open("WES.AX", Direction::Buy, dec!(60), Some(dec!(57)), None).await.unwrap();
  assert_eq!(manager.positions().await[0].quantity, 166);

  // -2% 손실, medium 신뢰도 -> 절반 축소
  let signal = Signal::new("WES.AX", SignalAction::Sell, Confidence::Medium);
  let outcome = manager.apply_signal_exit(&signal, Some(dec!(58.8))).await.unwrap().unwrap();
  assert!(outcome.success, "{}", outcome.message);

  let position = manager.positions().await.remove(0);
  assert_eq!(position.quantity, 83);
  assert_eq!(position.status, PositionStatus::Partial);
}

#[tokio::test]
async fn test_insufficient_broker_balance_is_a_rejection() {
  let mut simulated = SimulatedGateway::new(dec!(0));
  simulated.set_price("CBA.AX", dec!(100));
  let gateway: Arc<RwLock<dyn OrderGateway>> = Arc::new(RwLock::new(simulated));
  let store: Arc<RwLock<dyn PositionStore>> = Arc::new(RwLock::new(InMemoryPositionStore::new()));
  let manager = PositionManager::new(gateway, store, &config());

  let outcome = manager.open("CBA.AX", Direction::Buy, dec!(100), Some(dec!(95)), None).await.unwrap();
  assert!(!outcome.success);
  assert_eq!(outcome.message, "Insufficient account balance");
  assert!(manager.positions().await.is_empty());
}

#[tokio::test]
async fn test_simulated_fill_follows_quote_not_seed_price() {
  // 모의 브로커는 50 으로 시작했지만 시세는 55
  let mut simulated = SimulatedGateway::new(dec!(50000));
  simulated.set_price("CBA.AX", dec!(50));
  let gateway: Arc<RwLock<dyn OrderGateway>> = Arc::new(RwLock::new(simulated));
  let store: Arc<RwLock<dyn PositionStore>> = Arc::new(RwLock::new(InMemoryPositionStore::new()));
  let manager = PositionManager::new(gateway.clone(), store, &config());

  let outcome = manager
    .open("CBA.AX", Direction::Buy, dec!(55), Some(dec!(52.25)), None)
    .await
    .unwrap();
  assert!(outcome.success, "{}", outcome.message);

  let position = manager.positions().await.remove(0);
  assert_eq!(position.entry_price, dec!(55));
  assert_eq!(position.stop_loss, Some(dec!(52.25)));
  let broker = gateway.read().await.get_positions().await.unwrap();
  assert_eq!(broker[0].level, dec!(55));

  let outcome = manager.close("CBA.AX", PositionType::Long, None).await.unwrap();
  assert!(outcome.success, "{}", outcome.message);
  assert_eq!(manager.history().await[0].realized_pnl, dec!(0));
}
