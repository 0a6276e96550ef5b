//! 포지션 원장
//!
//! 활성 포지션의 메모리 내 권위 있는 맵과 청산 이력을 보관한다.
//! 키는 (symbol, position_type, deal_reference) 이며 키당 하나의 항목만 존재한다.

pub mod journal;
pub mod store;

use std::collections::{BTreeSet, HashMap};
use rust_decimal::Decimal;

use crate::error::TradingError;
use crate::gateway::traits::OrderGateway;
use crate::models::order::BrokerPosition;
use crate::models::position::{Position, PositionKey, PositionStatus, PositionType};

pub use journal::export_history_csv;
pub use store::{InMemoryPositionStore, JsonFilePositionStore, MockPositionStore, PositionStore};

#[derive(Debug, Default)]
pub struct PositionLedger {
    active: HashMap<PositionKey, Position>,
    history: Vec<Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 브로커 보유 현황과 저장된 메타데이터로 원장 재구성
    pub async fn load(gateway: &dyn OrderGateway, store: &dyn PositionStore) -> Result<Self, TradingError> {
        let broker_positions = gateway.get_positions().await?;
        let persisted = store.get_positions(None).await?;
        Ok(Self::reconcile(broker_positions, persisted))
    }

    /// 브로커가 수량/가격의 기준이다. 저장된 레코드는 브로커가 주지 않는
    /// 손절/익절가, 진입일, 실현 손익만 채운다.
    pub fn reconcile(broker_positions: Vec<BrokerPosition>, persisted: Vec<Position>) -> Self {
        let mut persisted_by_key: HashMap<PositionKey, Position> = HashMap::new();
        let mut history = Vec::new();
        for position in persisted {
            if position.is_active() {
                persisted_by_key.insert(position.key(), position);
            } else {
                history.push(position);
            }
        }

        let mut active: HashMap<PositionKey, Position> = HashMap::new();

        for broker in broker_positions {
            if broker.size == 0 || broker.level <= Decimal::ZERO {
                log::warn!("브로커 포지션 무시: {} 수량 {} 가격 {}", broker.symbol, broker.size, broker.level);
                continue;
            }

            let position_type = PositionType::from_direction(broker.direction);
            let key = PositionKey {
                symbol: broker.symbol.clone(),
                position_type,
                deal_reference: broker.deal_id.clone(),
            };
            if active.contains_key(&key) {
                log::warn!("브로커가 중복 포지션을 보고함, 첫 항목 유지: {}", key);
                continue;
            }

            let mut position = match Position::new(
                broker.symbol.clone(),
                position_type,
                broker.size,
                broker.level,
                None,
                None,
                broker.deal_id.clone(),
            ) {
                Ok(position) => position,
                Err(e) => {
                    log::warn!("브로커 포지션 변환 실패 {}: {}", key, e);
                    continue;
                }
            };

            match persisted_by_key.remove(&key) {
                Some(stored) => {
                    position.entry_date = stored.entry_date;
                    position.realized_pnl = stored.realized_pnl;
                    position.status = stored.status;
                    position.stop_loss = stored.stop_loss;
                    position.take_profit = stored.take_profit;
                    if let Err(e) = position.validate() {
                        log::warn!("저장된 손절/익절가가 브로커 진입가와 맞지 않아 제거 {}: {}", key, e);
                        position.stop_loss = None;
                        position.take_profit = None;
                    }
                }
                None => {
                    log::info!("저장 기록 없는 브로커 포지션 채택: {}", key);
                }
            }

            if let Some(bid) = broker.bid.filter(|b| *b > Decimal::ZERO) {
                position.mark_price(bid);
            }
            active.insert(key, position);
        }

        for key in persisted_by_key.keys() {
            log::warn!("브로커에 없는 저장 포지션 제외: {}", key);
        }

        log::info!("원장 로드 완료: 활성 {}건, 이력 {}건", active.len(), history.len());
        PositionLedger { active, history }
    }

    /// 신규 포지션 추가. 같은 키가 이미 있으면 오류
    pub fn insert(&mut self, position: Position) -> Result<(), TradingError> {
        position.validate()?;
        let key = position.key();
        if self.active.contains_key(&key) {
            return Err(TradingError::DuplicatePosition(key.to_string()));
        }
        self.active.insert(key, position);
        Ok(())
    }

    /// 활성 포지션 추가 또는 같은 거래의 기존 항목 교체
    ///
    /// 같은 (심볼, 방향)을 다른 거래 참조가 이미 차지하고 있으면 `DuplicatePosition`.
    pub fn upsert(&mut self, position: Position) -> Result<(), TradingError> {
        position.validate()?;
        if !position.is_active() {
            return Err(TradingError::InvalidPosition(format!(
                "{} is {}, use close_out instead",
                position.key(),
                position.status
            )));
        }
        let key = position.key();
        if let Some(other) = self
            .find(&position.symbol, position.position_type)
            .filter(|existing| existing.deal_reference != position.deal_reference)
        {
            return Err(TradingError::DuplicatePosition(format!("{} already held as {}", key, other.key())));
        }
        self.active.insert(key, position);
        Ok(())
    }

    /// 이력에 남기지 않고 제거
    pub fn remove(&mut self, key: &PositionKey) -> Option<Position> {
        self.active.remove(key)
    }

    /// 활성 맵에서 빼고 CLOSED 로 이력에 보관
    pub fn close_out(&mut self, key: &PositionKey) -> Option<Position> {
        let mut position = self.active.remove(key)?;
        position.status = PositionStatus::Closed;
        self.history.push(position.clone());
        Some(position)
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.active.get(key)
    }

    pub fn get_mut(&mut self, key: &PositionKey) -> Option<&mut Position> {
        self.active.get_mut(key)
    }

    /// (심볼, 방향)으로 활성 포지션 조회
    pub fn find(&self, symbol: &str, position_type: PositionType) -> Option<&Position> {
        self.active
            .values()
            .find(|p| p.symbol == symbol && p.position_type == position_type)
    }

    /// 활성 포지션 스냅샷
    pub fn all(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.active.values().cloned().collect();
        positions.sort_by(|a, b| a.entry_date.cmp(&b.entry_date).then_with(|| a.symbol.cmp(&b.symbol)));
        positions
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.active.values_mut()
    }

    pub fn history(&self) -> &[Position] {
        &self.history
    }

    /// 활성 포지션 심볼 (정렬, 중복 제거)
    pub fn symbols(&self) -> Vec<String> {
        self.active
            .values()
            .map(|p| p.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::simulation::SimulatedGateway;
    use crate::models::order::Direction;
    use rust_decimal_macros::dec;

    fn broker(symbol: &str, direction: Direction, size: u64, level: Decimal, deal: &str) -> BrokerPosition {
        BrokerPosition {
            symbol: symbol.to_string(),
            direction,
            size,
            level,
            bid: None,
            deal_id: deal.to_string(),
        }
    }

    /// 진입가 기준 손절 -10%, 익절 +20% 로 저장된 LONG
    fn stored(symbol: &str, quantity: u64, entry: Decimal, deal: &str) -> Position {
        let stop = entry * dec!(0.9);
        let target = entry * dec!(1.2);
        Position::new(symbol, PositionType::Long, quantity, entry, Some(stop), Some(target), deal).unwrap()
    }

    #[test]
    fn test_broker_wins_and_store_fills_stop_target() {
        let ledger = PositionLedger::reconcile(
            vec![broker("CBA.AX", Direction::Buy, 15, dec!(101), "D1")],
            vec![stored("CBA.AX", 10, dec!(100), "D1")],
        );

        let position = ledger.find("CBA.AX", PositionType::Long).unwrap();
        assert_eq!(position.quantity, 15);
        assert_eq!(position.entry_price, dec!(101));
        assert_eq!(position.stop_loss, Some(dec!(90)));
        assert_eq!(position.take_profit, Some(dec!(120)));
    }

    #[test]
    fn test_unmatched_broker_position_is_adopted_without_levels() {
        let ledger = PositionLedger::reconcile(vec![broker("BHP.AX", Direction::Sell, 7, dec!(45), "D9")], vec![]);
        let position = ledger.find("BHP.AX", PositionType::Short).unwrap();
        assert_eq!(position.quantity, -7);
        assert_eq!(position.stop_loss, None);
        assert_eq!(position.take_profit, None);
    }

    #[test]
    fn test_duplicate_broker_keys_collapse_and_stale_store_entries_drop() {
        let ledger = PositionLedger::reconcile(
            vec![
                broker("CBA.AX", Direction::Buy, 5, dec!(100), "D1"),
                broker("CBA.AX", Direction::Buy, 8, dec!(100), "D1"),
            ],
            vec![stored("WES.AX", 3, dec!(60), "D3")],
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.all()[0].quantity, 5);
        assert!(ledger.find("WES.AX", PositionType::Long).is_none());
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn test_inconsistent_stored_levels_are_dropped() {
        // 브로커 진입가 85 는 저장된 손절가 90 보다 낮다
        let ledger = PositionLedger::reconcile(
            vec![broker("CBA.AX", Direction::Buy, 5, dec!(85), "D1")],
            vec![stored("CBA.AX", 5, dec!(100), "D1")],
        );
        let position = ledger.find("CBA.AX", PositionType::Long).unwrap();
        assert_eq!(position.stop_loss, None);
        assert!(position.validate().is_ok());
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let mut ledger = PositionLedger::new();
        ledger.insert(stored("CBA.AX", 5, dec!(100), "D1")).unwrap();
        let err = ledger.insert(stored("CBA.AX", 9, dec!(100), "D1")).unwrap_err();
        assert!(matches!(err, TradingError::DuplicatePosition(_)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_same_deal_only() {
        let mut ledger = PositionLedger::new();
        let mut position = stored("CBA.AX", 5, dec!(100), "D1");
        ledger.upsert(position.clone()).unwrap();

        position.quantity = 3;
        position.status = PositionStatus::Partial;
        ledger.upsert(position.clone()).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&position.key()).unwrap().quantity, 3);

        // 같은 심볼/방향의 다른 거래는 중복
        let err = ledger.upsert(stored("CBA.AX", 9, dec!(100), "D2")).unwrap_err();
        assert!(matches!(err, TradingError::DuplicatePosition(_)));
        assert_eq!(ledger.len(), 1);

        // 비활성 포지션은 upsert 대상이 아니다
        position.status = PositionStatus::Closed;
        let err = ledger.upsert(position).unwrap_err();
        assert!(matches!(err, TradingError::InvalidPosition(_)));
        assert_eq!(ledger.all()[0].status, PositionStatus::Partial);
    }

    #[test]
    fn test_remove_drops_without_history() {
        let mut ledger = PositionLedger::new();
        let position = stored("CBA.AX", 5, dec!(100), "D1");
        let key = position.key();
        ledger.insert(position).unwrap();

        let removed = ledger.remove(&key).unwrap();
        assert_eq!(removed.status, PositionStatus::Open);
        assert!(ledger.is_empty());
        assert!(ledger.history().is_empty());
        assert!(ledger.remove(&key).is_none());
    }

    #[test]
    fn test_close_out_keeps_history_and_frees_key() {
        let mut ledger = PositionLedger::new();
        let position = stored("CBA.AX", 5, dec!(100), "D1");
        let key = position.key();
        ledger.insert(position.clone()).unwrap();

        let closed = ledger.close_out(&key).unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert!(ledger.is_empty());
        assert_eq!(ledger.history().len(), 1);
        assert!(ledger.close_out(&key).is_none());

        ledger.insert(position).unwrap();
        assert_eq!(ledger.symbols(), vec!["CBA.AX".to_string()]);
    }

    #[tokio::test]
    async fn test_load_from_simulated_gateway_and_store() {
        let gateway = SimulatedGateway::new(dec!(1000)).with_position(BrokerPosition {
            bid: Some(dec!(104)),
            ..broker("CBA.AX", Direction::Buy, 5, dec!(100), "D1")
        });
        let mut store = InMemoryPositionStore::new();
        store.save_position(&stored("CBA.AX", 5, dec!(100), "D1")).await.unwrap();

        let ledger = PositionLedger::load(&gateway, &store).await.unwrap();
        let position = ledger.find("CBA.AX", PositionType::Long).unwrap();
        assert_eq!(position.current_price, Some(dec!(104)));
        assert_eq!(position.unrealized_pnl, Some(dec!(20)));
        assert_eq!(position.stop_loss, Some(dec!(90)));
    }
}
