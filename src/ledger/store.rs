use std::collections::HashMap;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use mockall::automock;

use crate::error::TradingError;
use crate::models::position::{Position, PositionKey, PositionStatus};

/// 포지션 영속 저장소 인터페이스
///
/// (symbol, position_type, deal_reference) 키로 포지션 레코드를 보관한다.
/// 브로커가 돌려주지 않는 손절/익절가, 진입일을 재시작 후 복원하는 용도.
#[automock]
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// 포지션 저장 (같은 키가 있으면 교체)
    async fn save_position(&mut self, position: &Position) -> Result<(), TradingError>;

    /// 기존 포지션 갱신. 키가 없으면 오류
    async fn update_position(&mut self, position: &Position) -> Result<(), TradingError>;

    /// 상태별 포지션 조회. None 이면 전체
    async fn get_positions(&self, status: Option<PositionStatus>) -> Result<Vec<Position>, TradingError>;
}

fn matches_status(position: &Position, status: Option<PositionStatus>) -> bool {
    status.map_or(true, |s| position.status == s)
}

/// 메모리 기반 포지션 저장소
pub struct InMemoryPositionStore {
    positions: HashMap<PositionKey, Position>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        InMemoryPositionStore {
            positions: HashMap::new(),
        }
    }
}

impl Default for InMemoryPositionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn save_position(&mut self, position: &Position) -> Result<(), TradingError> {
        self.positions.insert(position.key(), position.clone());
        Ok(())
    }

    async fn update_position(&mut self, position: &Position) -> Result<(), TradingError> {
        match self.positions.get_mut(&position.key()) {
            Some(stored) => {
                *stored = position.clone();
                Ok(())
            }
            None => Err(TradingError::PersistenceError(format!("no stored position for {}", position.key()))),
        }
    }

    async fn get_positions(&self, status: Option<PositionStatus>) -> Result<Vec<Position>, TradingError> {
        let mut positions: Vec<Position> = self
            .positions
            .values()
            .filter(|p| matches_status(p, status))
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.entry_date.cmp(&b.entry_date));
        Ok(positions)
    }
}

/// JSON 파일 기반 포지션 저장소
///
/// 전체 레코드를 하나의 JSON 배열로 보관하고, 쓸 때마다 임시 파일에 기록한 뒤
/// rename 으로 교체한다.
pub struct JsonFilePositionStore {
    path: PathBuf,
    positions: Vec<Position>,
}

impl JsonFilePositionStore {
    /// 파일을 열어 기존 레코드를 읽는다. 파일이 없으면 빈 저장소
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TradingError> {
        let path = path.as_ref().to_path_buf();

        let positions = if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Vec::new()
        };

        log::debug!("포지션 저장소 열기: {} ({}건)", path.display(), positions.len());
        Ok(JsonFilePositionStore { path, positions })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> Result<(), TradingError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(&self.positions)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PositionStore for JsonFilePositionStore {
    async fn save_position(&mut self, position: &Position) -> Result<(), TradingError> {
        let key = position.key();
        match self.positions.iter_mut().find(|p| p.key() == key) {
            Some(stored) => *stored = position.clone(),
            None => self.positions.push(position.clone()),
        }
        self.flush().await
    }

    async fn update_position(&mut self, position: &Position) -> Result<(), TradingError> {
        let key = position.key();
        let stored = self
            .positions
            .iter_mut()
            .find(|p| p.key() == key)
            .ok_or_else(|| TradingError::PersistenceError(format!("no stored position for {}", key)))?;
        *stored = position.clone();
        self.flush().await
    }

    async fn get_positions(&self, status: Option<PositionStatus>) -> Result<Vec<Position>, TradingError> {
        Ok(self
            .positions
            .iter()
            .filter(|p| matches_status(p, status))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::position::PositionType;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn sample(symbol: &str, deal: &str) -> Position {
        Position::new(symbol, PositionType::Long, 10, dec!(100), Some(dec!(95)), Some(dec!(110)), deal).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_save_replaces_and_update_requires_key() {
        let mut store = InMemoryPositionStore::new();
        let mut position = sample("CBA.AX", "D1");
        store.save_position(&position).await.unwrap();

        position.status = PositionStatus::Closed;
        store.update_position(&position).await.unwrap();
        assert_eq!(store.get_positions(Some(PositionStatus::Open)).await.unwrap().len(), 0);
        assert_eq!(store.get_positions(Some(PositionStatus::Closed)).await.unwrap().len(), 1);

        let missing = sample("BHP.AX", "D2");
        assert!(matches!(
            store.update_position(&missing).await,
            Err(TradingError::PersistenceError(_))
        ));
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("positions.json");

        {
            let mut store = JsonFilePositionStore::open(&path).await.unwrap();
            store.save_position(&sample("CBA.AX", "D1")).await.unwrap();
            store.save_position(&sample("BHP.AX", "D2")).await.unwrap();
            // 같은 키 재저장은 교체
            store.save_position(&sample("CBA.AX", "D1")).await.unwrap();
        }

        let store = JsonFilePositionStore::open(&path).await.unwrap();
        let positions = store.get_positions(None).await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].stop_loss, Some(dec!(95)));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFilePositionStore::open(dir.path().join("none.json")).await.unwrap();
        assert!(store.get_positions(None).await.unwrap().is_empty());
    }
}
