/**
* filename : source
* author : HAMA
* date: 2025. 5. 11.
* description: 매매 신호 공급원 인터페이스
**/

use std::path::PathBuf;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::TradingError;
use super::signal_types::Signal;

/// 신호 공급원. 신호 생성 자체는 이 크레이트의 범위 밖이다.
#[async_trait]
pub trait SignalSource: Send + Sync {
  async fn next_signals(&self) -> Result<Vec<Signal>, TradingError>;
}

/// 미리 넣어 둔 신호를 한 번만 내보내는 공급원
pub struct StaticSignalSource {
  pending: Mutex<Vec<Signal>>,
}

impl StaticSignalSource {
  pub fn new(signals: Vec<Signal>) -> Self {
    StaticSignalSource { pending: Mutex::new(signals) }
  }

  pub async fn push(&self, signal: Signal) {
    self.pending.lock().await.push(signal);
  }
}

#[async_trait]
impl SignalSource for StaticSignalSource {
  async fn next_signals(&self) -> Result<Vec<Signal>, TradingError> {
    let mut pending = self.pending.lock().await;
    Ok(std::mem::take(&mut *pending))
  }
}

/// 매 주기마다 JSON 배열 파일을 읽는 공급원. 파일이 없으면 빈 목록
pub struct JsonFileSignalSource {
  path: PathBuf,
}

impl JsonFileSignalSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    JsonFileSignalSource { path: path.into() }
  }
}

#[async_trait]
impl SignalSource for JsonFileSignalSource {
  async fn next_signals(&self) -> Result<Vec<Signal>, TradingError> {
    if !tokio::fs::try_exists(&self.path).await? {
      log::debug!("신호 파일 없음: {}", self.path.display());
      return Ok(Vec::new());
    }
    let contents = tokio::fs::read_to_string(&self.path).await?;
    let signals: Vec<Signal> = serde_json::from_str(&contents)?;
    Ok(signals)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::signals::{Confidence, SignalAction};

  #[tokio::test]
  async fn test_static_source_drains() {
    let source = StaticSignalSource::new(vec![Signal::new("CBA.AX", SignalAction::Buy, Confidence::High)]);
    assert_eq!(source.next_signals().await.unwrap().len(), 1);
    assert!(source.next_signals().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_json_file_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signals.json");

    let source = JsonFileSignalSource::new(&path);
    assert!(source.next_signals().await.unwrap().is_empty());

    std::fs::write(&path, r#"[{"symbol": "WES.AX", "action": "BUY", "confidence": "low", "reasoning": "momentum"}]"#).unwrap();
    let signals = source.next_signals().await.unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].reasoning, "momentum");
  }
}
