/**
* filename : signal_types
* author : HAMA
* date: 2025. 5. 11.
* description: 외부 신호 공급원이 전달하는 매매 신호
**/

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
  Buy,
  Sell,
  Hold,
}

/// 신호 강도 등급
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
  Low,
  Medium,
  High,
}

impl Confidence {
  // 대소문자 무시하고 파싱, 알 수 없는 값은 None
  pub fn parse(value: &str) -> Option<Self> {
    match value.trim().to_lowercase().as_str() {
      "high" => Some(Confidence::High),
      "medium" => Some(Confidence::Medium),
      "low" => Some(Confidence::Low),
      _ => None,
    }
  }
}

impl fmt::Display for Confidence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Confidence::High => write!(f, "high"),
      Confidence::Medium => write!(f, "medium"),
      Confidence::Low => write!(f, "low"),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
  pub symbol: String,
  pub action: SignalAction,
  pub confidence: Confidence,
  #[serde(default)]
  pub reasoning: String,
}

impl Signal {
  pub fn new(symbol: impl Into<String>, action: SignalAction, confidence: Confidence) -> Self {
    Signal {
      symbol: symbol.into(),
      action,
      confidence,
      reasoning: String::new(),
    }
  }

  pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
    self.reasoning = reasoning.into();
    self
  }
}
