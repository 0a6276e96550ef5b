/**
* filename : config
* author : HAMA
* date: 2025. 5. 8.
* description: 엔진 설정 로드 및 검증
**/

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::TradingError;
use crate::signals::Confidence;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub risk: RiskConfig,
    pub exit_policy: ExitPolicyConfig,
    pub entry_profiles: EntryProfilesConfig,
    pub alerts: AlertConfig,
    pub scheduler: SchedulerConfig,
    pub gateway: GatewayConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// 포지션 크기 및 노출 한도
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// 거래당 손실 허용 비율 (계좌 대비)
    pub default_risk_fraction: Decimal,
    /// 단일 포지션 최대 금액
    pub max_position_value: Decimal,
    /// 전체 포트폴리오 최대 노출 비율
    pub max_portfolio_exposure: Decimal,
}

/// 신호 기반 청산 결정 테이블의 임계값 (단위: %)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitPolicyConfig {
    pub loss_exit_pct: Decimal,
    pub profit_take_pct: Decimal,
    pub small_loss_pct: Decimal,
}

/// 신뢰도별 진입 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryProfile {
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub risk_fraction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryProfilesConfig {
    pub high: EntryProfile,
    pub medium: EntryProfile,
    pub low: EntryProfile,
    /// 단일 매수에 쓸 수 있는 계좌 잔고 비율
    pub max_account_fraction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub loss_pct: Decimal,
    pub severe_loss_pct: Decimal,
    pub gain_pct: Decimal,
    pub proximity_ratio: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub monitor_interval_secs: u64,
    pub cycle_interval_secs: u64,
    pub trading_enabled: bool,
    pub watchlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub initial_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<String>,
    pub history_csv: Option<String>,
    pub signals_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load() -> Result<Self, TradingError> {
        // Try to load from config.json
        let config_path = Path::new("config.json");

        let mut cfg = if config_path.exists() {
            let mut file = File::open(config_path)
                .map_err(|e| TradingError::ConfigError(format!("Failed to open config file: {}", e)))?;

            let mut contents = String::new();
            file.read_to_string(&mut contents)
                .map_err(|e| TradingError::ConfigError(format!("Failed to read config file: {}", e)))?;

            Self::from_json_str(&contents)?
        } else {
            Config::default()
        };

        // environment overrides
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, TradingError> {
        serde_json::from_str(contents)
            .map_err(|e| TradingError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides for runtime fields
    fn apply_env_overrides(&mut self) {
        use std::env;
        if let Some(v) = env_decimal("MAX_POSITION_SIZE") { self.risk.max_position_value = v; }
        if let Some(v) = env_decimal("BROKER_ACCOUNT_BALANCE") { self.gateway.initial_balance = v; }
        if let Ok(v) = env::var("TRADING_ENABLED") {
            let lower = v.to_lowercase();
            if ["1", "true", "yes"].contains(&lower.as_str()) { self.scheduler.trading_enabled = true; }
            if ["0", "false", "no"].contains(&lower.as_str()) { self.scheduler.trading_enabled = false; }
        }
        if let Ok(v) = env::var("CYCLE_INTERVAL_SECONDS") {
            if let Ok(secs) = v.parse() { self.scheduler.cycle_interval_secs = secs; }
        }
        if let Ok(v) = env::var("MONITOR_INTERVAL_SECONDS") {
            if let Ok(secs) = v.parse() { self.scheduler.monitor_interval_secs = secs; }
        }
        if let Ok(v) = env::var("POSITION_STORE_PATH") { if !v.is_empty() { self.store.path = Some(v); } }
        if let Ok(v) = env::var("LOG_LEVEL") { if !v.is_empty() { self.logging.level = v; } }
    }

    /// 설정값 범위 검증
    pub fn validate(&self) -> Result<(), TradingError> {
        let risk = &self.risk;
        if risk.default_risk_fraction <= Decimal::ZERO || risk.default_risk_fraction > Decimal::ONE {
            return Err(TradingError::ConfigError(format!(
                "default_risk_fraction must be in (0, 1], got {}", risk.default_risk_fraction
            )));
        }
        if risk.max_position_value <= Decimal::ZERO {
            return Err(TradingError::ConfigError("max_position_value must be positive".to_string()));
        }
        if risk.max_portfolio_exposure <= Decimal::ZERO {
            return Err(TradingError::ConfigError("max_portfolio_exposure must be positive".to_string()));
        }
        if self.exit_policy.loss_exit_pct >= Decimal::ZERO {
            return Err(TradingError::ConfigError("loss_exit_pct must be negative".to_string()));
        }
        if self.scheduler.monitor_interval_secs == 0 || self.scheduler.cycle_interval_secs == 0 {
            return Err(TradingError::ConfigError("scheduler intervals must be positive".to_string()));
        }
        for (name, profile) in [
            ("high", &self.entry_profiles.high),
            ("medium", &self.entry_profiles.medium),
            ("low", &self.entry_profiles.low),
        ] {
            if profile.stop_loss_pct <= Decimal::ZERO || profile.stop_loss_pct >= Decimal::ONE {
                return Err(TradingError::ConfigError(format!("{} stop_loss_pct must be in (0, 1)", name)));
            }
            if profile.take_profit_pct <= Decimal::ZERO {
                return Err(TradingError::ConfigError(format!("{} take_profit_pct must be positive", name)));
            }
        }
        Ok(())
    }
}

impl EntryProfilesConfig {
    pub fn for_confidence(&self, confidence: Confidence) -> &EntryProfile {
        match confidence {
            Confidence::High => &self.high,
            Confidence::Medium => &self.medium,
            Confidence::Low => &self.low,
        }
    }
}

fn env_decimal(key: &str) -> Option<Decimal> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<Decimal>().ok())
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            default_risk_fraction: dec!(0.02),
            max_position_value: dec!(10000),
            max_portfolio_exposure: dec!(0.20),
        }
    }
}

impl Default for ExitPolicyConfig {
    fn default() -> Self {
        ExitPolicyConfig {
            loss_exit_pct: dec!(-8),
            profit_take_pct: dec!(10),
            small_loss_pct: dec!(-5),
        }
    }
}

impl Default for EntryProfilesConfig {
    fn default() -> Self {
        EntryProfilesConfig {
            high: EntryProfile { stop_loss_pct: dec!(0.05), take_profit_pct: dec!(0.15), risk_fraction: dec!(0.03) },
            medium: EntryProfile { stop_loss_pct: dec!(0.03), take_profit_pct: dec!(0.10), risk_fraction: dec!(0.02) },
            low: EntryProfile { stop_loss_pct: dec!(0.02), take_profit_pct: dec!(0.08), risk_fraction: dec!(0.01) },
            max_account_fraction: dec!(0.10),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            loss_pct: dec!(-10),
            severe_loss_pct: dec!(-15),
            gain_pct: dec!(10),
            proximity_ratio: dec!(0.02),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            monitor_interval_secs: 60,
            cycle_interval_secs: 3600,
            trading_enabled: false,
            watchlist: Vec::new(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig { initial_balance: dec!(1000) }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file_path: None,
        }
    }
}
