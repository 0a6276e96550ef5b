//! 로깅 유틸리티
//!
//! 로그 초기화 및 유틸리티 함수 제공

use std::fs::OpenOptions;
use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::core::position_manager::PortfolioSummary;
use crate::error::TradingError;

/// 로그 레벨 문자열 파싱. 알 수 없는 값은 info
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// 로깅 시스템 초기화
///
/// RUST_LOG 가 설정되어 있으면 모듈별 필터는 그대로 따르고, 전체 레벨은 `level` 로 정한다.
/// `file_path` 가 있으면 표준 에러 대신 파일에 덧붙여 기록한다.
pub fn init(level: &str, file_path: Option<&str>) -> Result<(), TradingError> {
    let mut builder = Builder::from_default_env();
    builder.filter_level(parse_level(level)).format_timestamp_millis();

    if let Some(path) = file_path {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| TradingError::ConfigError(format!("logger already initialised: {}", e)))?;

    log::info!("로깅 시스템 초기화 완료: 레벨 = {}", level);
    Ok(())
}

/// 포트폴리오 요약 로그
pub fn log_portfolio_summary(summary: &PortfolioSummary) {
    log::info!(
        "포트폴리오: 포지션 {}건 (LONG {}, SHORT {}) - 노출 ${} - 미실현 ${} - 실현 ${}",
        summary.position_count,
        summary.long_count,
        summary.short_count,
        summary.total_exposure.round_dp(2),
        summary.total_unrealized_pnl.round_dp(2),
        summary.total_realized_pnl.round_dp(2)
    );
}

/// 오류 로그
pub fn log_error(context: &str, error: &TradingError) {
    if error.is_retryable() {
        log::warn!("재시도 가능 오류 - {}: {}", context, error);
    } else {
        log::error!("오류 발생 - {}: {}", context, error);
    }
}
