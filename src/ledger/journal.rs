//! 청산 이력 CSV 내보내기

use std::path::Path;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::TradingError;
use crate::models::position::{Position, PositionType};

#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    symbol: &'a str,
    position_type: PositionType,
    deal_reference: &'a str,
    quantity: u64,
    entry_price: Decimal,
    exit_price: Option<Decimal>,
    entry_date: DateTime<Utc>,
    closed_at: DateTime<Utc>,
    realized_pnl: Decimal,
}

/// 청산된 포지션을 CSV 로 기록하고 기록한 행 수를 돌려준다
pub fn export_history_csv(path: impl AsRef<Path>, positions: &[Position]) -> Result<usize, TradingError> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    let mut rows = 0;

    for position in positions.iter().filter(|p| !p.is_active()) {
        writer.serialize(JournalRow {
            symbol: &position.symbol,
            position_type: position.position_type,
            deal_reference: &position.deal_reference,
            quantity: position.held_quantity(),
            entry_price: position.entry_price,
            exit_price: position.current_price,
            entry_date: position.entry_date,
            closed_at: position.updated_at,
            realized_pnl: position.realized_pnl,
        })?;
        rows += 1;
    }

    writer.flush()?;
    log::info!("청산 이력 {}건 내보내기: {}", rows, path.as_ref().display());
    Ok(rows)
}
