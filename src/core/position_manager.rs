/**
* filename : position_manager
* author : HAMA
* date: 2025. 5. 8.
* description: 포지션 개설/청산/시세 갱신 오케스트레이터
**/

use std::collections::HashSet;
use std::sync::Arc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::Config;
use crate::error::TradingError;
use crate::gateway::traits::OrderGateway;
use crate::ledger::{PositionLedger, PositionStore};
use crate::models::market_data::QuoteMap;
use crate::models::order::{Direction, TradeRequest};
use crate::models::position::{Position, PositionKey, PositionStatus, PositionType};
use crate::risk::exit::{ExitDecision, ExitEvaluator, SignalExitPolicy};
use crate::risk::guard::{self, ExposureLimits};
use crate::risk::sizer::PositionSizer;
use crate::signals::{Signal, SignalAction};

/// 공개 연산의 결과
///
/// 잔고 부족, 한도 초과, 수량 0 같은 업무상 거절은 오류가 아니라
/// `success == false` 인 결과로 돌려준다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
    pub deal_reference: Option<String>,
}

impl Outcome {
    fn accepted(message: impl Into<String>, deal_reference: impl Into<String>) -> Self {
        Outcome {
            success: true,
            message: message.into(),
            deal_reference: Some(deal_reference.into()),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Outcome {
            success: false,
            message: message.into(),
            deal_reference: None,
        }
    }
}

/// 포트폴리오 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub position_count: usize,
    pub total_exposure: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub long_count: usize,
    pub short_count: usize,
}

/// `update_all` 한 번의 결과
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// 시세가 반영된 포지션 수
    pub updated: usize,
    /// 청산 시도 결과
    pub exits: Vec<Outcome>,
    /// 청산 중 발생한 오류
    pub failures: Vec<String>,
}

/// 포지션 관리자
///
/// 원장은 공유 자원이다. 게이트웨이/저장소 호출 동안에는 원장 잠금을 잡지 않고,
/// 스냅샷 -> 잠금 해제 -> 주문 -> 재잠금 후 스냅샷 유효성 확인 순서로 변경한다.
pub struct PositionManager {
    gateway: Arc<RwLock<dyn OrderGateway>>,
    store: Arc<RwLock<dyn PositionStore>>,
    ledger: RwLock<PositionLedger>,
    /// 주문이 진행 중인 (심볼, 방향)
    pending_opens: Mutex<HashSet<(String, PositionType)>>,
    sizer: PositionSizer,
    limits: ExposureLimits,
    exit_policy: SignalExitPolicy,
}

impl PositionManager {
    pub fn new(
        gateway: Arc<RwLock<dyn OrderGateway>>,
        store: Arc<RwLock<dyn PositionStore>>,
        config: &Config,
    ) -> Self {
        PositionManager {
            gateway,
            store,
            ledger: RwLock::new(PositionLedger::new()),
            pending_opens: Mutex::new(HashSet::new()),
            sizer: PositionSizer::new(&config.risk),
            limits: ExposureLimits {
                max_trade_value: config.risk.max_position_value,
                max_portfolio_exposure_ratio: config.risk.max_portfolio_exposure,
            },
            exit_policy: SignalExitPolicy::new(&config.exit_policy),
        }
    }

    /// 브로커와 저장소로부터 원장 재구성
    pub async fn load(&self) -> Result<usize, TradingError> {
        let rebuilt = {
            let gateway = self.gateway.read().await;
            let store = self.store.read().await;
            PositionLedger::load(&*gateway, &*store).await?
        };

        let count = rebuilt.len();
        *self.ledger.write().await = rebuilt;
        Ok(count)
    }

    /// 가용 잔고 조회. 결정 직전마다 새로 읽는다
    pub async fn account_balance(&self) -> Result<Decimal, TradingError> {
        let gateway = self.gateway.read().await;
        Ok(gateway.get_account_info().await?.available_balance())
    }

    /// 기본 위험 비율로 포지션 개설
    pub async fn open(
        &self,
        symbol: &str,
        direction: Direction,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<Outcome, TradingError> {
        let risk_fraction = self.sizer.risk_fraction();
        self.open_with_risk(symbol, direction, entry_price, stop_loss, take_profit, risk_fraction).await
    }

    /// 지정한 위험 비율로 포지션 개설
    pub async fn open_with_risk(
        &self,
        symbol: &str,
        direction: Direction,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        risk_fraction: Decimal,
    ) -> Result<Outcome, TradingError> {
        self.open_with_limits(symbol, direction, entry_price, stop_loss, take_profit, risk_fraction, None)
            .await
    }

    /// 위험 비율과 계좌 대비 최대 금액 비율을 지정해 포지션 개설
    ///
    /// `account_fraction` 이 있으면 거래당 금액 상한은
    /// `min(max_position_value, 가용 잔고 * account_fraction)` 이다.
    pub async fn open_with_limits(
        &self,
        symbol: &str,
        direction: Direction,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        risk_fraction: Decimal,
        account_fraction: Option<Decimal>,
    ) -> Result<Outcome, TradingError> {
        let position_type = PositionType::from_direction(direction);

        // 손절/익절 배치 검증
        Position::new(symbol, position_type, 1, entry_price, stop_loss, take_profit, "PENDING")?;

        // 진행 중인 주문 예약
        let reservation = (symbol.to_string(), position_type);
        {
            let mut pending = self.pending_opens.lock().await;
            if !pending.insert(reservation.clone()) {
                let reason = guard::duplicate_reason(symbol, position_type);
                log::info!("포지션 개설 거절: {}", reason);
                return Ok(Outcome::rejected(reason));
            }
        }

        let result = self
            .open_reserved(symbol, position_type, entry_price, stop_loss, take_profit, risk_fraction, account_fraction)
            .await;

        self.pending_opens.lock().await.remove(&reservation);
        result
    }

    async fn open_reserved(
        &self,
        symbol: &str,
        position_type: PositionType,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        risk_fraction: Decimal,
        account_fraction: Option<Decimal>,
    ) -> Result<Outcome, TradingError> {
        let account_balance = self.account_balance().await?;
        let quantity = match account_fraction {
            Some(fraction) => {
                let cap = self.sizer.max_position_value().min(account_balance * fraction);
                self.sizer.size_capped(entry_price, stop_loss, account_balance, risk_fraction, cap)
            }
            None => self.sizer.size_with_risk(entry_price, stop_loss, account_balance, risk_fraction),
        };

        // 노출 한도 검사
        let existing = self.ledger.read().await.all();
        let admission = guard::can_open(
            symbol,
            position_type,
            quantity,
            entry_price,
            &existing,
            account_balance,
            self.limits,
        );
        if !admission.allowed {
            log::info!("포지션 개설 거절: {} {} - {}", position_type, symbol, admission.reason);
            return Ok(Outcome::rejected(admission.reason));
        }
        if quantity == 0 {
            log::info!("포지션 개설 거절: {} {} - 계산된 수량이 0", position_type, symbol);
            return Ok(Outcome::rejected("Calculated position size is zero"));
        }

        // 주문 제출
        let request = TradeRequest::market(symbol, position_type.opening_direction(), quantity)
            .with_reference_price(entry_price);
        let report = {
            let mut gateway = self.gateway.write().await;
            gateway.execute_trade(request).await.map_err(|e| {
                log::error!("개설 주문 실패: {} {} - {}", position_type, symbol, e);
                e
            })?
        };
        if !report.status.is_filled() {
            let reason = report.reason.unwrap_or_else(|| "order was not filled".to_string());
            log::warn!("개설 주문 미체결: {} {} - {}", position_type, symbol, reason);
            return Ok(Outcome::rejected(format!("Trade execution failed: {}", reason)));
        }

        let deal_reference = report
            .deal_reference
            .unwrap_or_else(|| format!("LOCAL-{}", Uuid::new_v4().simple()));
        // 체결가가 진입가 기준이다. 체결가와 맞지 않는 손절/익절가는 버린다
        let fill_price = report.fill_price.unwrap_or(entry_price);
        let mut position = Position::new(symbol, position_type, quantity, fill_price, None, None, deal_reference.clone())?;
        let dropped = attach_levels(&mut position, stop_loss, take_profit);
        for level in &dropped {
            log::warn!("체결가 ${} 기준으로 맞지 않는 {} 제거: {}", fill_price, level, position.key());
        }

        // 원장 반영
        self.ledger.write().await.insert(position.clone())?;

        // 저장
        {
            let mut store = self.store.write().await;
            if let Err(e) = store.save_position(&position).await {
                log::error!("포지션 저장 실패 {}: {}", position.key(), e);
            }
        }

        let mut message = format!("Opened {} {} {} @ ${}", position_type, quantity, symbol, position.entry_price);
        if !dropped.is_empty() {
            message.push_str(&format!(" (dropped {} after fill)", dropped.join(", ")));
        }
        log::info!("{} ({})", message, deal_reference);
        Ok(Outcome::accepted(message, deal_reference))
    }

    /// 포지션 청산. `quantity` 가 None 이거나 보유 수량과 같으면 전량 청산
    pub async fn close(
        &self,
        symbol: &str,
        position_type: PositionType,
        quantity: Option<u64>,
    ) -> Result<Outcome, TradingError> {
        // 스냅샷
        let snapshot = match self.ledger.read().await.find(symbol, position_type) {
            Some(position) => position.clone(),
            None => {
                log::info!("청산 거절: 활성 {} {} 포지션 없음", position_type, symbol);
                return Ok(Outcome::rejected(format!("No active {} position for {}", position_type, symbol)));
            }
        };

        let held = snapshot.held_quantity();
        let close_quantity = quantity.unwrap_or(held);
        if close_quantity == 0 || close_quantity > held {
            return Ok(Outcome::rejected(format!(
                "Invalid close quantity {} for {} (held {})",
                close_quantity, symbol, held
            )));
        }
        let full = close_quantity == held;

        // 주문 제출 (원장 잠금 없이)
        let reference_price = snapshot.current_price.unwrap_or(snapshot.entry_price);
        let request = TradeRequest::market(symbol, snapshot.closing_direction(), close_quantity)
            .with_reference_price(reference_price);
        let report = {
            let mut gateway = self.gateway.write().await;
            gateway.execute_trade(request).await.map_err(|e| {
                log::error!("청산 주문 실패: {} {} - {}", position_type, symbol, e);
                e
            })?
        };
        if !report.status.is_filled() {
            let reason = report.reason.unwrap_or_else(|| "order was not filled".to_string());
            log::warn!("청산 주문 미체결: {} {} - {}", position_type, symbol, reason);
            return Ok(Outcome::rejected(format!("Close execution failed: {}", reason)));
        }
        let exit_price = report.fill_price.unwrap_or(reference_price);
        let deal_reference = report.deal_reference.unwrap_or_else(|| snapshot.deal_reference.clone());

        // 재잠금 후 스냅샷 유효성 확인
        let key = snapshot.key();
        let updated = {
            let mut ledger = self.ledger.write().await;
            let still_valid = ledger
                .get(&key)
                .map(|p| p.quantity == snapshot.quantity && p.status == snapshot.status)
                .unwrap_or(false);
            if !still_valid {
                log::warn!("청산 충돌: {} 이(가) 주문 중 다른 작업에 의해 변경됨, 반영 취소", key);
                return Err(TradingError::ReconciliationConflict(format!(
                    "{} changed while closing order {} was in flight",
                    key, deal_reference
                )));
            }

            let Some(mut position) = ledger.get(&key).cloned() else {
                return Err(TradingError::PositionNotFound(key.to_string()));
            };
            let closed_signed = i64::try_from(close_quantity)
                .map_err(|_| TradingError::InvalidParameter(format!("close quantity {} out of range", close_quantity)))?
                * position.quantity.signum();
            let realized = position.pnl_at(exit_price, closed_signed);
            position.realized_pnl += realized;

            if full {
                position.mark_price(exit_price);
                position.unrealized_pnl = Some(Decimal::ZERO);
                ledger.upsert(position)?;
                ledger
                    .close_out(&key)
                    .ok_or_else(|| TradingError::PositionNotFound(key.to_string()))?
            } else {
                position.quantity -= closed_signed;
                position.status = PositionStatus::Partial;
                position.mark_price(exit_price);
                ledger.upsert(position.clone())?;
                position
            }
        };

        // 저장
        {
            let mut store = self.store.write().await;
            let persisted = match store.update_position(&updated).await {
                Err(TradingError::PersistenceError(_)) => store.save_position(&updated).await,
                other => other,
            };
            if let Err(e) = persisted {
                log::error!("포지션 저장 실패 {}: {}", key, e);
            }
        }

        let message = if full {
            format!(
                "Closed {} {} {} @ ${} (realized ${})",
                position_type, close_quantity, symbol, exit_price, updated.realized_pnl
            )
        } else {
            format!(
                "Partially closed {} {} of {} {} @ ${} ({} remaining)",
                position_type, close_quantity, held, symbol, exit_price, updated.held_quantity()
            )
        };
        log::info!("{}", message);
        Ok(Outcome::accepted(message, deal_reference))
    }

    /// 시세 반영 후 손절/익절 평가. 청산 신호가 나온 포지션은 같은 호출 안에서 청산한다
    pub async fn update_all(&self, quotes: &QuoteMap) -> UpdateReport {
        let mut report = UpdateReport::default();

        // 시세 반영과 평가
        let exits: Vec<(Position, ExitDecision)> = {
            let mut ledger = self.ledger.write().await;
            let mut exits = Vec::new();
            for position in ledger.iter_mut() {
                let Some(price) = quotes.get(&position.symbol).and_then(|q| q.usable_price()) else {
                    continue;
                };
                let decision = ExitEvaluator::mark_and_evaluate(position, price);
                report.updated += 1;
                if !decision.is_hold() {
                    exits.push((position.clone(), decision));
                }
            }
            exits
        };

        // 청산
        for (position, decision) in exits {
            log::info!("청산 조건 발생: {} - {}", position.key(), decision.reason());
            match self
                .close(&position.symbol, position.position_type, decision.close_quantity())
                .await
            {
                Ok(outcome) => report.exits.push(outcome),
                Err(e) => {
                    log::error!("자동 청산 실패 {}: {}", position.key(), e);
                    report.failures.push(format!("{}: {}", position.key(), e));
                }
            }
        }

        report
    }

    /// 보유 포지션에 대한 반대 신호 처리
    ///
    /// SELL 은 LONG, BUY 는 SHORT 포지션을 대상으로 한다. 대상 포지션이 없거나
    /// 결정이 보유이면 None.
    pub async fn apply_signal_exit(
        &self,
        signal: &Signal,
        current_price: Option<Decimal>,
    ) -> Result<Option<Outcome>, TradingError> {
        let position_type = match signal.action {
            SignalAction::Sell => PositionType::Long,
            SignalAction::Buy => PositionType::Short,
            SignalAction::Hold => return Ok(None),
        };

        let (pnl_pct, held) = {
            let mut ledger = self.ledger.write().await;
            let Some(key) = ledger.find(&signal.symbol, position_type).map(|p| p.key()) else {
                return Ok(None);
            };
            let Some(position) = ledger.get_mut(&key) else {
                return Ok(None);
            };
            if let Some(price) = current_price.filter(|p| *p > Decimal::ZERO) {
                position.mark_price(price);
            }
            (position.pnl_percentage(), position.held_quantity())
        };

        let decision = self.exit_policy.decide(signal.confidence, pnl_pct, held);
        if decision.is_hold() {
            log::info!(
                "{} {} 보유 유지: 신뢰도 {}, 손익률 {}%",
                position_type, signal.symbol, signal.confidence, pnl_pct.round_dp(2)
            );
            return Ok(None);
        }

        log::info!("신호 기반 청산: {} {} - {}", position_type, signal.symbol, decision.reason());
        let outcome = self
            .close(&signal.symbol, position_type, decision.close_quantity())
            .await?;
        Ok(Some(outcome))
    }

    /// 포트폴리오 요약 (읽기 전용)
    pub async fn summary(&self) -> PortfolioSummary {
        let ledger = self.ledger.read().await;
        let positions = ledger.all();

        let total_exposure = guard::total_exposure(&positions);
        let total_unrealized_pnl = positions.iter().filter_map(|p| p.unrealized_pnl).sum();
        let total_realized_pnl = positions
            .iter()
            .chain(ledger.history().iter())
            .map(|p| p.realized_pnl)
            .sum();

        PortfolioSummary {
            position_count: positions.len(),
            total_exposure,
            total_unrealized_pnl,
            total_realized_pnl,
            long_count: positions.iter().filter(|p| p.is_long()).count(),
            short_count: positions.iter().filter(|p| p.is_short()).count(),
        }
    }

    /// 활성 포지션 스냅샷
    pub async fn positions(&self) -> Vec<Position> {
        self.ledger.read().await.all()
    }

    pub async fn position(&self, key: &PositionKey) -> Option<Position> {
        self.ledger.read().await.get(key).cloned()
    }

    /// 청산 이력
    pub async fn history(&self) -> Vec<Position> {
        self.ledger.read().await.history().to_vec()
    }

    /// 보유 중인 심볼
    pub async fn held_symbols(&self) -> Vec<String> {
        self.ledger.read().await.symbols()
    }

    pub async fn is_held(&self, symbol: &str, position_type: PositionType) -> bool {
        self.ledger.read().await.find(symbol, position_type).is_some()
    }
}

/// 손절/익절가를 하나씩 붙여 보고 배치가 맞지 않는 값은 버린다. 버린 항목 설명을 돌려준다
fn attach_levels(position: &mut Position, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Vec<String> {
    let mut dropped = Vec::new();

    if let Some(stop) = stop_loss {
        position.stop_loss = Some(stop);
        if position.validate().is_err() {
            position.stop_loss = None;
            dropped.push(format!("stop loss ${}", stop));
        }
    }
    if let Some(target) = take_profit {
        position.take_profit = Some(target);
        if position.validate().is_err() {
            position.take_profit = None;
            dropped.push(format!("take profit ${}", target));
        }
    }
    dropped
}
