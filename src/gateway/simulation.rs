use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::TradingError;
use crate::gateway::traits::OrderGateway;
use crate::models::account::AccountInfo;
use crate::models::order::{BrokerPosition, Direction, ExecutionReport, ExecutionStatus, TradeRequest};

/// In-process broker used when live trading is disabled.
///
/// Fills every order immediately at the request's reference price, falling
/// back to the last price fed through `set_price`. Keeps a cash balance and
/// reports the positions it holds so the ledger can reconcile against it on
/// startup.
pub struct SimulatedGateway {
    account_id: String,
    balance: Decimal,
    prices: HashMap<String, Decimal>,
    positions: Vec<BrokerPosition>,
    failures_remaining: u32,
}

impl SimulatedGateway {
    pub fn new(initial_balance: Decimal) -> Self {
        log::info!("모의 브로커 사용: 잔고 ${} - 실제 주문은 실행되지 않음", initial_balance);
        Self {
            account_id: "SIMULATED".to_string(),
            balance: initial_balance,
            prices: HashMap::new(),
            positions: Vec::new(),
            failures_remaining: 0,
        }
    }

    pub fn set_price(&mut self, symbol: impl Into<String>, price: Decimal) {
        self.prices.insert(symbol.into(), price);
    }

    /// Seed a position as if the broker already held it
    pub fn with_position(mut self, position: BrokerPosition) -> Self {
        self.positions.push(position);
        self
    }

    /// Fail the next `count` order submissions with a connectivity error
    pub fn fail_next(&mut self, count: u32) {
        self.failures_remaining = count;
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    fn check_connectivity(&mut self) -> Result<(), TradingError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(TradingError::GatewayError("simulated connection failure".to_string()));
        }
        Ok(())
    }

    fn new_reference() -> String {
        format!("SIM-{}", Uuid::new_v4().simple())
    }

    /// Reduce the opposite-side holding first; anything left opens a new position
    fn apply_fill(&mut self, request: &TradeRequest, price: Decimal, deal_reference: &str) {
        let mut remaining = request.quantity;
        let opposite = match request.direction {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        };

        for held in self
            .positions
            .iter_mut()
            .filter(|p| p.symbol == request.symbol && p.direction == opposite)
        {
            if remaining == 0 {
                break;
            }
            let reduce = held.size.min(remaining);
            held.size -= reduce;
            remaining -= reduce;
        }
        self.positions.retain(|p| p.size > 0);

        if remaining > 0 {
            self.positions.push(BrokerPosition {
                symbol: request.symbol.clone(),
                direction: request.direction,
                size: remaining,
                level: price,
                bid: Some(price),
                deal_id: deal_reference.to_string(),
            });
        }
    }
}

#[async_trait]
impl OrderGateway for SimulatedGateway {
    async fn execute_trade(&mut self, request: TradeRequest) -> Result<ExecutionReport, TradingError> {
        self.check_connectivity()?;

        let price = match request.reference_price.or_else(|| self.prices.get(&request.symbol).copied()) {
            Some(p) if p > Decimal::ZERO => p,
            _ => {
                log::warn!("{} 가격을 알 수 없어 모의 주문 거부", request.symbol);
                return Ok(ExecutionReport::rejected(format!("Could not determine price for {}", request.symbol)));
            }
        };

        let total = price * Decimal::from(request.quantity);
        match request.direction {
            Direction::Buy => {
                if total > self.balance {
                    log::warn!(
                        "모의 주문 잔고 부족: {} {} {} @ ${} - 필요 ${}, 가용 ${}",
                        request.direction, request.quantity, request.symbol, price, total, self.balance
                    );
                    return Ok(ExecutionReport::rejected("Insufficient balance"));
                }
                self.balance -= total;
            }
            Direction::Sell => self.balance += total,
        }

        let deal_reference = Self::new_reference();
        self.apply_fill(&request, price, &deal_reference);
        log::info!(
            "모의 체결: {} {} {} @ ${} (잔고 ${})",
            request.direction, request.quantity, request.symbol, price, self.balance
        );

        Ok(ExecutionReport::filled(ExecutionStatus::Simulated, deal_reference).with_fill_price(price))
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, TradingError> {
        Ok(self
            .positions
            .iter()
            .cloned()
            .map(|mut p| {
                p.bid = self.prices.get(&p.symbol).copied().or(p.bid);
                p
            })
            .collect())
    }

    async fn get_account_info(&self) -> Result<AccountInfo, TradingError> {
        Ok(AccountInfo::single(self.account_id.clone(), self.balance))
    }
}
