use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{Result, TradeError};
use crate::common::types::{OrderRecord, OrderStatus};

/// Identity of a trading worker within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Per-symbol trading parameters, fixed for the lifetime of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub symbol: String,
    /// Maximum number of concurrently active workers
    pub chunks: usize,
    /// Budget shared by all chunks, in quote currency
    pub total_budget: Decimal,
    /// Fraction below the market price at which to buy
    pub buy_down_interval: Decimal,
    /// Fraction above the buy price at which to sell
    pub profit_interval: Decimal,
    /// Fraction below the buy price that triggers a rebuy
    pub rebuy_interval: Decimal,
    pub tick_size: Decimal,
    pub step_size: Decimal,
}

impl PoolSettings {
    /// Validate settings before any worker is built from them
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(TradeError::InvalidSettings {
                symbol: self.symbol.clone(),
                reason: reason.to_string(),
            })
        };

        if self.symbol.is_empty() {
            return invalid("symbol must not be empty");
        }
        if self.chunks == 0 {
            return invalid("chunks must be at least 1");
        }
        if self.total_budget <= Decimal::ZERO {
            return invalid("budget must be positive");
        }
        if self.tick_size <= Decimal::ZERO || self.step_size <= Decimal::ZERO {
            return invalid("tick size and step size must be positive");
        }
        // A zero buy-down would bid at the market price itself
        if self.buy_down_interval <= Decimal::ZERO || self.buy_down_interval >= Decimal::ONE {
            return invalid("buy_down_interval must be in (0, 1)");
        }
        for (name, interval) in [
            ("profit_interval", self.profit_interval),
            ("rebuy_interval", self.rebuy_interval),
        ] {
            if interval < Decimal::ZERO || interval >= Decimal::ONE {
                return invalid(&format!("{} must be in [0, 1)", name));
            }
        }
        Ok(())
    }

    /// Budget of a single chunk
    pub fn worker_budget(&self) -> Decimal {
        self.total_budget / Decimal::from(self.chunks.max(1))
    }

    /// State of a worker that has not traded yet
    pub fn fresh_state(&self, id: WorkerId) -> WorkerState {
        WorkerState {
            id,
            symbol: self.symbol.clone(),
            budget: self.worker_budget(),
            buy_down_interval: self.buy_down_interval,
            profit_interval: self.profit_interval,
            rebuy_interval: self.rebuy_interval,
            tick_size: self.tick_size,
            step_size: self.step_size,
            buy_order: None,
            sell_order: None,
            rebuy_notified: false,
        }
    }
}

/// Everything a worker knows about its trading cycle
///
/// Owned by the worker; the pool manager only ever receives clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub id: WorkerId,
    pub symbol: String,
    pub budget: Decimal,
    pub buy_down_interval: Decimal,
    pub profit_interval: Decimal,
    pub rebuy_interval: Decimal,
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub buy_order: Option<OrderRecord>,
    pub sell_order: Option<OrderRecord>,
    /// Set once the worker has asked the pool for a rebuy; never reset
    pub rebuy_notified: bool,
}

impl WorkerState {
    /// Where this cycle currently stands
    pub fn phase(&self) -> WorkerPhase {
        match (&self.buy_order, &self.sell_order) {
            (None, _) => WorkerPhase::AwaitingBuy,
            (Some(buy), None) => match buy.status {
                OrderStatus::Filled => WorkerPhase::AwaitingSell,
                OrderStatus::PartiallyFilled => WorkerPhase::BuyPartial,
                _ => WorkerPhase::BuyPending,
            },
            (Some(_), Some(sell)) => match sell.status {
                OrderStatus::Filled => WorkerPhase::Terminated,
                OrderStatus::PartiallyFilled => WorkerPhase::SellPartial,
                _ => WorkerPhase::SellPending,
            },
        }
    }
}

/// Derived lifecycle stage of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerPhase {
    AwaitingBuy,
    BuyPending,
    BuyPartial,
    AwaitingSell,
    SellPending,
    SellPartial,
    Terminated,
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerPhase::AwaitingBuy => "awaiting_buy",
            WorkerPhase::BuyPending => "buy_pending",
            WorkerPhase::BuyPartial => "buy_partial",
            WorkerPhase::AwaitingSell => "awaiting_sell",
            WorkerPhase::SellPending => "sell_pending",
            WorkerPhase::SellPartial => "sell_partial",
            WorkerPhase::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

/// What a worker should do in response to one price event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    PlaceBuyOrder { price: Decimal, quantity: Decimal },
    PlaceSellOrder { price: Decimal },
    FetchBuyOrder,
    FetchSellOrder,
    /// The cycle is complete; the worker stops
    Exit,
    /// Price fell far enough below the buy price to ask for another worker
    Rebuy,
    Skip,
}

impl Decision {
    /// Short name for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::PlaceBuyOrder { .. } => "place_buy_order",
            Decision::PlaceSellOrder { .. } => "place_sell_order",
            Decision::FetchBuyOrder => "fetch_buy_order",
            Decision::FetchSellOrder => "fetch_sell_order",
            Decision::Exit => "exit",
            Decision::Rebuy => "rebuy",
            Decision::Skip => "skip",
        }
    }
}
