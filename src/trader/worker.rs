//! Trading worker: runs one buy/sell cycle for a symbol
//!
//! A worker consumes its own subscription to the trade feed one event at a
//! time. For every event it asks the decision engine what to do, performs the
//! side effects, and reports the resulting state to the pool manager before
//! it looks at the next event.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::common::errors::{Result, TradeError};
use crate::common::traits::{ExchangeClient, OrderSink};
use crate::common::types::{OrderRecord, PriceEvent, Side, TimeInForce};
use crate::strategy::{decide, Decision, WorkerId, WorkerState};

/// Worker-to-pool notifications
///
/// Every call is a round trip: it returns only once the pool manager has
/// applied the notification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoolNotifier: Send + Sync {
    /// The worker's orders or flags changed
    async fn state_updated(&self, state: WorkerState) -> Result<()>;

    /// Price dropped below the rebuy threshold
    async fn rebuy_requested(&self, state: WorkerState) -> Result<()>;

    /// The cycle completed and the worker stopped
    async fn terminated(&self, state: WorkerState) -> Result<()>;

    /// The worker stopped because a side effect failed
    async fn failed(&self, id: WorkerId, reason: String) -> Result<()>;
}

/// Result of handling a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Exit,
}

/// Why a worker stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Sell order filled; the pool was told to replace us
    Completed,
    /// The feed for our symbol went away
    FeedClosed,
    /// A side effect failed; the pool was told
    Failed,
}

/// One trading cycle
pub struct TradingWorker {
    state: WorkerState,
    exchange: Arc<dyn ExchangeClient>,
    sink: Arc<dyn OrderSink>,
    pool: Arc<dyn PoolNotifier>,
    finished: bool,
}

impl TradingWorker {
    pub fn new(
        state: WorkerState,
        exchange: Arc<dyn ExchangeClient>,
        sink: Arc<dyn OrderSink>,
        pool: Arc<dyn PoolNotifier>,
    ) -> Self {
        Self {
            state,
            exchange,
            sink,
            pool,
            finished: false,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.state.id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Consume events until the cycle completes, the feed closes or a side
    /// effect fails
    ///
    /// Failures are reported to the pool manager here rather than returned.
    pub async fn run(mut self, mut events: broadcast::Receiver<PriceEvent>) -> WorkerExit {
        let id = self.id();
        info!(worker_id = %id, symbol = %self.state.symbol, phase = %self.state.phase(), "Worker started");

        match self.process(&mut events).await {
            Ok(exit) => {
                info!(worker_id = %id, ?exit, "Worker stopped");
                exit
            }
            Err(e) => {
                error!(worker_id = %id, error = %e, "Worker failed");
                if let Err(notify_err) = self.pool.failed(id, e.to_string()).await {
                    warn!(worker_id = %id, error = %notify_err, "Could not report worker failure");
                }
                WorkerExit::Failed
            }
        }
    }

    async fn process(&mut self, events: &mut broadcast::Receiver<PriceEvent>) -> Result<WorkerExit> {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(worker_id = %self.id(), skipped, "Worker fell behind the feed");
                    self.reconcile().await?;
                    continue;
                }
                Err(RecvError::Closed) => return Ok(WorkerExit::FeedClosed),
            };

            if self.handle_event(&event).await? == Step::Exit {
                return Ok(WorkerExit::Completed);
            }
        }
    }

    /// Decide on one event and carry the decision out
    pub async fn handle_event(&mut self, event: &PriceEvent) -> Result<Step> {
        if self.finished {
            return Ok(Step::Exit);
        }

        let decision = decide(event, &self.state);
        if decision != Decision::Skip {
            debug!(
                worker_id = %self.id(),
                trade_id = event.trade_id,
                price = %event.price,
                decision = decision.kind(),
                "Decision"
            );
        }
        self.execute(decision).await
    }

    async fn execute(&mut self, decision: Decision) -> Result<Step> {
        match decision {
            Decision::PlaceBuyOrder { price, quantity } => {
                info!(
                    worker_id = %self.id(),
                    symbol = %self.state.symbol,
                    %price,
                    %quantity,
                    "Placing buy order"
                );
                let order = self
                    .exchange
                    .place_limit_buy(&self.state.symbol, quantity, price, TimeInForce::Gtc)
                    .await?;
                self.state.buy_order = Some(order.clone());
                self.publish_and_report(&order).await?;
            }
            Decision::PlaceSellOrder { price } => {
                let quantity = self.open_buy()?.quantity;
                info!(
                    worker_id = %self.id(),
                    symbol = %self.state.symbol,
                    %price,
                    %quantity,
                    "Buy order filled, placing sell order"
                );
                let order = self
                    .exchange
                    .place_limit_sell(&self.state.symbol, quantity, price, TimeInForce::Gtc)
                    .await?;
                self.state.sell_order = Some(order.clone());
                self.publish_and_report(&order).await?;
            }
            Decision::FetchBuyOrder => {
                self.refresh(Side::Buy).await?;
            }
            Decision::FetchSellOrder => {
                self.refresh(Side::Sell).await?;
            }
            Decision::Exit => {
                info!(worker_id = %self.id(), symbol = %self.state.symbol, "Trade cycle finished");
                self.finished = true;
                self.pool.terminated(self.state.clone()).await?;
                return Ok(Step::Exit);
            }
            Decision::Rebuy => {
                info!(worker_id = %self.id(), symbol = %self.state.symbol, "Rebuy triggered");
                self.state.rebuy_notified = true;
                self.pool.rebuy_requested(self.state.clone()).await?;
            }
            Decision::Skip => {}
        }
        Ok(Step::Continue)
    }

    /// Catch up on fills whose events were dropped while lagging
    ///
    /// Only the order the cycle is waiting on can have changed. Nothing is
    /// reported when the exchange still shows the status we hold.
    async fn reconcile(&mut self) -> Result<()> {
        let pending = match (&self.state.buy_order, &self.state.sell_order) {
            (Some(buy), None) if !buy.is_filled() => Some((Side::Buy, buy.status)),
            (_, Some(sell)) if !sell.is_filled() => Some((Side::Sell, sell.status)),
            _ => None,
        };
        let Some((side, held)) = pending else {
            return Ok(());
        };

        let order = self.fetch(side).await?;
        if order.status != held {
            info!(worker_id = %self.id(), order_id = order.order_id, status = %order.status, "Recovered missed order update");
            self.publish_and_report(&order).await?;
        }
        Ok(())
    }

    /// Fetch an order's status and report it
    async fn refresh(&mut self, side: Side) -> Result<()> {
        let order = self.fetch(side).await?;
        info!(worker_id = %self.id(), order_id = order.order_id, %side, status = %order.status, "Order updated");
        self.publish_and_report(&order).await
    }

    /// Overwrite the held status of one of our orders with the exchange's
    async fn fetch(&mut self, side: Side) -> Result<OrderRecord> {
        let (since, order_id) = {
            let held = match side {
                Side::Buy => self.open_buy()?,
                Side::Sell => self.open_sell()?,
            };
            (held.transact_time, held.order_id)
        };
        let fetched = self
            .exchange
            .get_order(&self.state.symbol, since, order_id)
            .await?;
        let slot = match side {
            Side::Buy => self.state.buy_order.as_mut(),
            Side::Sell => self.state.sell_order.as_mut(),
        };
        Self::apply_status(slot, &fetched)
    }

    async fn publish_and_report(&self, order: &OrderRecord) -> Result<()> {
        self.sink.publish(order).await?;
        self.pool.state_updated(self.state.clone()).await
    }

    fn open_buy(&self) -> Result<&OrderRecord> {
        self.state
            .buy_order
            .as_ref()
            .ok_or_else(|| TradeError::Internal(format!("{} has no buy order", self.id())))
    }

    fn open_sell(&self) -> Result<&OrderRecord> {
        self.state
            .sell_order
            .as_ref()
            .ok_or_else(|| TradeError::Internal(format!("{} has no sell order", self.id())))
    }

    /// Only the status is taken from the exchange; price, quantity and
    /// transact time stay as placed
    fn apply_status(slot: Option<&mut OrderRecord>, fetched: &OrderRecord) -> Result<OrderRecord> {
        let order = slot.ok_or_else(|| TradeError::Internal("order vanished".to_string()))?;
        order.status = fetched.status;
        Ok(order.clone())
    }
}
