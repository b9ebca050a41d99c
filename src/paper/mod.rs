//! Paper trading: a local stand-in for the exchange
//!
//! [`PaperExchange`] keeps resting limit orders in memory and fills them when
//! a real trade crosses their price. [`run_feed_bridge`] sits between the
//! Binance trade stream and the feed, so workers see the synthetic fill
//! events exactly as they would see fills on the real exchange.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::channels::BroadcastFeed;
use crate::common::errors::{Result, TradeError};
use crate::common::traits::ExchangeClient;
use crate::common::types::{
    OrderId, OrderRecord, OrderStatus, PriceEvent, Side, SymbolFilters, TimeInForce,
};

/// Binance error code for a rejected price or quantity
const ERR_FILTER_FAILURE: i64 = -1013;

#[derive(Debug, Default)]
struct Book {
    next_id: OrderId,
    /// Every order ever placed, by id
    orders: BTreeMap<OrderId, OrderRecord>,
    /// Ids of orders that can still fill
    open: BTreeSet<OrderId>,
    filters: HashMap<String, SymbolFilters>,
}

/// In-memory exchange that fills limit orders against observed trades
#[derive(Debug)]
pub struct PaperExchange {
    book: Mutex<Book>,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self {
            book: Mutex::new(Book {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        // Book updates never panic half way, so a poisoned lock is still consistent
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make a symbol tradable with the given increments
    pub fn register_symbol(&self, symbol: &str, filters: SymbolFilters) {
        self.book().filters.insert(symbol.to_uppercase(), filters);
    }

    /// Orders that are neither filled nor cancelled
    pub fn open_orders(&self, symbol: &str) -> Vec<OrderRecord> {
        let symbol = symbol.to_uppercase();
        let book = self.book();
        book.open
            .iter()
            .filter_map(|id| book.orders.get(id))
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Fill every open order the trade crosses
    ///
    /// Returns one synthetic trade per fill, carrying the filled order's id on
    /// its side of the match.
    pub fn on_trade(&self, trade: &PriceEvent) -> Vec<PriceEvent> {
        let mut guard = self.book();
        let Book { orders, open, .. } = &mut *guard;
        let mut fills = Vec::new();

        open.retain(|id| {
            let Some(order) = orders.get_mut(id) else {
                return false;
            };
            let crossed = order.symbol == trade.symbol
                && match order.side {
                    Side::Buy => order.price >= trade.price,
                    Side::Sell => order.price <= trade.price,
                };
            if !crossed {
                return true;
            }

            order.status = OrderStatus::Filled;
            debug!(order_id = order.order_id, side = %order.side, price = %order.price, "Paper order filled");

            let fill = PriceEvent {
                symbol: order.symbol.clone(),
                price: order.price,
                quantity: order.quantity,
                buyer_order_id: 0,
                seller_order_id: 0,
                trade_id: trade.trade_id,
                trade_time: trade.trade_time,
            };
            fills.push(match order.side {
                Side::Buy => fill.with_buyer(order.order_id),
                Side::Sell => fill.with_seller(order.order_id),
            });
            false
        });
        fills
    }

    fn place(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord> {
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            return Err(TradeError::Exchange {
                code: ERR_FILTER_FAILURE,
                message: format!("Filter failure: price {} quantity {}", price, quantity),
            });
        }

        let mut book = self.book();
        let order_id = book.next_id;
        book.next_id += 1;

        let order = OrderRecord {
            order_id,
            symbol: symbol.to_uppercase(),
            side,
            price,
            quantity,
            status: OrderStatus::New,
            transact_time: chrono::Utc::now().timestamp_millis(),
        };
        book.orders.insert(order_id, order.clone());
        book.open.insert(order_id);

        info!(order_id, %side, %price, %quantity, %time_in_force, "Paper order placed");
        Ok(order)
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn place_limit_buy(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord> {
        self.place(symbol, Side::Buy, quantity, price, time_in_force)
    }

    async fn place_limit_sell(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord> {
        self.place(symbol, Side::Sell, quantity, price, time_in_force)
    }

    async fn get_order(
        &self,
        symbol: &str,
        _since_timestamp: i64,
        order_id: OrderId,
    ) -> Result<OrderRecord> {
        self.book()
            .orders
            .get(&order_id)
            .filter(|o| o.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or(TradeError::OrderNotFound(order_id))
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        self.book()
            .filters
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| TradeError::UnknownSymbol(symbol.to_uppercase()))
    }
}

/// Feed live trades through the paper exchange
///
/// Every upstream trade is published to the feed, followed by the synthetic
/// fills it caused. Returns once the upstream sender is dropped.
pub async fn run_feed_bridge(
    mut upstream: mpsc::Receiver<PriceEvent>,
    feed: BroadcastFeed,
    exchange: Arc<PaperExchange>,
) {
    while let Some(trade) = upstream.recv().await {
        let fills = exchange.on_trade(&trade);
        for event in std::iter::once(trade).chain(fills) {
            if let Err(e) = feed.publish(event) {
                warn!(error = %e, "Failed to publish trade event");
            }
        }
    }
    debug!("Upstream trade stream closed");
}
