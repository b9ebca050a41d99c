//! Trait definitions for the collaborators a trader talks to
//!
//! Traders only ever see these traits. Production wires in the Binance
//! clients and the broadcast channels; tests wire in mocks or the paper
//! exchange.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use super::errors::Result;
use super::types::{OrderId, OrderRecord, PriceEvent, SymbolFilters, TimeInForce};

/// Order placement and lookup on an exchange
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Place a limit buy order
    async fn place_limit_buy(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord>;

    /// Place a limit sell order
    async fn place_limit_sell(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord>;

    /// Look up the current state of an order
    ///
    /// # Arguments
    /// * `since_timestamp` - transact time of the order, in epoch millis
    async fn get_order(
        &self,
        symbol: &str,
        since_timestamp: i64,
        order_id: OrderId,
    ) -> Result<OrderRecord>;

    /// Price and quantity granularity for a symbol
    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;
}

/// Source of trade ticks for a symbol
///
/// Delivery is ordered per subscriber. Duplicates are possible and expected.
#[cfg_attr(test, mockall::automock)]
pub trait EventFeed: Send + Sync {
    /// Subscribe to the trade ticks of a symbol
    fn subscribe(&self, symbol: &str) -> Result<broadcast::Receiver<PriceEvent>>;
}

/// Broadcast of every observed order state change
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn publish(&self, order: &OrderRecord) -> Result<()>;
}
