//! Unified types shared by the exchange clients, the feed and the traders

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange-assigned order identifier
pub type OrderId = u64;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// How long a limit order stays on the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

/// Order status as last observed on the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A single trade tick from the market feed
///
/// `buyer_order_id` and `seller_order_id` are the exchange order ids on each
/// side of the match, which is how a trader recognises fills of its own orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEvent {
    /// Exchange symbol, e.g. `XRPUSDT`
    pub symbol: String,
    /// Trade price
    pub price: Decimal,
    /// Traded quantity
    pub quantity: Decimal,
    /// Order id of the buying side
    pub buyer_order_id: OrderId,
    /// Order id of the selling side
    pub seller_order_id: OrderId,
    /// Trade sequence id
    pub trade_id: u64,
    /// Trade time in milliseconds since the epoch
    pub trade_time: i64,
}

impl PriceEvent {
    /// Create a price tick that matches none of our orders
    pub fn tick(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            quantity: Decimal::ZERO,
            buyer_order_id: 0,
            seller_order_id: 0,
            trade_id: 0,
            trade_time: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_buyer(mut self, order_id: OrderId) -> Self {
        self.buyer_order_id = order_id;
        self
    }

    pub fn with_seller(mut self, order_id: OrderId) -> Self {
        self.seller_order_id = order_id;
        self
    }

    pub fn with_trade_id(mut self, trade_id: u64) -> Self {
        self.trade_id = trade_id;
        self
    }
}

/// A previously placed exchange order as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    /// Limit price
    pub price: Decimal,
    /// Original order quantity
    pub quantity: Decimal,
    pub status: OrderStatus,
    /// Time the order was accepted, in milliseconds since the epoch
    pub transact_time: i64,
}

impl OrderRecord {
    pub fn is_filled(&self) -> bool {
        self.status.is_filled()
    }

    pub fn transact_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.transact_time)
    }
}

/// Price and quantity granularity the exchange enforces for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub tick_size: Decimal,
    pub step_size: Decimal,
}
