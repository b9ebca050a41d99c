//! naive_trader Library
//!
//! A grid-style trading bot for Binance spot. For every traded symbol a pool
//! of workers runs independent buy-low/sell-high cycles against the live trade
//! stream, with at most `chunks` cycles open at a time.

pub mod binance;
pub mod common;
pub mod config;
pub mod paper;
pub mod strategy;
pub mod trader;

// Re-export commonly used types
pub use binance::{BinanceRestClient, BinanceTradeStream};
pub use common::channels::{BroadcastFeed, BroadcastOrderSink};
pub use common::errors::{Result, TradeError};
pub use common::traits::{EventFeed, ExchangeClient, OrderSink};
pub use common::types::{OrderId, OrderRecord, OrderStatus, PriceEvent, Side, SymbolFilters, TimeInForce};
pub use config::types::AppConfig;
pub use paper::PaperExchange;
pub use trader::Orchestrator;

// Strategy types
pub use strategy::{decide, Decision, PoolSettings, WorkerId, WorkerPhase, WorkerState};
