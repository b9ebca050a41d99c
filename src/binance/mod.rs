//! Binance module - REST and trade stream clients for Binance spot

pub mod auth;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use rest::BinanceRestClient;
pub use websocket::BinanceTradeStream;
