//! Error type shared by the exchange adapters, the pool and the workers

use thiserror::Error;

use super::types::OrderId;

/// Result type alias using our TradeError
pub type Result<T> = std::result::Result<T, TradeError>;

/// Main error type for trading operations
#[derive(Error, Debug)]
pub enum TradeError {
    /// Trade stream could not be opened
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// Trade stream failed after connecting
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Error reported by the exchange itself
    #[error("Exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    /// Body did not match the expected wire format
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Pool settings that cannot produce a valid worker
    #[error("Invalid settings for {symbol}: {reason}")]
    InvalidSettings { symbol: String, reason: String },

    /// Symbol unknown to the exchange or the feed
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Order unknown to the exchange
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order update could not be published
    #[error("Publish error: {0}")]
    Publish(String),

    /// The pool manager task is gone
    #[error("Pool manager unavailable for {0}")]
    PoolUnavailable(String),

    /// A worker could not be started
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Already trading {0}")]
    AlreadyTrading(String),

    #[error("Not trading {0}")]
    NotTrading(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TradeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TradeError::WebSocketCommunication(err.to_string())
    }
}

impl From<config::ConfigError> for TradeError {
    fn from(err: config::ConfigError) -> Self {
        TradeError::Configuration(err.to_string())
    }
}
