//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::errors::{Result, TradeError};
use crate::common::types::SymbolFilters;
use crate::strategy::PoolSettings;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Binance connection settings
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Trading parameters
    #[serde(default)]
    pub trading: TradingConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Binance connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key for signed requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret for signing requests
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Base URL for the REST API
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Base URL for market streams
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,
    /// Simulate fills locally instead of sending orders
    #[serde(default = "default_paper_trading")]
    pub paper_trading: bool,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Validity window for signed requests in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
}

impl ExchangeConfig {
    /// Credentials, if both halves are configured
    pub fn credentials(&self) -> Option<ApiCredentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(ApiCredentials::new(key.clone(), secret.clone()))
            }
            _ => None,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            rest_url: default_rest_url(),
            websocket_url: default_websocket_url(),
            paper_trading: default_paper_trading(),
            request_timeout_seconds: default_request_timeout(),
            recv_window_ms: default_recv_window(),
        }
    }
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_websocket_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_paper_trading() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_recv_window() -> u64 {
    5000
}

/// Trading parameters shared by every symbol unless overridden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Symbols to trade at startup
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_chunks")]
    pub chunks: usize,
    /// Total budget per symbol, in quote currency
    #[serde(default = "default_budget")]
    pub budget: Decimal,
    #[serde(default = "default_buy_down_interval")]
    pub buy_down_interval: Decimal,
    #[serde(default = "default_profit_interval")]
    pub profit_interval: Decimal,
    #[serde(default = "default_rebuy_interval")]
    pub rebuy_interval: Decimal,
    /// Fixed price increment; fetched from the exchange when absent
    #[serde(default)]
    pub tick_size: Option<Decimal>,
    /// Fixed quantity increment; fetched from the exchange when absent
    #[serde(default)]
    pub step_size: Option<Decimal>,
    /// Per-symbol overrides keyed by symbol
    #[serde(default)]
    pub overrides: HashMap<String, SymbolOverrides>,
}

impl TradingConfig {
    fn overrides_for(&self, symbol: &str) -> Option<&SymbolOverrides> {
        self.overrides
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(symbol))
            .map(|(_, o)| o)
    }

    /// Whether the increments for `symbol` must come from the exchange
    pub fn needs_filters(&self, symbol: &str) -> bool {
        let o = self.overrides_for(symbol);
        o.and_then(|o| o.tick_size).or(self.tick_size).is_none()
            || o.and_then(|o| o.step_size).or(self.step_size).is_none()
    }

    /// Resolve the pool settings for one symbol
    ///
    /// Configured increments win over exchange `filters`. The result is
    /// validated.
    pub fn pool_settings(&self, symbol: &str, filters: Option<&SymbolFilters>) -> Result<PoolSettings> {
        let symbol = symbol.to_uppercase();
        let o = self.overrides_for(&symbol);

        let tick_size = o
            .and_then(|o| o.tick_size)
            .or(self.tick_size)
            .or(filters.map(|f| f.tick_size));
        let step_size = o
            .and_then(|o| o.step_size)
            .or(self.step_size)
            .or(filters.map(|f| f.step_size));

        let (Some(tick_size), Some(step_size)) = (tick_size, step_size) else {
            return Err(TradeError::InvalidSettings {
                symbol,
                reason: "tick size and step size are unknown".to_string(),
            });
        };

        let settings = PoolSettings {
            chunks: o.and_then(|o| o.chunks).unwrap_or(self.chunks),
            total_budget: o.and_then(|o| o.budget).unwrap_or(self.budget),
            buy_down_interval: o
                .and_then(|o| o.buy_down_interval)
                .unwrap_or(self.buy_down_interval),
            profit_interval: o
                .and_then(|o| o.profit_interval)
                .unwrap_or(self.profit_interval),
            rebuy_interval: o
                .and_then(|o| o.rebuy_interval)
                .unwrap_or(self.rebuy_interval),
            tick_size,
            step_size,
            symbol,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            chunks: default_chunks(),
            budget: default_budget(),
            buy_down_interval: default_buy_down_interval(),
            profit_interval: default_profit_interval(),
            rebuy_interval: default_rebuy_interval(),
            tick_size: None,
            step_size: None,
            overrides: HashMap::new(),
        }
    }
}

fn default_chunks() -> usize {
    5
}

fn default_budget() -> Decimal {
    dec!(100)
}

fn default_buy_down_interval() -> Decimal {
    dec!(0.0001)
}

fn default_profit_interval() -> Decimal {
    dec!(0.001)
}

fn default_rebuy_interval() -> Decimal {
    dec!(0.001)
}

/// Per-symbol trading overrides; unset fields fall back to [`TradingConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolOverrides {
    pub chunks: Option<usize>,
    pub budget: Option<Decimal>,
    pub buy_down_interval: Option<Decimal>,
    pub profit_interval: Option<Decimal>,
    pub rebuy_interval: Option<Decimal>,
    pub tick_size: Option<Decimal>,
    pub step_size: Option<Decimal>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
    /// Buffer size of each symbol's trade feed
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    /// Buffer size of each pool's command queue
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
    /// Consecutive failures after which a worker is given up on
    #[serde(default = "default_max_worker_restarts")]
    pub max_worker_restarts: u32,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            feed_capacity: default_feed_capacity(),
            command_capacity: default_command_capacity(),
            max_worker_restarts: default_max_worker_restarts(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_feed_capacity() -> usize {
    1024
}

fn default_command_capacity() -> usize {
    256
}

fn default_max_worker_restarts() -> u32 {
    3
}

fn default_reconnect_delay() -> u64 {
    5000
}

/// API credentials for signed requests
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self { api_key, api_secret }
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
