//! Starts and stops one trading pool per symbol

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::leader::{spawn_pool, PoolHandle};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{EventFeed, ExchangeClient, OrderSink};
use crate::config::types::{AppSettings, TradingConfig};
use crate::strategy::{PoolSettings, WorkerState};

/// A running pool and the task driving it
struct TradingSession {
    pool: PoolHandle,
    task: JoinHandle<Result<()>>,
}

/// Owns every per-symbol trading session
pub struct Orchestrator {
    trading: TradingConfig,
    settings: AppSettings,
    exchange: Arc<dyn ExchangeClient>,
    sink: Arc<dyn OrderSink>,
    feed: Arc<dyn EventFeed>,
    sessions: HashMap<String, TradingSession>,
}

impl Orchestrator {
    pub fn new(
        trading: TradingConfig,
        settings: AppSettings,
        exchange: Arc<dyn ExchangeClient>,
        sink: Arc<dyn OrderSink>,
        feed: Arc<dyn EventFeed>,
    ) -> Self {
        Self {
            trading,
            settings,
            exchange,
            sink,
            feed,
            sessions: HashMap::new(),
        }
    }

    /// Start trading a symbol with the configured parameters
    ///
    /// Missing price and quantity increments are fetched from the exchange.
    #[instrument(skip(self))]
    pub async fn start_trading(&mut self, symbol: &str) -> Result<()> {
        let symbol = symbol.to_uppercase();
        self.ensure_idle(&symbol)?;

        let filters = if self.trading.needs_filters(&symbol) {
            Some(self.exchange.symbol_filters(&symbol).await?)
        } else {
            None
        };
        let settings = self.trading.pool_settings(&symbol, filters.as_ref())?;
        self.start_with(settings)
    }

    /// Start trading with explicit pool settings
    pub fn start_with(&mut self, settings: PoolSettings) -> Result<()> {
        let symbol = settings.symbol.to_uppercase();
        self.ensure_idle(&symbol)?;

        let (pool, task) = spawn_pool(
            settings,
            self.exchange.clone(),
            self.sink.clone(),
            self.feed.clone(),
            self.settings.command_capacity,
            self.settings.max_worker_restarts,
        )?;
        info!(%symbol, "Trading started");
        self.sessions.insert(symbol, TradingSession { pool, task });
        Ok(())
    }

    /// Abort every worker of a symbol and wait for its pool to exit
    #[instrument(skip(self))]
    pub async fn stop_trading(&mut self, symbol: &str) -> Result<()> {
        let symbol = symbol.to_uppercase();
        let session = self
            .sessions
            .remove(&symbol)
            .ok_or_else(|| TradeError::NotTrading(symbol.clone()))?;

        if let Err(e) = session.pool.stop().await {
            warn!(%symbol, error = %e, "Pool was not running");
        }
        Self::join(&symbol, session.task).await
    }

    /// Let open cycles of a symbol finish, then wait for its pool to exit
    #[instrument(skip(self))]
    pub async fn shutdown_trading(&mut self, symbol: &str) -> Result<()> {
        let symbol = symbol.to_uppercase();
        let session = self
            .sessions
            .remove(&symbol)
            .ok_or_else(|| TradeError::NotTrading(symbol.clone()))?;

        if let Err(e) = session.pool.shutdown().await {
            warn!(%symbol, error = %e, "Pool was not running");
        }
        Self::join(&symbol, session.task).await
    }

    /// Symbols with a live pool, sorted
    pub fn trading_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| !s.task.is_finished())
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Last known worker states of one symbol
    pub async fn snapshot(&self, symbol: &str) -> Result<Vec<WorkerState>> {
        let symbol = symbol.to_uppercase();
        let session = self
            .sessions
            .get(&symbol)
            .ok_or_else(|| TradeError::NotTrading(symbol.clone()))?;
        session.pool.snapshot().await
    }

    /// Stop every symbol, reporting the first error
    pub async fn stop_all(&mut self) -> Result<()> {
        let mut first_error = None;
        let mut symbols: Vec<String> = self.sessions.keys().cloned().collect();
        symbols.sort();

        for symbol in symbols {
            if let Err(e) = self.stop_trading(&symbol).await {
                warn!(%symbol, error = %e, "Failed to stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn ensure_idle(&mut self, symbol: &str) -> Result<()> {
        // A pool that died on its own no longer blocks a restart
        if let Some(session) = self.sessions.get(symbol) {
            if !session.task.is_finished() {
                return Err(TradeError::AlreadyTrading(symbol.to_string()));
            }
            self.sessions.remove(symbol);
        }
        Ok(())
    }

    async fn join(symbol: &str, task: JoinHandle<Result<()>>) -> Result<()> {
        let result = task
            .await
            .map_err(|e| TradeError::Internal(format!("pool task for {} panicked: {}", symbol, e)))?;
        info!(%symbol, "Trading stopped");
        result
    }
}
