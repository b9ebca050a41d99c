//! Pool leader task and the handle workers use to reach it
//!
//! Every mutation of a pool goes through one `mpsc` queue drained by a single
//! task. Callers attach a `oneshot` sender to each command and wait on it, so
//! a worker only moves on once the leader has applied its notification.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::pool::{PoolManager, WorkerHandle, WorkerSpawner};
use super::worker::{PoolNotifier, TradingWorker};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{EventFeed, ExchangeClient, OrderSink};
use crate::strategy::{PoolSettings, WorkerId, WorkerState};

/// Commands accepted by a pool leader
#[derive(Debug)]
pub enum PoolCommand {
    StateUpdated {
        state: WorkerState,
        ack: oneshot::Sender<()>,
    },
    RebuyRequested {
        state: WorkerState,
        ack: oneshot::Sender<()>,
    },
    Terminated {
        state: WorkerState,
        ack: oneshot::Sender<()>,
    },
    Failed {
        id: WorkerId,
        reason: String,
        ack: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<WorkerState>>,
    },
    /// Stop replacing workers and exit once the last one finishes
    Shutdown { ack: oneshot::Sender<()> },
    /// Abort every worker and exit now
    Stop { ack: oneshot::Sender<()> },
}

/// Cloneable sender side of a pool
#[derive(Debug, Clone)]
pub struct PoolHandle {
    symbol: String,
    commands: mpsc::Sender<PoolCommand>,
}

impl PoolHandle {
    pub fn new(symbol: impl Into<String>, commands: mpsc::Sender<PoolCommand>) -> Self {
        Self {
            symbol: symbol.into(),
            commands,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether the leader task is still accepting commands
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> PoolCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| TradeError::PoolUnavailable(self.symbol.clone()))?;
        rx.await
            .map_err(|_| TradeError::PoolUnavailable(self.symbol.clone()))
    }

    /// Last known state of every live worker
    pub async fn snapshot(&self) -> Result<Vec<WorkerState>> {
        self.request(|reply| PoolCommand::Snapshot { reply }).await
    }

    /// Let running cycles finish without starting new ones
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|ack| PoolCommand::Shutdown { ack }).await
    }

    /// Abort every worker immediately
    pub async fn stop(&self) -> Result<()> {
        self.request(|ack| PoolCommand::Stop { ack }).await
    }
}

#[async_trait]
impl PoolNotifier for PoolHandle {
    async fn state_updated(&self, state: WorkerState) -> Result<()> {
        self.request(|ack| PoolCommand::StateUpdated { state, ack }).await
    }

    async fn rebuy_requested(&self, state: WorkerState) -> Result<()> {
        self.request(|ack| PoolCommand::RebuyRequested { state, ack })
            .await
    }

    async fn terminated(&self, state: WorkerState) -> Result<()> {
        self.request(|ack| PoolCommand::Terminated { state, ack }).await
    }

    async fn failed(&self, id: WorkerId, reason: String) -> Result<()> {
        self.request(|ack| PoolCommand::Failed { id, reason, ack })
            .await
    }
}

/// Spawns each worker as its own tokio task on a fresh feed subscription
pub struct TaskSpawner {
    exchange: Arc<dyn ExchangeClient>,
    sink: Arc<dyn OrderSink>,
    feed: Arc<dyn EventFeed>,
    pool: Arc<dyn PoolNotifier>,
}

impl TaskSpawner {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        sink: Arc<dyn OrderSink>,
        feed: Arc<dyn EventFeed>,
        pool: Arc<dyn PoolNotifier>,
    ) -> Self {
        Self {
            exchange,
            sink,
            feed,
            pool,
        }
    }
}

impl WorkerSpawner for TaskSpawner {
    fn spawn(&mut self, state: WorkerState) -> Result<WorkerHandle> {
        let events = self.feed.subscribe(&state.symbol)?;
        let span = info_span!("worker", worker_id = %state.id, symbol = %state.symbol);
        let worker = TradingWorker::new(
            state,
            self.exchange.clone(),
            self.sink.clone(),
            self.pool.clone(),
        );
        let task = tokio::spawn(worker.run(events).instrument(span));
        Ok(WorkerHandle::new(task.abort_handle()))
    }
}

/// The single task that owns a pool's [`PoolManager`]
pub struct PoolLeader<S: WorkerSpawner> {
    manager: PoolManager<S>,
    commands: mpsc::Receiver<PoolCommand>,
}

impl<S: WorkerSpawner> PoolLeader<S> {
    pub fn new(manager: PoolManager<S>, commands: mpsc::Receiver<PoolCommand>) -> Self {
        Self { manager, commands }
    }

    /// Start the first worker and serve commands until the pool is stopped
    /// or fully drained
    ///
    /// Every worker still tracked on exit is aborted, including when a spawn
    /// failure ends the pool early.
    pub async fn run(mut self) -> Result<()> {
        let symbol = self.manager.settings().symbol.clone();
        let result = self.serve().await;
        self.manager.abort_all();

        match &result {
            Ok(()) => info!(%symbol, "Pool stopped"),
            Err(e) => error!(%symbol, error = %e, "Pool failed"),
        }
        result
    }

    async fn serve(&mut self) -> Result<()> {
        self.manager.start_initial()?;

        while let Some(command) = self.commands.recv().await {
            if !self.handle(command)? {
                return Ok(());
            }
            if self.manager.is_drained() {
                info!(symbol = %self.manager.settings().symbol, "All workers finished");
                return Ok(());
            }
        }
        Ok(())
    }

    /// Apply one command; `false` means the leader should exit
    fn handle(&mut self, command: PoolCommand) -> Result<bool> {
        match command {
            PoolCommand::StateUpdated { state, ack } => {
                debug!(worker_id = %state.id, phase = %state.phase(), "State updated");
                self.manager.on_worker_state_updated(state);
                let _ = ack.send(());
            }
            PoolCommand::RebuyRequested { state, ack } => {
                self.manager.on_rebuy_requested(state)?;
                let _ = ack.send(());
            }
            PoolCommand::Terminated { state, ack } => {
                self.manager.on_worker_terminated(state.id)?;
                let _ = ack.send(());
            }
            PoolCommand::Failed { id, reason, ack } => {
                self.manager.on_worker_failed(id, &reason)?;
                let _ = ack.send(());
            }
            PoolCommand::Snapshot { reply } => {
                let _ = reply.send(self.manager.snapshot());
            }
            PoolCommand::Shutdown { ack } => {
                self.manager.begin_shutdown();
                let _ = ack.send(());
            }
            PoolCommand::Stop { ack } => {
                warn!(
                    symbol = %self.manager.settings().symbol,
                    active = self.manager.len(),
                    "Stopping pool, aborting workers"
                );
                self.manager.abort_all();
                let _ = ack.send(());
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Validate settings, then start a pool leader task for one symbol
pub fn spawn_pool(
    settings: PoolSettings,
    exchange: Arc<dyn ExchangeClient>,
    sink: Arc<dyn OrderSink>,
    feed: Arc<dyn EventFeed>,
    command_capacity: usize,
    max_restarts: u32,
) -> Result<(PoolHandle, JoinHandle<Result<()>>)> {
    let (tx, rx) = mpsc::channel(command_capacity.max(1));
    let handle = PoolHandle::new(settings.symbol.clone(), tx);

    let spawner = TaskSpawner::new(exchange, sink, feed, Arc::new(handle.clone()));
    let manager = PoolManager::new(settings, spawner, max_restarts)?;

    let span = info_span!("pool", symbol = %handle.symbol());
    let task = tokio::spawn(PoolLeader::new(manager, rx).run().instrument(span));
    Ok((handle, task))
}
