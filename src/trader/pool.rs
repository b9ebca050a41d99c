//! Pool bookkeeping for one symbol
//!
//! [`PoolManager`] is the serialized core of the pool: it owns the worker
//! registry and decides when to spawn, replace or drop workers. It never
//! awaits anything; the leader task in `leader.rs` feeds it one command at a
//! time, which is what makes the cap check race free.

use std::collections::HashMap;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::common::errors::Result;
use crate::strategy::{PoolSettings, WorkerId, WorkerState};

/// Starts worker tasks on behalf of the pool manager
pub trait WorkerSpawner: Send {
    /// Start a worker from the given state
    fn spawn(&mut self, state: WorkerState) -> Result<WorkerHandle>;
}

/// Handle to a running worker task
#[derive(Debug, Default)]
pub struct WorkerHandle {
    task: Option<AbortHandle>,
}

impl WorkerHandle {
    pub fn new(task: AbortHandle) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with no task behind it
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn abort(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// A live worker as the pool sees it
#[derive(Debug)]
pub struct PoolEntry {
    pub handle: WorkerHandle,
    pub last_known_state: WorkerState,
    /// Consecutive failed runs of this worker
    pub restarts: u32,
}

/// Registry of active workers for one symbol
pub struct PoolManager<S: WorkerSpawner> {
    settings: PoolSettings,
    spawner: S,
    entries: HashMap<WorkerId, PoolEntry>,
    next_id: u64,
    max_restarts: u32,
    draining: bool,
}

impl<S: WorkerSpawner> PoolManager<S> {
    pub fn new(settings: PoolSettings, spawner: S, max_restarts: u32) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            spawner,
            entries: HashMap::new(),
            next_id: 1,
            max_restarts,
            draining: false,
        })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: WorkerId) -> Option<&PoolEntry> {
        self.entries.get(&id)
    }

    /// Last known state of every live worker, ordered by id
    pub fn snapshot(&self) -> Vec<WorkerState> {
        let mut states: Vec<WorkerState> = self
            .entries
            .values()
            .map(|entry| entry.last_known_state.clone())
            .collect();
        states.sort_by_key(|state| state.id);
        states
    }

    /// Whether a graceful shutdown has run its course
    pub fn is_drained(&self) -> bool {
        self.draining && self.entries.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Spawn the first worker of the session
    pub fn start_initial(&mut self) -> Result<WorkerId> {
        info!(
            symbol = %self.settings.symbol,
            chunks = self.settings.chunks,
            budget = %self.settings.worker_budget(),
            "Starting trading pool"
        );
        self.spawn_fresh()
    }

    pub fn on_worker_state_updated(&mut self, state: WorkerState) {
        match self.entries.get_mut(&state.id) {
            Some(entry) => {
                entry.last_known_state = state;
                entry.restarts = 0;
            }
            None => warn!(worker_id = %state.id, "State update from untracked worker"),
        }
    }

    /// Record the requester's state and grow the pool if below the cap
    ///
    /// Returns the id of the spawned worker, if any.
    pub fn on_rebuy_requested(&mut self, state: WorkerState) -> Result<Option<WorkerId>> {
        let requester = state.id;
        match self.entries.get_mut(&requester) {
            Some(entry) => entry.last_known_state = state,
            None => {
                warn!(worker_id = %requester, symbol = %self.settings.symbol, "Rebuy requested by untracked worker");
                return Ok(None);
            }
        }

        if self.draining {
            info!(worker_id = %requester, "Rebuy ignored, pool is shutting down");
            return Ok(None);
        }

        if self.entries.len() >= self.settings.chunks {
            info!(
                worker_id = %requester,
                active = self.entries.len(),
                chunks = self.settings.chunks,
                "Rebuy ignored, all chunks in use"
            );
            return Ok(None);
        }

        info!(worker_id = %requester, "Rebuy accepted, starting another worker");
        self.spawn_fresh().map(Some)
    }

    /// Replace a worker that completed its cycle
    pub fn on_worker_terminated(&mut self, id: WorkerId) -> Result<Option<WorkerId>> {
        if self.entries.remove(&id).is_none() {
            warn!(worker_id = %id, "Termination from untracked worker");
            return Ok(None);
        }

        if self.draining {
            info!(worker_id = %id, remaining = self.entries.len(), "Worker finished during shutdown");
            return Ok(None);
        }

        info!(worker_id = %id, "Worker finished, starting replacement");
        self.spawn_fresh().map(Some)
    }

    /// Restart a worker whose task died, from the last state it reported
    ///
    /// The restarted worker keeps the same id. After `max_restarts`
    /// consecutive failures the entry is dropped instead.
    pub fn on_worker_failed(&mut self, id: WorkerId, reason: &str) -> Result<Option<WorkerId>> {
        let Some(entry) = self.entries.remove(&id) else {
            warn!(worker_id = %id, reason, "Failure from untracked worker");
            return Ok(None);
        };

        if self.draining {
            warn!(worker_id = %id, reason, "Worker failed during shutdown");
            return Ok(None);
        }

        if entry.restarts >= self.max_restarts {
            error!(
                worker_id = %id,
                restarts = entry.restarts,
                reason,
                "Worker keeps failing, dropping it from the pool"
            );
            return Ok(None);
        }

        warn!(worker_id = %id, restarts = entry.restarts + 1, reason, "Restarting failed worker");
        let state = entry.last_known_state;
        let handle = self.spawner.spawn(state.clone())?;
        self.entries.insert(
            id,
            PoolEntry {
                handle,
                last_known_state: state,
                restarts: entry.restarts + 1,
            },
        );
        Ok(Some(id))
    }

    /// Stop growing; the pool drains as workers finish
    pub fn begin_shutdown(&mut self) {
        info!(symbol = %self.settings.symbol, active = self.entries.len(), "Pool shutting down");
        self.draining = true;
    }

    /// Abort every worker task and forget them
    pub fn abort_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.handle.abort();
        }
    }

    fn spawn_fresh(&mut self) -> Result<WorkerId> {
        let id = WorkerId(self.next_id);
        self.next_id += 1;

        let state = self.settings.fresh_state(id);
        let handle = self.spawner.spawn(state.clone())?;
        self.entries.insert(
            id,
            PoolEntry {
                handle,
                last_known_state: state,
                restarts: 0,
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::TradeError;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    /// Records every state it was asked to start
    #[derive(Clone, Default)]
    struct RecordingSpawner {
        spawned: Arc<Mutex<Vec<WorkerState>>>,
        fail: bool,
    }

    impl WorkerSpawner for RecordingSpawner {
        fn spawn(&mut self, state: WorkerState) -> Result<WorkerHandle> {
            if self.fail {
                return Err(TradeError::Spawn("feed closed".to_string()));
            }
            self.spawned.lock().unwrap().push(state);
            Ok(WorkerHandle::detached())
        }
    }

    fn settings(chunks: usize) -> PoolSettings {
        PoolSettings {
            symbol: "XRPUSDT".to_string(),
            chunks,
            total_budget: dec!(100),
            buy_down_interval: dec!(0.01),
            profit_interval: dec!(0.001),
            rebuy_interval: dec!(0.01),
            tick_size: dec!(0.0001),
            step_size: dec!(0.1),
        }
    }

    fn pool(chunks: usize) -> (PoolManager<RecordingSpawner>, RecordingSpawner) {
        let spawner = RecordingSpawner::default();
        let manager = PoolManager::new(settings(chunks), spawner.clone(), 2).unwrap();
        (manager, spawner)
    }

    fn rebuying(manager: &PoolManager<RecordingSpawner>, id: WorkerId) -> WorkerState {
        let mut state = manager.entry(id).unwrap().last_known_state.clone();
        state.rebuy_notified = true;
        state
    }

    #[test]
    fn test_start_initial() {
        let (mut manager, spawner) = pool(3);
        let id = manager.start_initial().unwrap();

        assert_eq!(manager.len(), 1);
        let spawned = spawner.spawned.lock().unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].id, id);
        assert_eq!(spawned[0].budget, dec!(100) / rust_decimal::Decimal::from(3));
        assert!(!spawned[0].rebuy_notified);
    }

    #[test]
    fn test_rejects_invalid_settings() {
        assert!(PoolManager::new(settings(0), RecordingSpawner::default(), 1).is_err());
    }

    #[test]
    fn test_rebuy_grows_until_cap() {
        let (mut manager, _) = pool(3);
        let first = manager.start_initial().unwrap();

        let second = manager.on_rebuy_requested(rebuying(&manager, first)).unwrap();
        assert!(second.is_some());
        let third = manager
            .on_rebuy_requested(rebuying(&manager, second.unwrap()))
            .unwrap();
        assert!(third.is_some());
        let fourth = manager
            .on_rebuy_requested(rebuying(&manager, third.unwrap()))
            .unwrap();

        assert_eq!(fourth, None);
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn test_rebuy_at_cap_updates_state_only() {
        let (mut manager, spawner) = pool(2);
        let first = manager.start_initial().unwrap();
        manager.on_rebuy_requested(rebuying(&manager, first)).unwrap();
        assert_eq!(manager.len(), 2);

        let spawned_before = spawner.spawned.lock().unwrap().len();
        let mut state = rebuying(&manager, first);
        state.budget = dec!(42);
        assert_eq!(manager.on_rebuy_requested(state).unwrap(), None);

        assert_eq!(manager.len(), 2);
        assert_eq!(spawner.spawned.lock().unwrap().len(), spawned_before);
        assert_eq!(manager.entry(first).unwrap().last_known_state.budget, dec!(42));
    }

    #[test]
    fn test_untracked_rebuy_is_ignored() {
        let (mut manager, spawner) = pool(5);
        manager.start_initial().unwrap();

        let stranger = settings(5).fresh_state(WorkerId(99));
        assert_eq!(manager.on_rebuy_requested(stranger).unwrap(), None);
        assert_eq!(manager.len(), 1);
        assert_eq!(spawner.spawned.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_termination_replaces_one_for_one() {
        let (mut manager, spawner) = pool(2);
        let first = manager.start_initial().unwrap();
        manager.on_rebuy_requested(rebuying(&manager, first)).unwrap();

        let replacement = manager.on_worker_terminated(first).unwrap().unwrap();

        assert_eq!(manager.len(), 2);
        assert!(manager.entry(first).is_none());
        let fresh = &manager.entry(replacement).unwrap().last_known_state;
        assert_eq!(fresh.budget, dec!(50));
        assert!(fresh.buy_order.is_none());
        assert!(!fresh.rebuy_notified);
        assert_eq!(spawner.spawned.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_termination_does_not_grow() {
        let (mut manager, _) = pool(2);
        manager.start_initial().unwrap();
        assert_eq!(manager.on_worker_terminated(WorkerId(77)).unwrap(), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_state_update_overwrites_snapshot() {
        let (mut manager, _) = pool(2);
        let id = manager.start_initial().unwrap();

        let mut state = manager.entry(id).unwrap().last_known_state.clone();
        state.rebuy_notified = true;
        manager.on_worker_state_updated(state.clone());

        assert_eq!(manager.snapshot(), vec![state]);
    }

    #[test]
    fn test_failed_worker_restarts_from_last_state() {
        let (mut manager, spawner) = pool(2);
        let id = manager.start_initial().unwrap();

        let mut state = manager.entry(id).unwrap().last_known_state.clone();
        state.rebuy_notified = true;
        manager.on_worker_state_updated(state.clone());

        assert_eq!(manager.on_worker_failed(id, "timeout").unwrap(), Some(id));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.entry(id).unwrap().restarts, 1);
        assert_eq!(spawner.spawned.lock().unwrap().last().unwrap(), &state);
    }

    #[test]
    fn test_failed_worker_dropped_after_max_restarts() {
        let (mut manager, _) = pool(2);
        let id = manager.start_initial().unwrap();

        assert_eq!(manager.on_worker_failed(id, "boom").unwrap(), Some(id));
        assert_eq!(manager.on_worker_failed(id, "boom").unwrap(), Some(id));
        assert_eq!(manager.on_worker_failed(id, "boom").unwrap(), None);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_progress_resets_restart_count() {
        let (mut manager, _) = pool(2);
        let id = manager.start_initial().unwrap();
        manager.on_worker_failed(id, "boom").unwrap();

        let state = manager.entry(id).unwrap().last_known_state.clone();
        manager.on_worker_state_updated(state);
        assert_eq!(manager.entry(id).unwrap().restarts, 0);
    }

    #[test]
    fn test_shutdown_drains_without_replacing() {
        let (mut manager, _) = pool(3);
        let first = manager.start_initial().unwrap();
        let second = manager
            .on_rebuy_requested(rebuying(&manager, first))
            .unwrap()
            .unwrap();

        assert!(!manager.is_draining());
        manager.begin_shutdown();
        assert!(manager.is_draining());
        assert_eq!(manager.on_rebuy_requested(rebuying(&manager, second)).unwrap(), None);
        assert_eq!(manager.on_worker_terminated(first).unwrap(), None);
        assert!(!manager.is_drained());
        assert_eq!(manager.on_worker_terminated(second).unwrap(), None);
        assert!(manager.is_drained());
    }

    #[test]
    fn test_spawn_failure_propagates() {
        let spawner = RecordingSpawner {
            fail: true,
            ..Default::default()
        };
        let mut manager = PoolManager::new(settings(2), spawner, 1).unwrap();
        assert!(matches!(manager.start_initial(), Err(TradeError::Spawn(_))));
        assert!(manager.is_empty());
    }
}
