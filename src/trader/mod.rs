//! Trading runtime: workers, their per-symbol pools, and the orchestrator
//!
//! ```text
//! Orchestrator ──start_trading──▶ PoolLeader (one task per symbol)
//!                                    │ owns PoolManager
//!                                    │ spawns ▼            ▲ PoolCommand + ack
//!                               TradingWorker × chunks ────┘
//!                                    ▲
//!                          EventFeed (broadcast per symbol)
//! ```

pub mod leader;
pub mod orchestrator;
pub mod pool;
pub mod worker;

pub use leader::{spawn_pool, PoolCommand, PoolHandle, PoolLeader, TaskSpawner};
pub use orchestrator::Orchestrator;
pub use pool::{PoolEntry, PoolManager, WorkerHandle, WorkerSpawner};
pub use worker::{PoolNotifier, Step, TradingWorker, WorkerExit};
