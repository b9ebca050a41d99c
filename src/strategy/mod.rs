//! Strategy module for trade decision making
//!
//! This module holds the side-effect-free half of the trader: the state a
//! trading cycle carries and the rules that turn a price event into an action.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PURE (this module)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  decide(PriceEvent, WorkerState) -> Decision                │
//! │    - first matching rule wins                               │
//! │    - no I/O, no clock, no shared state                      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EFFECTFUL (crate::trader)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TradingWorker                                              │
//! │    - executes the Decision against the exchange             │
//! │    - mutates its own WorkerState                            │
//! │    - reports every change to the pool manager               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`decide`]: The decision engine
//! - [`Decision`]: One variant per action a worker can take
//! - [`WorkerState`]: A single buy/sell cycle as a worker sees it
//! - [`PoolSettings`]: Per-symbol parameters every worker is built from
//!
//! # Example
//!
//! ```ignore
//! let state = settings.fresh_state(WorkerId(1));
//! match decide(&event, &state) {
//!     Decision::PlaceBuyOrder { price, quantity } => { /* place it */ }
//!     Decision::Skip => {}
//!     other => { /* ... */ }
//! }
//! ```

mod engine;
mod rounding;
mod types;

pub use engine::{buy_price, decide, quantity, rebuy_price, sell_price};
pub use rounding::{ceil_to_increment, floor_to_increment};
pub use types::{Decision, PoolSettings, WorkerId, WorkerPhase, WorkerState};
