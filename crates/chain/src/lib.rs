//! Transaction chain coordinator.
//!
//! A chain serializes one client's transactions against a sharded store. It
//! allows at most one un-readied write transaction at a time, lets readying
//! proceed asynchronously, and makes the next transaction's shard lookups wait
//! until the previous transaction's writes are staged on every shard.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  allocate_write   ┌─────────────┐  ready(tx, futures)  ┌─────────────┐
//! │   Idle   │──────────────────▶│  Allocated  │─────────────────────▶│  Submitted  │
//! └──────────┘                   └─────────────┘                      └─────────────┘
//!    ▲    ▲   ready(tx, [])            │   ▲          allocate_write         │  │
//!    │    └────────────────────────────┘   └─────────────────────────────────┘  │
//!    │                                                                           │
//!    └──────────── combined future done (CAS on this exact instance) ────────────┘
//!
//! close() from any state ──▶ Closed (terminal)
//! ```
//!
//! The state lives in a single [`arc_swap::ArcSwap`] cell. Transitions are
//! stores or compare-and-swaps of whole state instances; nothing takes a lock.
//!
//! # Components
//!
//! - [`TransactionChain`] - the coordinator handed to clients
//! - [`ChainContext`] - the chain-facing handle given to each transaction
//! - [`ChainState`] - the four chain states
//! - [`CombinedReadiness`] - N per-shard ready futures folded into one

mod chain;
mod error;
mod factory;
mod readiness;
mod state;

pub use chain::{ChainContext, RoutingFuture, TransactionChain};
pub use error::ChainError;
pub use factory::{ChainTransaction, ChainedTransaction, ChainedTransactionFactory, TransactionFactory};
pub use readiness::CombinedReadiness;
pub use state::ChainState;
