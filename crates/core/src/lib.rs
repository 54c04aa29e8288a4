//! Cluster-facing seams of the transaction-chain coordinator.
//!
//! The chain never talks to the network itself. Everything it needs from the
//! cluster is reached through the traits in this crate:
//!
//! - [`ShardRouter`] resolves a shard to its current leader
//! - [`ClusterBroadcast`] delivers chain-scoped notifications to all shards
//! - [`CreationPermits`] throttles the number of open write transactions
//!
//! [`ClusterContext`] bundles them with the member name and the runtime
//! handle continuations are dispatched on.

mod context;
mod error;
mod traits;

pub use context::ClusterContext;
pub use error::{ReadinessError, RoutingError};
pub use traits::{ClusterBroadcast, CreationPermits, ReadyFuture, ShardRouter};
