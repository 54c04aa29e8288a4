//! Core traits for the cluster collaborators.

use crate::{ReadinessError, RoutingError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use txchain_messages::ClusterMessage;
use txchain_types::{ShardLeaderInfo, ShardName};

/// Completion of one shard's ready request.
///
/// Resolves once the shard has durably staged the transaction's writes.
pub type ReadyFuture = BoxFuture<'static, Result<(), ReadinessError>>;

/// Resolves shard names to their current leader.
///
/// The lookup itself may be slow (leader elections), so it is asynchronous.
#[async_trait]
pub trait ShardRouter: Send + Sync {
    /// Find the current leader of `shard`.
    async fn find_leader(&self, shard: &ShardName) -> Result<ShardLeaderInfo, RoutingError>;
}

/// Delivers a message to every shard in the cluster.
pub trait ClusterBroadcast: Send + Sync {
    /// Send `message` to all shards.
    ///
    /// Fire-and-forget: no acknowledgement is awaited and delivery failures
    /// are not reported to the caller.
    fn broadcast(&self, message: ClusterMessage);
}

/// Gate bounding the number of concurrently open write transactions.
///
/// Consulted before a write transaction is allocated. Whether the gate waits,
/// throttles or merely records is up to the implementation; the chain assumes
/// the permit is granted once this returns.
pub trait CreationPermits: Send + Sync {
    /// Acquire a permit for one new write transaction.
    fn acquire_creation_permit(&self);
}
