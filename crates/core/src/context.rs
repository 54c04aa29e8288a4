//! Cluster context shared by all chains of one member.

use crate::{ClusterBroadcast, CreationPermits, RoutingError, ShardRouter};
use std::sync::Arc;
use tokio::runtime::Handle;
use txchain_messages::ClusterMessage;
use txchain_types::{MemberName, ShardLeaderInfo, ShardName};

/// Everything a chain needs from the cluster.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct ClusterContext {
    member_name: MemberName,
    router: Arc<dyn ShardRouter>,
    broadcast: Arc<dyn ClusterBroadcast>,
    permits: Arc<dyn CreationPermits>,
    dispatcher: Handle,
}

impl ClusterContext {
    /// Create a new cluster context.
    ///
    /// `dispatcher` runs completion continuations; they never block, so any
    /// runtime handle will do.
    pub fn new(
        member_name: MemberName,
        router: Arc<dyn ShardRouter>,
        broadcast: Arc<dyn ClusterBroadcast>,
        permits: Arc<dyn CreationPermits>,
        dispatcher: Handle,
    ) -> Self {
        Self {
            member_name,
            router,
            broadcast,
            permits,
            dispatcher,
        }
    }

    /// Name of the local cluster member.
    pub fn member_name(&self) -> &MemberName {
        &self.member_name
    }

    /// Runtime handle continuations are spawned on.
    pub fn dispatcher(&self) -> &Handle {
        &self.dispatcher
    }

    /// Resolve the current leader of `shard`.
    pub async fn find_primary_shard(
        &self,
        shard: &ShardName,
    ) -> Result<ShardLeaderInfo, RoutingError> {
        self.router.find_leader(shard).await
    }

    /// Broadcast a message to every shard.
    pub fn broadcast(&self, message: ClusterMessage) {
        self.broadcast.broadcast(message);
    }

    /// Acquire a write-transaction creation permit.
    pub fn acquire_creation_permit(&self) {
        self.permits.acquire_creation_permit();
    }
}

impl std::fmt::Debug for ClusterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterContext")
            .field("member_name", &self.member_name)
            .finish_non_exhaustive()
    }
}
