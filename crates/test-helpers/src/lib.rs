//! Test helpers for the transaction-chain crates.
//!
//! Provides in-process stand-ins for the cluster collaborators and ready
//! futures whose completion the test controls.
//!
//! The helpers that touch the runtime ([`TestCluster::new`], [`ready_after`],
//! [`settle`]) must be called from inside a Tokio runtime.

use async_trait::async_trait;
use futures::future::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use txchain_core::{
    ClusterBroadcast, ClusterContext, CreationPermits, ReadinessError, ReadyFuture, RoutingError,
    ShardRouter,
};
use txchain_messages::ClusterMessage;
use txchain_types::{ChainId, MemberName, ShardLeaderInfo, ShardName};

/// Member name used by [`TestCluster`].
pub const TEST_MEMBER: &str = "member-1";

// ═══════════════════════════════════════════════════════════════════════════
// Cluster collaborators
// ═══════════════════════════════════════════════════════════════════════════

/// Router with a fixed leader table that records every lookup.
#[derive(Default)]
pub struct MockRouter {
    leaders: HashMap<ShardName, Result<ShardLeaderInfo, RoutingError>>,
    latency: Option<Duration>,
    lookups: Mutex<Vec<ShardName>>,
}

impl MockRouter {
    /// Create a router that knows no shards.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups for `shard` with `leader` (term 1).
    pub fn with_leader(mut self, shard: &str, leader: &str) -> Self {
        let shard = ShardName::new(shard);
        let info = ShardLeaderInfo::new(shard.clone(), leader, 1);
        self.leaders.insert(shard, Ok(info));
        self
    }

    /// Fail lookups for `shard` with `error`.
    pub fn with_failure(mut self, shard: &str, error: RoutingError) -> Self {
        self.leaders.insert(ShardName::new(shard), Err(error));
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shards looked up so far, in order.
    pub fn lookups(&self) -> Vec<ShardName> {
        self.lookups.lock().clone()
    }

    /// Number of lookups so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().len()
    }

    /// The answer the router gives for `shard`.
    pub fn expected(&self, shard: &ShardName) -> Result<ShardLeaderInfo, RoutingError> {
        self.leaders
            .get(shard)
            .cloned()
            .unwrap_or_else(|| Err(RoutingError::NoShardLeaderFound(shard.clone())))
    }
}

#[async_trait]
impl ShardRouter for MockRouter {
    async fn find_leader(&self, shard: &ShardName) -> Result<ShardLeaderInfo, RoutingError> {
        self.lookups.lock().push(shard.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.expected(shard)
    }
}

/// Broadcast channel that keeps every message.
#[derive(Default)]
pub struct RecordingBroadcast {
    messages: Mutex<Vec<ClusterMessage>>,
}

impl RecordingBroadcast {
    /// All messages broadcast so far.
    pub fn messages(&self) -> Vec<ClusterMessage> {
        self.messages.lock().clone()
    }

    /// Chains that were announced closed, in order.
    pub fn closed_chains(&self) -> Vec<ChainId> {
        self.messages
            .lock()
            .iter()
            .filter_map(|message| match message {
                ClusterMessage::CloseTransactionChain(close) => Some(close.chain_id.clone()),
            })
            .collect()
    }
}

impl ClusterBroadcast for RecordingBroadcast {
    fn broadcast(&self, message: ClusterMessage) {
        self.messages.lock().push(message);
    }
}

/// Permit gate that grants everything and counts.
#[derive(Default)]
pub struct CountingPermits {
    acquired: AtomicUsize,
}

impl CountingPermits {
    /// Number of permits handed out.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

impl CreationPermits for CountingPermits {
    fn acquire_creation_permit(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }
}

/// A cluster context wired to mock collaborators.
///
/// Keeps typed handles to the mocks so tests can inspect them.
pub struct TestCluster {
    pub router: Arc<MockRouter>,
    pub broadcast: Arc<RecordingBroadcast>,
    pub permits: Arc<CountingPermits>,
    pub context: ClusterContext,
}

impl TestCluster {
    /// Build a cluster around `router`, dispatching on the current runtime.
    pub fn new(router: MockRouter) -> Self {
        let router = Arc::new(router);
        let broadcast = Arc::new(RecordingBroadcast::default());
        let permits = Arc::new(CountingPermits::default());
        let context = ClusterContext::new(
            MemberName::new(TEST_MEMBER),
            router.clone(),
            broadcast.clone(),
            permits.clone(),
            tokio::runtime::Handle::current(),
        );

        Self {
            router,
            broadcast,
            permits,
            context,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Ready futures
// ═══════════════════════════════════════════════════════════════════════════

/// Completes a pending ready future on demand.
///
/// Dropping the trigger without firing it abandons the future.
pub struct ReadyTrigger {
    shard: ShardName,
    sender: oneshot::Sender<Result<(), ReadinessError>>,
}

impl ReadyTrigger {
    /// Create a ready future for `shard` and the trigger that completes it.
    pub fn pending(shard: &str) -> (ReadyTrigger, ReadyFuture) {
        let shard = ShardName::new(shard);
        let (sender, receiver) = oneshot::channel();
        let abandoned = shard.clone();
        let future = async move {
            receiver
                .await
                .unwrap_or(Err(ReadinessError::Abandoned { shard: abandoned }))
        }
        .boxed();

        (ReadyTrigger { shard, sender }, future)
    }

    /// Report the shard as staged.
    pub fn succeed(self) {
        let _ = self.sender.send(Ok(()));
    }

    /// Report the shard as failed.
    pub fn fail(self, reason: &str) {
        let _ = self.sender.send(Err(ReadinessError::Rejected {
            shard: self.shard,
            reason: reason.to_string(),
        }));
    }
}

/// A ready future that has already succeeded.
pub fn ready_ok() -> ReadyFuture {
    async { Ok(()) }.boxed()
}

/// A ready future that has already failed.
pub fn ready_failed(shard: &str, reason: &str) -> ReadyFuture {
    let error = ReadinessError::Rejected {
        shard: ShardName::new(shard),
        reason: reason.to_string(),
    };
    async move { Err(error) }.boxed()
}

/// A ready future that succeeds `delay` after this call.
pub fn ready_after(delay: Duration) -> ReadyFuture {
    let sleep = tokio::time::sleep(delay);
    async move {
        sleep.await;
        Ok(())
    }
    .boxed()
}

/// Let spawned tasks on a current-thread runtime run to quiescence.
///
/// Only meaningful under the default `#[tokio::test]` flavour, where yielding
/// hands the single worker to every ready task. On a multi-thread runtime the
/// spawned tasks run elsewhere and 32 yields prove nothing.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
