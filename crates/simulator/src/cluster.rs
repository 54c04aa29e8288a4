//! In-memory cluster the simulated chains run against.
//!
//! - [`InMemoryRouter`]: static leader table with per-shard lookup latency
//! - [`ShardInboxes`]: broadcast that delivers encoded messages to every shard
//! - [`PermitGate`]: non-blocking bound on open write transactions

use crate::config::SimulatorConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{trace, warn};
use txchain_core::{ClusterBroadcast, ClusterContext, CreationPermits, RoutingError, ShardRouter};
use txchain_messages::{decode_message, encode_message, ClusterMessage};
use txchain_types::{ChainId, MemberName, ShardLeaderInfo, ShardName};

/// Leader term reported by the static router.
const STATIC_TERM: u64 = 1;

struct ShardEntry {
    leader: Option<ShardLeaderInfo>,
    latency: Duration,
}

/// Router over a fixed leader table.
pub struct InMemoryRouter {
    shards: HashMap<ShardName, ShardEntry>,
    lookups: AtomicU64,
}

impl InMemoryRouter {
    /// Build the leader table from `config`.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let shards = config
            .shards
            .iter()
            .map(|shard| {
                let name = ShardName::new(shard.name.clone());
                let leader = (!shard.leaderless).then(|| {
                    ShardLeaderInfo::new(
                        name.clone(),
                        shard.leader_address(&config.member_name),
                        STATIC_TERM,
                    )
                });
                let entry = ShardEntry {
                    leader,
                    latency: shard.lookup_latency(),
                };
                (name, entry)
            })
            .collect();

        Self {
            shards,
            lookups: AtomicU64::new(0),
        }
    }

    /// Number of lookups answered so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ShardRouter for InMemoryRouter {
    async fn find_leader(&self, shard: &ShardName) -> Result<ShardLeaderInfo, RoutingError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = self.shards.get(shard) else {
            return Err(RoutingError::NoShardLeaderFound(shard.clone()));
        };
        if !entry.latency.is_zero() {
            tokio::time::sleep(entry.latency).await;
        }
        entry
            .leader
            .clone()
            .ok_or_else(|| RoutingError::NoShardLeaderFound(shard.clone()))
    }
}

/// Broadcast that pushes every message through the wire codec into one inbox
/// per shard.
pub struct ShardInboxes {
    inboxes: HashMap<ShardName, Mutex<Vec<ChainId>>>,
    dropped: AtomicU64,
}

impl ShardInboxes {
    /// One empty inbox per shard.
    pub fn new(shards: &[ShardName]) -> Self {
        Self {
            inboxes: shards
                .iter()
                .map(|shard| (shard.clone(), Mutex::new(Vec::new())))
                .collect(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Chains `shard` has been told to close, in arrival order.
    pub fn closed_on(&self, shard: &ShardName) -> Vec<ChainId> {
        self.inboxes
            .get(shard)
            .map(|inbox| inbox.lock().clone())
            .unwrap_or_default()
    }

    /// Whether every shard received the close of `chain`.
    pub fn all_shards_saw(&self, chain: &ChainId) -> bool {
        self.inboxes
            .values()
            .all(|inbox| inbox.lock().contains(chain))
    }

    /// Deliveries lost to codec failures.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, shard: &ShardName, inbox: &Mutex<Vec<ChainId>>, data: &[u8]) {
        match decode_message(data) {
            Ok(ClusterMessage::CloseTransactionChain(close)) => {
                trace!(shard = %shard, chain_id = %close.chain_id, "Shard released chain state");
                inbox.lock().push(close.chain_id);
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(shard = %shard, error = %e, "Failed to decode broadcast");
            }
        }
    }
}

impl ClusterBroadcast for ShardInboxes {
    fn broadcast(&self, message: ClusterMessage) {
        let data = match encode_message(&message) {
            Ok(data) => data,
            Err(e) => {
                self.dropped
                    .fetch_add(self.inboxes.len() as u64, Ordering::Relaxed);
                warn!(message_type = message.type_name(), error = %e, "Failed to encode broadcast");
                return;
            }
        };

        for (shard, inbox) in &self.inboxes {
            self.deliver(shard, inbox, &data);
        }
    }
}

/// Counts open write transactions against a limit.
///
/// Never blocks: an allocation over the limit is let through, logged and
/// counted as throttled.
pub struct PermitGate {
    max_open: usize,
    open: AtomicUsize,
    granted: AtomicU64,
    throttled: AtomicU64,
}

impl PermitGate {
    /// Create a gate allowing `max_open` open write transactions.
    pub fn new(max_open: usize) -> Self {
        Self {
            max_open,
            open: AtomicUsize::new(0),
            granted: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
        }
    }

    /// Return a permit once its transaction has been readied.
    pub fn release(&self) {
        // Saturate rather than wrap on an unmatched release.
        let _ = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                open.checked_sub(1)
            });
    }

    /// Write transactions currently holding a permit.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Permits handed out so far.
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Permits handed out over the limit.
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }
}

impl CreationPermits for PermitGate {
    fn acquire_creation_permit(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
        let open = self.open.fetch_add(1, Ordering::AcqRel) + 1;
        if open > self.max_open {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            warn!(
                open,
                max_open = self.max_open,
                "Open write transactions over limit, proceeding"
            );
        }
    }
}

/// The simulated cluster with typed handles to its collaborators.
pub struct SimulatedCluster {
    pub router: Arc<InMemoryRouter>,
    pub inboxes: Arc<ShardInboxes>,
    pub permits: Arc<PermitGate>,
    pub context: ClusterContext,
}

impl SimulatedCluster {
    /// Build the cluster described by `config`, dispatching on `dispatcher`.
    pub fn from_config(config: &SimulatorConfig, dispatcher: Handle) -> Self {
        let router = Arc::new(InMemoryRouter::from_config(config));
        let inboxes = Arc::new(ShardInboxes::new(&config.shard_names()));
        let permits = Arc::new(PermitGate::new(config.permits.max_open_transactions));
        let context = ClusterContext::new(
            MemberName::new(config.member_name.clone()),
            router.clone(),
            inboxes.clone(),
            permits.clone(),
            dispatcher,
        );

        Self {
            router,
            inboxes,
            permits,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShardConfig;
    use tracing_test::traced_test;
    use txchain_messages::CloseTransactionChain;

    fn config() -> SimulatorConfig {
        SimulatorConfig::new(0).with_shards(vec![
            ShardConfig::numbered(0),
            ShardConfig::numbered(1).leaderless(),
        ])
    }

    #[tokio::test]
    async fn test_router_resolves_configured_leaders() {
        let router = InMemoryRouter::from_config(&config());

        let leader = router.find_leader(&ShardName::new("shard-0")).await.unwrap();
        assert_eq!(leader.leader, "member-1/shard-0");
        assert_eq!(leader.term, STATIC_TERM);

        assert_eq!(
            router.find_leader(&ShardName::new("shard-1")).await,
            Err(RoutingError::NoShardLeaderFound(ShardName::new("shard-1")))
        );
        assert!(router.find_leader(&ShardName::new("unknown")).await.is_err());
        assert_eq!(router.lookup_count(), 3);
    }

    #[test]
    fn test_broadcast_reaches_every_shard() {
        let shards = config().shard_names();
        let inboxes = ShardInboxes::new(&shards);
        let chain = ChainId::from_parts(MemberName::new("member-1"), 4);

        inboxes.broadcast(CloseTransactionChain::new(chain.clone()).into());

        for shard in &shards {
            assert_eq!(inboxes.closed_on(shard), vec![chain.clone()]);
        }
        assert!(inboxes.all_shards_saw(&chain));
        assert!(!inboxes.all_shards_saw(&ChainId::from_parts(MemberName::new("member-1"), 5)));
        assert_eq!(inboxes.dropped(), 0);
    }

    #[test]
    #[traced_test]
    fn test_permit_gate_counts_throttled() {
        let gate = PermitGate::new(2);

        gate.acquire_creation_permit();
        gate.acquire_creation_permit();
        assert_eq!(gate.throttled(), 0);

        gate.acquire_creation_permit();
        assert_eq!(gate.open(), 3);
        assert_eq!(gate.throttled(), 1);
        assert!(logs_contain("Open write transactions over limit"));

        gate.release();
        gate.release();
        gate.release();
        gate.release();
        assert_eq!(gate.open(), 0);
        assert_eq!(gate.granted(), 3);
    }
}
