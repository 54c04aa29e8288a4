//! The transaction chain coordinator.

use crate::{
    ChainError, ChainState, ChainTransaction, ChainedTransactionFactory, CombinedReadiness,
    TransactionFactory,
};
use arc_swap::{ArcSwap, Guard};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use txchain_core::{ClusterContext, ReadyFuture};
use txchain_messages::{CloseTransactionChain, ClusterMessage};
use txchain_types::{
    ChainId, ShardLeaderInfo, ShardName, TransactionId, TransactionIdGenerator, TransactionKind,
};

/// Pending result of a shard lookup made through a chain.
pub type RoutingFuture = BoxFuture<'static, Result<ShardLeaderInfo, ChainError>>;

struct ChainCore {
    transactions: TransactionIdGenerator,
    cluster: ClusterContext,
    /// The only mutable state of the chain. Load, store and compare-and-swap
    /// only; never guarded by a lock.
    state: ArcSwap<ChainState>,
}

impl ChainCore {
    fn chain_id(&self) -> &ChainId {
        self.transactions.chain()
    }
}

/// Chain-facing handle held by every transaction of a chain.
///
/// Transactions use it to route shard lookups through the chain and to report
/// readiness back to it. Cheap to clone.
#[derive(Clone)]
pub struct ChainContext {
    core: Arc<ChainCore>,
}

impl ChainContext {
    fn new(cluster: ClusterContext) -> Self {
        let chain_id = ChainId::allocate(cluster.member_name().clone());
        Self {
            core: Arc::new(ChainCore {
                transactions: TransactionIdGenerator::new(chain_id),
                cluster,
                state: ArcSwap::from_pointee(ChainState::Idle),
            }),
        }
    }

    /// Identifier of the chain.
    pub fn chain_id(&self) -> &ChainId {
        self.core.chain_id()
    }

    /// Snapshot of the current chain state.
    pub fn state(&self) -> Arc<ChainState> {
        self.core.state.load_full()
    }

    fn next_identifier(&self) -> TransactionId {
        self.core.transactions.next_id()
    }

    /// Resolve the leader of `shard` on behalf of a transaction of this chain.
    ///
    /// If an earlier transaction's readiness is still pending, the lookup is
    /// deferred until it completes. A readiness failure fails the lookup with
    /// that same failure and the router is never asked. Otherwise the router's
    /// answer (or failure) is forwarded unchanged.
    ///
    /// The returned future is lazy: the router is contacted on first poll.
    pub fn resolve_shard_for_routing(&self, shard: &ShardName) -> RoutingFuture {
        // Single read: every decision below uses this snapshot.
        let current = self.core.state.load_full();
        let cluster = self.core.cluster.clone();
        let shard = shard.clone();

        let Some(previous) = current.previous_future().cloned() else {
            return async move {
                cluster
                    .find_primary_shard(&shard)
                    .await
                    .map_err(ChainError::from)
            }
            .boxed();
        };

        let chain_id = self.chain_id().clone();
        let pending_tx = current
            .transaction()
            .map(ToString::to_string)
            .unwrap_or_default();
        debug!(
            chain_id = %chain_id,
            pending_tx = %pending_tx,
            shard = %shard,
            "Waiting for ready futures before shard lookup"
        );

        async move {
            if let Err(err) = previous.wait().await {
                warn!(
                    chain_id = %chain_id,
                    pending_tx = %pending_tx,
                    error = %err,
                    "Ready future failed, failing shard lookup"
                );
                return Err(ChainError::Readiness(err));
            }

            debug!(
                chain_id = %chain_id,
                pending_tx = %pending_tx,
                shard = %shard,
                "Previous transaction readied, proceeding to shard lookup"
            );
            cluster
                .find_primary_shard(&shard)
                .await
                .map_err(ChainError::from)
        }
        .boxed()
    }

    /// Ready the allocated transaction with one future per participating
    /// shard.
    ///
    /// `transaction` must be the one currently allocated; anything else is an
    /// [`ChainError::IllegalTransition`] and leaves the state untouched. With
    /// no futures the chain goes straight back to idle. Otherwise the futures
    /// are combined, the chain becomes submitted, and it returns to idle when
    /// they complete unless something else replaced the submitted state first.
    ///
    /// An empty ready also drops any earlier readiness still carried by the
    /// allocated state, so later lookups stop waiting on older transactions.
    pub fn ready(
        &self,
        transaction: &TransactionId,
        futures: Vec<ReadyFuture>,
    ) -> Result<(), ChainError> {
        let current = self.core.state.load_full();
        match current.as_ref() {
            ChainState::Allocated {
                transaction: allocated,
                ..
            } if allocated == transaction => {}
            other => return Err(illegal_transition(transaction, other)),
        }

        if futures.is_empty() {
            let witnessed = self
                .core
                .state
                .compare_and_swap(&current, Arc::new(ChainState::Idle));
            if !Arc::ptr_eq(&*witnessed, &current) {
                return Err(illegal_transition(transaction, &witnessed));
            }
            debug!(chain_id = %self.chain_id(), tx = %transaction, "Transaction readied without shards");
            return Ok(());
        }

        let combined = CombinedReadiness::combine(futures);
        let submitted = Arc::new(ChainState::Submitted {
            transaction: transaction.clone(),
            previous: combined.clone(),
        });
        let witnessed = self
            .core
            .state
            .compare_and_swap(&current, Arc::clone(&submitted));
        if !Arc::ptr_eq(&*witnessed, &current) {
            return Err(illegal_transition(transaction, &witnessed));
        }

        debug!(
            chain_id = %self.chain_id(),
            tx = %transaction,
            shards = combined.shard_count(),
            "Transaction readied, waiting for shards"
        );
        self.reset_when_complete(transaction.clone(), submitted, combined);
        Ok(())
    }

    /// Return to idle once `combined` completes, but only if the chain is
    /// still in exactly the `submitted` instance.
    fn reset_when_complete(
        &self,
        transaction: TransactionId,
        submitted: Arc<ChainState>,
        combined: CombinedReadiness,
    ) {
        let core = Arc::downgrade(&self.core);
        let chain_id = self.chain_id().clone();

        self.core.cluster.dispatcher().spawn(async move {
            if let Err(err) = combined.wait().await {
                warn!(chain_id = %chain_id, tx = %transaction, error = %err, "Ready future failed");
            }

            let Some(core) = core.upgrade() else {
                return;
            };

            // `submitted` is held until here, so its address cannot be reused
            // by a newer state and identity comparison is sound.
            let witnessed = core
                .state
                .compare_and_swap(&submitted, Arc::new(ChainState::Idle));
            if Arc::ptr_eq(&*witnessed, &submitted) {
                debug!(chain_id = %chain_id, tx = %transaction, "Ready futures completed, chain idle");
            } else {
                debug!(
                    chain_id = %chain_id,
                    tx = %transaction,
                    state = %**witnessed,
                    "Ready futures completed after chain moved on"
                );
            }
        });
    }

    fn close(&self) {
        // Nothing ever leaves Closed, so a plain store is enough.
        self.core.state.store(Arc::new(ChainState::Closed));

        let chain_id = self.chain_id().clone();
        info!(chain_id = %chain_id, "Closing transaction chain");
        self.core
            .cluster
            .broadcast(ClusterMessage::from(CloseTransactionChain::new(chain_id)));
    }
}

impl fmt::Debug for ChainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainContext")
            .field("chain_id", self.chain_id())
            .field("state", &self.core.state.load().to_string())
            .finish()
    }
}

fn illegal_transition(transaction: &TransactionId, state: &ChainState) -> ChainError {
    ChainError::IllegalTransition {
        transaction: transaction.clone(),
        state: state.to_string(),
    }
}

/// A chain of transactions allowing a single open write transaction at a
/// time.
///
/// Readying is asynchronous: the caller hands over per-shard ready futures and
/// carries on. The next transaction may be allocated immediately, but its
/// shard lookups wait until the previous transaction is staged everywhere.
///
/// One caller per chain is a precondition. It is documented rather than
/// enforced; the only race the chain resolves internally is between a
/// completing readiness and a concurrent allocation or close.
pub struct TransactionChain<F: TransactionFactory = ChainedTransactionFactory> {
    context: ChainContext,
    factory: F,
}

impl<F: TransactionFactory> TransactionChain<F> {
    /// Create a new idle chain with a fresh process-unique identifier.
    pub fn new(cluster: ClusterContext, factory: F) -> Self {
        let context = ChainContext::new(cluster);
        debug!(chain_id = %context.chain_id(), "Created transaction chain");
        Self { context, factory }
    }

    /// Identifier of the chain.
    pub fn chain_id(&self) -> &ChainId {
        self.context.chain_id()
    }

    /// Chain handle shared with this chain's transactions.
    pub fn context(&self) -> &ChainContext {
        &self.context
    }

    /// Snapshot of the current chain state.
    pub fn state(&self) -> Arc<ChainState> {
        self.context.state()
    }

    /// Allocate a read-only transaction.
    ///
    /// Subject to the same admission check as writes, but never recorded as
    /// the chain's in-flight transaction since it has nothing to ready.
    pub fn new_read_only_transaction(&self) -> Result<F::Transaction, ChainError> {
        self.context.core.state.load().check_ready()?;

        let identifier = self.context.next_identifier();
        debug!(chain_id = %self.chain_id(), tx = %identifier, "Allocated read-only transaction");
        Ok(self
            .factory
            .new_transaction(&self.context, identifier, TransactionKind::ReadOnly))
    }

    /// Allocate a write-only transaction, after acquiring a creation permit.
    pub fn new_write_only_transaction(&self) -> Result<F::Transaction, ChainError> {
        self.context.core.cluster.acquire_creation_permit();
        self.allocate_write(TransactionKind::WriteOnly)
    }

    /// Allocate a read-write transaction, after acquiring a creation permit.
    pub fn new_read_write_transaction(&self) -> Result<F::Transaction, ChainError> {
        self.context.core.cluster.acquire_creation_permit();
        self.allocate_write(TransactionKind::ReadWrite)
    }

    /// Allocate a write transaction and record it as the chain's in-flight
    /// transaction.
    ///
    /// Assumes the creation permit has already been granted. A read-only
    /// `kind` is rejected without touching the chain. Any still
    /// pending readiness of an earlier transaction is carried into the new
    /// state so later shard lookups keep waiting for it.
    pub fn allocate_write(&self, kind: TransactionKind) -> Result<F::Transaction, ChainError> {
        if !kind.is_write() {
            return Err(ChainError::NotAWriteTransaction { kind });
        }

        let state = &self.context.core.state;
        let mut current = state.load_full();
        current.check_ready()?;

        let identifier = self.context.next_identifier();
        let transaction = self
            .factory
            .new_transaction(&self.context, identifier.clone(), kind);

        loop {
            let allocated = Arc::new(ChainState::Allocated {
                transaction: identifier.clone(),
                previous: current.previous_future().cloned(),
            });
            let witnessed = state.compare_and_swap(&current, allocated);
            if Arc::ptr_eq(&*witnessed, &current) {
                break;
            }

            // A readiness reset or a close got in first; judge against it.
            current = Guard::into_inner(witnessed);
            current.check_ready()?;
        }

        debug!(
            chain_id = %self.chain_id(),
            tx = %transaction.identifier(),
            kind = %kind,
            waits_on_previous = current.previous_future().is_some(),
            "Allocated write transaction"
        );
        Ok(transaction)
    }

    /// Ready `transaction`. See [`ChainContext::ready`].
    pub fn ready(
        &self,
        transaction: &TransactionId,
        futures: Vec<ReadyFuture>,
    ) -> Result<(), ChainError> {
        self.context.ready(transaction, futures)
    }

    /// Resolve a shard leader. See [`ChainContext::resolve_shard_for_routing`].
    pub fn resolve_shard_for_routing(&self, shard: &ShardName) -> RoutingFuture {
        self.context.resolve_shard_for_routing(shard)
    }

    /// Close the chain and tell every shard to release chain-scoped state.
    ///
    /// Closed always wins: a readiness completing afterwards finds a different
    /// state instance and leaves it alone. The broadcast is fire-and-forget;
    /// shard-side cleanup is neither awaited nor verified.
    pub fn close(&self) {
        self.context.close();
    }
}

impl<F: TransactionFactory> fmt::Debug for TransactionChain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionChain")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
