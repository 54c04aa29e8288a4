//! Transaction construction seam.

use crate::{ChainContext, ChainError, RoutingFuture};
use txchain_core::ReadyFuture;
use txchain_types::{ShardName, TransactionId, TransactionKind};

/// What the chain needs to know about the transactions it hands out.
pub trait ChainTransaction: Send {
    /// Identifier the chain allocated for this transaction.
    fn identifier(&self) -> &TransactionId;

    /// Kind requested at allocation.
    fn kind(&self) -> TransactionKind;
}

/// Builds transaction objects bound to a chain.
///
/// The factory owns the transaction's interaction with shard leaders. It
/// receives the [`ChainContext`] so the transaction can route through the
/// chain and report readiness back to it.
pub trait TransactionFactory: Send + Sync {
    /// Transaction type produced.
    type Transaction: ChainTransaction;

    /// Create a transaction with an already allocated identifier.
    fn new_transaction(
        &self,
        context: &ChainContext,
        identifier: TransactionId,
        kind: TransactionKind,
    ) -> Self::Transaction;
}

/// Minimal transaction handle: an identifier plus the chain it belongs to.
///
/// Callers that do their own shard I/O use this to route through the chain and
/// to hand their per-shard ready futures back to it.
#[derive(Debug, Clone)]
pub struct ChainedTransaction {
    identifier: TransactionId,
    kind: TransactionKind,
    context: ChainContext,
}

impl ChainedTransaction {
    /// Resolve the leader of `shard`, after any pending readiness of earlier
    /// transactions in the chain.
    pub fn resolve_shard(&self, shard: &ShardName) -> RoutingFuture {
        self.context.resolve_shard_for_routing(shard)
    }

    /// Ready this transaction with one future per participating shard.
    ///
    /// Only write transactions are tracked by the chain; readying a read-only
    /// transaction is rejected as an illegal transition.
    pub fn ready(self, futures: Vec<ReadyFuture>) -> Result<(), ChainError> {
        self.context.ready(&self.identifier, futures)
    }

    /// Chain this transaction belongs to.
    pub fn context(&self) -> &ChainContext {
        &self.context
    }
}

impl ChainTransaction for ChainedTransaction {
    fn identifier(&self) -> &TransactionId {
        &self.identifier
    }

    fn kind(&self) -> TransactionKind {
        self.kind
    }
}

/// Factory producing [`ChainedTransaction`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainedTransactionFactory;

impl TransactionFactory for ChainedTransactionFactory {
    type Transaction = ChainedTransaction;

    fn new_transaction(
        &self,
        context: &ChainContext,
        identifier: TransactionId,
        kind: TransactionKind,
    ) -> ChainedTransaction {
        ChainedTransaction {
            identifier,
            kind,
            context: context.clone(),
        }
    }
}
