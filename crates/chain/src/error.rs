//! Error types for chain operations.

use thiserror::Error;
use txchain_core::{ReadinessError, RoutingError};
use txchain_types::{TransactionId, TransactionKind};

/// Errors surfaced by a transaction chain.
///
/// The first four are caller contract violations and are raised
/// synchronously. The last two arrive through routing futures and carry the
/// collaborator's failure unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The chain has been closed; no further transactions can be allocated.
    #[error("Transaction chain has been closed")]
    ChainClosed,

    /// A write transaction is allocated but has not been readied yet.
    #[error("Previous transaction {transaction} is not ready yet")]
    PreviousTransactionNotReady { transaction: TransactionId },

    /// Ready was called for a transaction that is not the allocated one.
    #[error("Readying transaction {transaction} while state is {state}")]
    IllegalTransition {
        transaction: TransactionId,
        state: String,
    },

    /// A non-write kind was passed where only writes are tracked.
    #[error("Cannot allocate a {kind} transaction as a write")]
    NotAWriteTransaction { kind: TransactionKind },

    /// A shard failed to stage the previous transaction.
    #[error("Ready future failed: {0}")]
    Readiness(#[from] ReadinessError),

    /// Shard leader lookup failed.
    #[error("Shard routing failed: {0}")]
    Routing(#[from] RoutingError),
}
