//! Chain states.

use crate::{ChainError, CombinedReadiness};
use std::fmt;
use txchain_types::TransactionId;

/// State of a transaction chain.
///
/// Instances are immutable. The chain swaps whole `Arc<ChainState>` values and
/// compares them by identity, so two structurally equal states are still
/// different instances as far as a compare-and-swap is concerned.
#[derive(Debug)]
pub enum ChainState {
    /// No transaction outstanding, nothing to wait for.
    Idle,

    /// A write transaction has been allocated but not readied.
    Allocated {
        /// The allocated transaction.
        transaction: TransactionId,
        /// Readiness of an earlier transaction that was still pending when
        /// this one was allocated.
        previous: Option<CombinedReadiness>,
    },

    /// A transaction has been readied and its shards are staging it.
    Submitted {
        /// The readied transaction.
        transaction: TransactionId,
        /// Combined readiness of the transaction's shards.
        previous: CombinedReadiness,
    },

    /// The chain has been closed. Terminal.
    Closed,
}

impl ChainState {
    /// Check whether a new transaction may be allocated in this state.
    pub fn check_ready(&self) -> Result<(), ChainError> {
        match self {
            // Readying and allocation may overlap.
            ChainState::Idle | ChainState::Submitted { .. } => Ok(()),
            ChainState::Allocated { transaction, .. } => {
                Err(ChainError::PreviousTransactionNotReady {
                    transaction: transaction.clone(),
                })
            }
            ChainState::Closed => Err(ChainError::ChainClosed),
        }
    }

    /// Readiness that shard lookups must wait for, if any.
    pub fn previous_future(&self) -> Option<&CombinedReadiness> {
        match self {
            ChainState::Allocated { previous, .. } => previous.as_ref(),
            ChainState::Submitted { previous, .. } => Some(previous),
            ChainState::Idle | ChainState::Closed => None,
        }
    }

    /// Transaction recorded in this state, if any.
    pub fn transaction(&self) -> Option<&TransactionId> {
        match self {
            ChainState::Allocated { transaction, .. }
            | ChainState::Submitted { transaction, .. } => Some(transaction),
            ChainState::Idle | ChainState::Closed => None,
        }
    }

    /// Whether this is [`ChainState::Idle`].
    pub fn is_idle(&self) -> bool {
        matches!(self, ChainState::Idle)
    }

    /// Whether this is [`ChainState::Allocated`].
    pub fn is_allocated(&self) -> bool {
        matches!(self, ChainState::Allocated { .. })
    }

    /// Whether this is [`ChainState::Submitted`].
    pub fn is_submitted(&self) -> bool {
        matches!(self, ChainState::Submitted { .. })
    }

    /// Whether this is [`ChainState::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, ChainState::Closed)
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Idle => f.write_str("Idle"),
            ChainState::Allocated { transaction, .. } => write!(f, "Allocated({transaction})"),
            ChainState::Submitted { transaction, .. } => write!(f, "Submitted({transaction})"),
            ChainState::Closed => f.write_str("Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txchain_test_helpers::ReadyTrigger;
    use txchain_types::{ChainId, MemberName, TransactionIdGenerator};

    fn tx() -> TransactionId {
        TransactionIdGenerator::new(ChainId::from_parts(MemberName::new("member-1"), 1)).next_id()
    }

    #[test]
    fn test_admission() {
        assert!(ChainState::Idle.check_ready().is_ok());
        assert_eq!(ChainState::Closed.check_ready(), Err(ChainError::ChainClosed));

        let allocated = ChainState::Allocated {
            transaction: tx(),
            previous: None,
        };
        assert_eq!(
            allocated.check_ready(),
            Err(ChainError::PreviousTransactionNotReady { transaction: tx() })
        );
    }

    #[test]
    fn test_submitted_allows_allocation_but_carries_future() {
        let (_trigger, ready) = ReadyTrigger::pending("alpha");
        let submitted = ChainState::Submitted {
            transaction: tx(),
            previous: CombinedReadiness::combine(vec![ready]),
        };

        assert!(submitted.check_ready().is_ok());
        assert_eq!(submitted.previous_future().map(|f| f.shard_count()), Some(1));
        assert_eq!(submitted.transaction(), Some(&tx()));
    }

    #[test]
    fn test_idle_and_closed_have_no_future() {
        assert!(ChainState::Idle.previous_future().is_none());
        assert!(ChainState::Closed.previous_future().is_none());
        assert!(ChainState::Closed.transaction().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(ChainState::Idle.to_string(), "Idle");
        let allocated = ChainState::Allocated {
            transaction: tx(),
            previous: None,
        };
        assert_eq!(allocated.to_string(), "Allocated(member-1-chn-1-txn-1)");
    }
}
