//! Failures reported by the cluster collaborators.

use thiserror::Error;
use txchain_types::ShardName;

/// A shard failed to stage a readied transaction.
///
/// Cloneable because one failure is handed to every waiter of a combined
/// readiness future.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    /// The shard answered the ready request with a failure.
    #[error("Shard {shard} rejected ready: {reason}")]
    Rejected { shard: ShardName, reason: String },

    /// The ready request was dropped before the shard answered.
    #[error("Ready request to shard {shard} was abandoned")]
    Abandoned { shard: ShardName },
}

impl ReadinessError {
    /// Shard that reported the failure.
    pub fn shard(&self) -> &ShardName {
        match self {
            ReadinessError::Rejected { shard, .. } | ReadinessError::Abandoned { shard } => shard,
        }
    }
}

/// Shard leader lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// No leader is known for the shard (e.g. during an election).
    #[error("No shard leader found for {0}")]
    NoShardLeaderFound(ShardName),

    /// A leader is known but did not answer.
    #[error("Shard leader for {0} is not responding")]
    ShardLeaderNotResponding(ShardName),
}
