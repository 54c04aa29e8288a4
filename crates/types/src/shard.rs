//! Shard naming and leader routing results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a shard (an independently led partition of the data set).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardName(String);

impl ShardName {
    /// Create a shard name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Result of a successful leader lookup for a shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardLeaderInfo {
    /// Shard that was resolved.
    pub shard: ShardName,

    /// Address of the current leader replica.
    pub leader: String,

    /// Leader term the answer was taken from.
    ///
    /// Changes whenever leadership moves, so callers can tell a stale answer
    /// from a fresh one.
    pub term: u64,
}

impl ShardLeaderInfo {
    /// Create a new leader record.
    pub fn new(shard: ShardName, leader: impl Into<String>, term: u64) -> Self {
        Self {
            shard,
            leader: leader.into(),
            term,
        }
    }
}

impl fmt::Display for ShardLeaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (term {})", self.shard, self.leader, self.term)
    }
}
