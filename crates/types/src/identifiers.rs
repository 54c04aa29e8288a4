//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide chain numbering, shared by every chain created in this process.
static CHAIN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Name of the cluster member hosting a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberName(String);

impl MemberName {
    /// Create a member name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Transaction chain identifier.
///
/// Formatted as `<member>-chn-<n>`. The number is drawn from a process-wide
/// counter, so identifiers are unique within one running member only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId {
    member: MemberName,
    number: u64,
}

impl ChainId {
    /// Allocate the next chain identifier for this process.
    pub fn allocate(member: MemberName) -> Self {
        let number = CHAIN_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        Self { member, number }
    }

    /// Build an identifier from explicit parts (decoding, tests).
    pub fn from_parts(member: MemberName, number: u64) -> Self {
        Self { member, number }
    }

    /// Member that owns the chain.
    pub fn member(&self) -> &MemberName {
        &self.member
    }

    /// Chain number within the member process.
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-chn-{}", self.member, self.number)
    }
}

/// Identifier of one transaction within a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    chain: ChainId,
    counter: u64,
}

impl TransactionId {
    /// Create a transaction identifier.
    pub fn new(chain: ChainId, counter: u64) -> Self {
        Self { chain, counter }
    }

    /// Chain this transaction belongs to.
    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    /// Position of the transaction within its chain (starting at 1).
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-txn-{}", self.chain, self.counter)
    }
}

/// Hands out monotonically increasing transaction identifiers for one chain.
#[derive(Debug)]
pub struct TransactionIdGenerator {
    chain: ChainId,
    next: AtomicU64,
}

impl TransactionIdGenerator {
    /// Create a generator for the given chain.
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            next: AtomicU64::new(0),
        }
    }

    /// Allocate the next identifier.
    pub fn next_id(&self) -> TransactionId {
        let counter = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        TransactionId::new(self.chain.clone(), counter)
    }

    /// Chain the identifiers belong to.
    pub fn chain(&self) -> &ChainId {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_ids_are_monotonic() {
        let first = ChainId::allocate(MemberName::new("member-1"));
        let second = ChainId::allocate(MemberName::new("member-1"));

        // Other tests may allocate concurrently, so only ordering is stable.
        assert!(second.number() > first.number());
        assert_ne!(first, second);
    }

    #[test]
    fn test_chain_id_display() {
        let chain = ChainId::from_parts(MemberName::new("member-2"), 7);
        assert_eq!(chain.to_string(), "member-2-chn-7");
    }

    #[test]
    fn test_transaction_ids_per_chain() {
        let chain = ChainId::from_parts(MemberName::new("member-1"), 3);
        let generator = TransactionIdGenerator::new(chain.clone());

        let t1 = generator.next_id();
        let t2 = generator.next_id();

        assert_eq!(t1.counter(), 1);
        assert_eq!(t2.counter(), 2);
        assert_eq!(t1.chain(), &chain);
        assert_eq!(t2.to_string(), "member-1-chn-3-txn-2");
        assert!(t1 < t2);
    }

    #[test]
    fn test_generators_are_independent() {
        let a = TransactionIdGenerator::new(ChainId::from_parts(MemberName::new("m"), 1));
        let b = TransactionIdGenerator::new(ChainId::from_parts(MemberName::new("m"), 2));

        assert_eq!(a.next_id().counter(), 1);
        assert_eq!(a.next_id().counter(), 2);
        assert_eq!(b.next_id().counter(), 1);
    }

    #[test]
    fn test_chain_id_serde() {
        let chain = ChainId::from_parts(MemberName::new("member-1"), 42);
        let json = serde_json::to_string(&chain).unwrap();
        assert_eq!(json, r#"{"member":"member-1","number":42}"#);
    }
}
