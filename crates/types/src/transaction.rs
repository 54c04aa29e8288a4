//! Transaction kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of transaction a chain can allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Reads only; never becomes the chain's in-flight transaction.
    ReadOnly,
    /// Writes without reading.
    WriteOnly,
    /// Reads and writes.
    ReadWrite,
}

impl TransactionKind {
    /// Whether this kind produces writes that must be readied.
    pub fn is_write(self) -> bool {
        !matches!(self, TransactionKind::ReadOnly)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::ReadOnly => "read-only",
            TransactionKind::WriteOnly => "write-only",
            TransactionKind::ReadWrite => "read-write",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_kinds() {
        assert!(!TransactionKind::ReadOnly.is_write());
        assert!(TransactionKind::WriteOnly.is_write());
        assert!(TransactionKind::ReadWrite.is_write());
    }
}
