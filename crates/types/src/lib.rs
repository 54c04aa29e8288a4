//! Core types shared by the transaction-chain crates.
//!
//! Identifiers are process-local: chain numbers come from a counter that
//! starts when the process starts and is never reset, so a [`ChainId`] is
//! only unique for the lifetime of one cluster member process.

mod identifiers;
mod shard;
mod transaction;

pub use identifiers::{ChainId, MemberName, TransactionId, TransactionIdGenerator};
pub use shard::{ShardLeaderInfo, ShardName};
pub use transaction::TransactionKind;
