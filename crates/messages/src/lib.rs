//! Cluster messages exchanged between a chain's member and the shards.

pub mod codec;
pub mod lifecycle;

// Re-export commonly used types
pub use codec::{decode_message, encode_message, CodecError};
pub use lifecycle::{ClusterMessage, CloseTransactionChain};
