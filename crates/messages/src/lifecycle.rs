//! Chain lifecycle messages.

use serde::{Deserialize, Serialize};
use txchain_types::ChainId;

/// Tells every shard that a chain is gone and its chain-scoped state can be
/// released.
///
/// Sent to all shards, not only the ones the chain touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTransactionChain {
    /// The chain being closed.
    pub chain_id: ChainId,
}

impl CloseTransactionChain {
    /// Create a new close notification.
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id }
    }

    /// Get the chain being closed.
    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }
}

/// Messages a member sends to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum ClusterMessage {
    /// Chain teardown notification.
    CloseTransactionChain(CloseTransactionChain),
}

impl ClusterMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ClusterMessage::CloseTransactionChain(_) => "CloseTransactionChain",
        }
    }

    /// Chain the message is scoped to.
    pub fn chain_id(&self) -> &ChainId {
        match self {
            ClusterMessage::CloseTransactionChain(close) => close.chain_id(),
        }
    }
}

impl From<CloseTransactionChain> for ClusterMessage {
    fn from(message: CloseTransactionChain) -> Self {
        ClusterMessage::CloseTransactionChain(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txchain_types::MemberName;

    #[test]
    fn test_close_message_scoped_to_chain() {
        let chain = ChainId::from_parts(MemberName::new("member-1"), 4);
        let message = ClusterMessage::from(CloseTransactionChain::new(chain.clone()));

        assert_eq!(message.type_name(), "CloseTransactionChain");
        assert_eq!(message.chain_id(), &chain);
    }
}
