//! Message encoding and decoding for cluster transport.
//!
//! # Wire Format
//!
//! Messages are JSON documents tagged with the message type:
//!
//! ```text
//! {"type":"CloseTransactionChain","body":{"chain_id":{...}}}
//! ```

use crate::ClusterMessage;
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message too short")]
    MessageTooShort,

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Encode a cluster message to wire format.
pub fn encode_message(message: &ClusterMessage) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a cluster message from wire format.
pub fn decode_message(data: &[u8]) -> Result<ClusterMessage, CodecError> {
    if data.is_empty() {
        return Err(CodecError::MessageTooShort);
    }

    serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CloseTransactionChain;
    use txchain_types::{ChainId, MemberName};

    #[test]
    fn test_close_chain_wire_format() {
        let chain = ChainId::from_parts(MemberName::new("member-1"), 9);
        let message = ClusterMessage::from(CloseTransactionChain::new(chain));

        let bytes = encode_message(&message).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with(r#"{"type":"CloseTransactionChain""#));

        assert_eq!(decode_message(&bytes).unwrap(), message);
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(
            decode_message(&[]),
            Err(CodecError::MessageTooShort)
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_message(b"{\"type\":\"Unknown\"}"),
            Err(CodecError::Decode(_))
        ));
    }
}
