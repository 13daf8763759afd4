use thiserror::Error;

use crate::connection::message_type::MessageType;

/// Errors that can occur while handing an incoming packet to a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Packet is too short to contain its header
    #[error("Packet of {length} bytes is too short to contain a {expected:?} header")]
    TruncatedHeader {
        length: usize,
        expected: MessageType,
    },

    /// Packet carries a different message type than the one it was handed to
    #[error("Expected a {expected:?} packet but received {actual:?}")]
    UnexpectedMessageType {
        expected: MessageType,
        actual: MessageType,
    },

    /// Packet does not start with a known message type
    #[error("Packet does not start with a valid message type")]
    InvalidMessageType,
}
