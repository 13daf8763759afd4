use thiserror::Error;

use crate::types::ConnectionId;

/// Errors a transport channel can surface from `begin_send` / `end_send`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Send queue is full, the data should be retried on the next tick
    #[error("Send queue for connection {connection:?} is full")]
    QueueFull {
        connection: ConnectionId,
    },

    /// Packet is larger than the pipeline accepts
    #[error("Packet of {size} bytes exceeds the pipeline limit of {capacity} bytes")]
    PayloadTooLarge {
        size: usize,
        capacity: usize,
    },

    /// The transport has no connection with this id
    #[error("Connection {connection:?} is not known to the transport")]
    UnknownConnection {
        connection: ConnectionId,
    },

    /// Underlying socket reported a failure
    #[error("Transport I/O failure: {reason}")]
    Io {
        reason: String,
    },
}
