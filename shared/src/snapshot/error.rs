use netcode_serde::SerdeErr;
use thiserror::Error;

use crate::{
    transport::error::TransportError,
    types::{ConnectionId, GhostId},
    world::component::error::GhostError,
};

/// Errors raised while writing, reading or applying snapshots
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// A buffer does not fit in the dynamic data region
    #[error("Dynamic data region overrun: {required} bytes required, capacity is {capacity}. Raise ConnectionConfig::dynamic_data_capacity")]
    DynamicDataOverrun {
        required: usize,
        capacity: usize,
    },

    /// A snapshot references a baseline this peer no longer (or never) had
    #[error("Ghost {ghost_id} references baseline tick {tick} which is not in its snapshot history")]
    MissingBaseline {
        ghost_id: GhostId,
        tick: u32,
    },

    /// A ghost was sent with a baseline before this peer knew its type
    #[error("Ghost {ghost_id} was delta compressed but its ghost type is unknown")]
    UnknownGhost {
        ghost_id: GhostId,
    },

    /// Ghost type index outside of the ghost collection
    #[error("Ghost type index {index} is out of range, the protocol registers {count} ghost types")]
    InvalidGhostType {
        index: usize,
        count: usize,
    },

    /// Chunk column missing or of the wrong type
    #[error("Ghost component error: {0}")]
    Ghost(#[from] GhostError),

    /// The transport refused the snapshot packet
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection was disconnected while its snapshot was being written
    #[error("Snapshot for connection {connection:?} was abandoned")]
    Cancelled {
        connection: ConnectionId,
    },

    /// A prediction backup was applied to a chunk of another ghost type
    #[error("Prediction backup of ghost type {expected} used on a chunk of ghost type {actual}")]
    BackupMismatch {
        expected: usize,
        actual: usize,
    },

    /// A serialization worker thread panicked
    #[error("Snapshot worker panicked")]
    WorkerPanicked,

    /// The packet is not a snapshot packet
    #[error("Packet is not a snapshot packet")]
    NotASnapshot,

    /// The bit stream ended early or contained invalid values
    #[error("Snapshot stream is truncated or malformed")]
    Malformed,
}

impl From<SerdeErr> for SnapshotError {
    fn from(_: SerdeErr) -> Self {
        SnapshotError::Malformed
    }
}
