use thiserror::Error;

use crate::{rpc::error::RpcError, world::component::error::GhostError};

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// An RPC could not be registered or the RPC collection could not be finalized
    #[error("RPC registration failed: {0}")]
    Rpc(#[from] RpcError),

    /// A component, buffer or ghost type could not be registered
    #[error("Ghost registration failed: {0}")]
    Ghost(#[from] GhostError),
}
