use thiserror::Error;

use crate::transport::error::TransportError;

/// Errors raised while registering, scheduling or sending RPCs. All of them
/// point at an integration bug except `Transport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Two distinct RPC types hash to the same value
    #[error("RPC '{new}' has the same type hash {hash:#018x} as already registered RPC '{existing}'")]
    HashCollision {
        hash: u64,
        existing: &'static str,
        new: &'static str,
    },

    /// A new RPC type was registered after the version hash was calculated
    #[error("Cannot register RPC '{name}', the RPC collection is already finalized")]
    RegistryFinalized { name: &'static str },

    /// The type hash collides with the protocol version handshake sentinel
    #[error("RPC '{name}' hashes to the value reserved for the protocol version handshake")]
    ReservedHash { name: &'static str },

    /// A slot was reserved through `get_rpc_queue` but never given an executor
    #[error("RPC '{name}' is used but was never registered with an executor")]
    MissingExecutor { name: &'static str },

    #[error("{count} RPC types are registered, at most {max} are supported")]
    TooManyRpcTypes { count: usize, max: usize },

    /// The RPC was scheduled on a collection it is not registered in
    #[error("RPC '{name}' is not registered in this RPC collection")]
    NotRegistered { name: &'static str },

    /// The serialized payload does not fit the u16 size field
    #[error("Payload of RPC '{name}' is {size} bytes, at most {max} bytes are supported")]
    PayloadTooLarge {
        name: &'static str,
        size: usize,
        max: usize,
    },

    /// A single RPC does not fit an otherwise empty reliable packet
    #[error("RPC message of {size} bytes does not fit in a reliable packet with {capacity} bytes of room")]
    RpcTooLarge { size: usize, capacity: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
