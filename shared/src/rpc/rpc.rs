use netcode_serde::Serde;

use crate::hash::type_hash;

/// A reliable remote procedure call. The payload is the type itself,
/// serialized with `Serde`.
pub trait Rpc: Serde + Send + Sync + 'static {
    /// Stable name the wire hash is computed from
    const NAME: &'static str;

    /// Identifies the RPC type on the wire and in the protocol version hash
    fn rpc_hash() -> u64 {
        type_hash(Self::NAME)
    }
}
