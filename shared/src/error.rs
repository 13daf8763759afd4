use thiserror::Error;

use crate::{
    connection::error::ConnectionError, protocol::ProtocolError, rpc::error::RpcError,
    snapshot::error::SnapshotError, transport::error::TransportError,
    world::component::error::GhostError,
};

/// Any error the replication core can return, for callers that drive
/// several engines from one function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetcodeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Ghost(#[from] GhostError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
