/// Identifies a connection to a remote peer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// Network identifier of a replicated entity, shared by every peer
pub type GhostId = u32;

/// Position of a ghost type in the protocol's ghost collection
pub type GhostTypeIndex = usize;
