/// Version of the netcode wire format, exchanged in the protocol version handshake
pub const NETCODE_VERSION: i32 = 1;

/// Reliable packet header: message type, local time, remote time
pub const RPC_PACKET_HEADER_BYTES: usize = 9;

/// Index that marks the protocol version handshake when RPCs are addressed by slot
pub const PROTOCOL_VERSION_RPC_INDEX: u16 = u16::MAX;
/// Hash that marks the protocol version handshake in dynamic assembly list mode
pub const PROTOCOL_VERSION_RPC_HASH: u64 = 0;

/// Slot indices are u16 and `u16::MAX` is reserved
pub const MAX_RPC_TYPES: usize = u16::MAX as usize;

/// Snapshot records start with the tick they were taken at
pub const SNAPSHOT_TICK_OFFSET: usize = 0;
/// The change mask directly follows the tick
pub const SNAPSHOT_MASK_OFFSET: usize = 4;

/// Every ghost field occupies one 32-bit word of a snapshot record
pub const FIELD_SIZE_BYTES: usize = 4;
