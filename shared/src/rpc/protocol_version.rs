use netcode_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, StreamWriter};

use crate::{
    connection::connection::Connection,
    constants::{PROTOCOL_VERSION_RPC_HASH, PROTOCOL_VERSION_RPC_INDEX},
    rpc::rpc_collection::ResolvedRpcCollection,
};

/// Payload of the handshake message every connection starts with. Peers
/// whose versions differ are disconnected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub netcode_version: i32,
    pub game_version: i32,
    pub rpc_collection_version: u64,
    pub component_collection_version: u64,
}

pub const PROTOCOL_VERSION_BYTES: usize = 24;

impl ProtocolVersion {
    pub fn new(
        netcode_version: i32,
        game_version: i32,
        rpc_collection_version: u64,
        component_collection_version: u64,
    ) -> Self {
        Self {
            netcode_version,
            game_version,
            rpc_collection_version,
            component_collection_version,
        }
    }

    /// Version exchanged when RPCs are addressed by hash. The collections
    /// may legitimately differ between peers, so their hashes are zeroed.
    pub fn dynamic(netcode_version: i32, game_version: i32) -> Self {
        Self::new(netcode_version, game_version, 0, 0)
    }
}

impl Serde for ProtocolVersion {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.netcode_version.ser(writer);
        self.game_version.ser(writer);
        self.rpc_collection_version.ser(writer);
        self.component_collection_version.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            netcode_version: i32::de(reader)?,
            game_version: i32::de(reader)?,
            rpc_collection_version: u64::de(reader)?,
            component_collection_version: u64::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        <Self as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for ProtocolVersion {
    fn const_bit_length() -> u32 {
        <i32 as ConstBitLength>::const_bit_length() * 2
            + <u64 as ConstBitLength>::const_bit_length() * 2
    }
}

/// Queue the handshake message ahead of anything else the connection sends
pub fn queue_protocol_version(
    connection: &mut Connection,
    rpcs: &ResolvedRpcCollection,
    version: &ProtocolVersion,
) {
    let mut message = StreamWriter::new();
    if rpcs.uses_dynamic_assembly_list() {
        PROTOCOL_VERSION_RPC_HASH.ser(&mut message);
    } else {
        PROTOCOL_VERSION_RPC_INDEX.ser(&mut message);
    }
    (PROTOCOL_VERSION_BYTES as u16).ser(&mut message);
    version.ser(&mut message);

    let mut outgoing = message.to_bytes();
    outgoing.append(&mut connection.outgoing_rpcs);
    connection.outgoing_rpcs = outgoing;
}
