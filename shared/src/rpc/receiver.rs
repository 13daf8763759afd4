use log::{error, trace};
use netcode_serde::{BitReader, Serde};

use crate::{
    connection::connection::{Connection, DisconnectReason},
    constants::{PROTOCOL_VERSION_RPC_HASH, PROTOCOL_VERSION_RPC_INDEX},
    rpc::{
        protocol_version::ProtocolVersion,
        received::ReceivedRpcs,
        rpc_collection::{ResolvedRpcCollection, RpcExecutorParameters},
    },
    world::ghost::ghost_collection::GhostCollection,
};

/// Slot a message header addresses
enum MessageSlot {
    Handshake,
    Rpc(u16),
    Unknown,
}

/// Drains a connection's incoming RPC stream, verifying the protocol
/// version handshake and invoking executors
pub struct RpcReceiver<'p> {
    rpcs: &'p ResolvedRpcCollection,
    ghosts: &'p GhostCollection,
    local_version: ProtocolVersion,
}

impl<'p> RpcReceiver<'p> {
    pub fn new(
        rpcs: &'p ResolvedRpcCollection,
        ghosts: &'p GhostCollection,
        local_version: ProtocolVersion,
    ) -> Self {
        Self {
            rpcs,
            ghosts,
            local_version,
        }
    }

    pub fn local_version(&self) -> &ProtocolVersion {
        &self.local_version
    }

    /// Process every message buffered on `connection`. Returns the number of
    /// executors invoked. Any protocol error disconnects the connection and
    /// drops the rest of the stream.
    pub fn process(&self, connection: &mut Connection, received: &mut ReceivedRpcs) -> usize {
        let data = std::mem::take(&mut connection.incoming_rpcs);
        let header_bytes = self.rpcs.message_header_bytes();

        let mut position = 0;
        let mut executed = 0;
        while position < data.len() {
            let Some((slot, size)) = self.read_header(&data[position..]) else {
                error!("Truncated RPC header from {:?}", connection.id());
                connection.disconnect(DisconnectReason::InvalidRpc);
                break;
            };
            let payload_start = position + header_bytes;
            let payload_end = payload_start + size;
            if payload_end > data.len() {
                error!(
                    "RPC payload of {} bytes from {:?} overruns the stream",
                    size,
                    connection.id()
                );
                connection.disconnect(DisconnectReason::InvalidRpc);
                break;
            }
            let payload = &data[payload_start..payload_end];

            if connection.is_disconnected() {
                // a lone handshake can still tell why the peers disagree
                if matches!(slot, MessageSlot::Handshake)
                    && position == 0
                    && payload_end == data.len()
                {
                    self.process_handshake(connection, payload);
                }
                break;
            }

            match slot {
                MessageSlot::Handshake => {
                    if connection.has_protocol_version() {
                        error!("Duplicate protocol version from {:?}", connection.id());
                        connection.disconnect(DisconnectReason::InvalidRpc);
                        break;
                    }
                    self.process_handshake(connection, payload);
                    if connection.is_disconnected() {
                        break;
                    }
                }
                MessageSlot::Rpc(index) => {
                    if !connection.has_protocol_version() {
                        error!(
                            "RPC received from {:?} before the protocol version",
                            connection.id()
                        );
                        connection.disconnect(DisconnectReason::InvalidRpc);
                        break;
                    }
                    let Some(executor) = self.rpcs.executor(index) else {
                        error!(
                            "RPC index {} from {:?} is out of range, {} RPCs are registered",
                            index,
                            connection.id(),
                            self.rpcs.len()
                        );
                        connection.disconnect(DisconnectReason::InvalidRpc);
                        break;
                    };

                    let mut reader = BitReader::new(payload);
                    let mut params = RpcExecutorParameters {
                        reader: &mut reader,
                        connection: connection.id(),
                        received: &mut *received,
                    };
                    if executor(&mut params).is_err() {
                        error!(
                            "RPC '{}' from {:?} failed to decode",
                            self.rpcs.name(index).unwrap_or("?"),
                            connection.id()
                        );
                        connection.disconnect(DisconnectReason::InvalidRpc);
                        break;
                    }
                    executed += 1;
                }
                MessageSlot::Unknown => {
                    error!("Unknown RPC hash from {:?}", connection.id());
                    connection.disconnect(DisconnectReason::InvalidRpc);
                    break;
                }
            }
            position = payload_end;
        }

        trace!(
            "Processed {} RPCs from {:?}",
            executed,
            connection.id()
        );
        executed
    }

    fn read_header(&self, bytes: &[u8]) -> Option<(MessageSlot, usize)> {
        if bytes.len() < self.rpcs.message_header_bytes() {
            return None;
        }
        let mut reader = BitReader::new(bytes);
        let slot = if self.rpcs.uses_dynamic_assembly_list() {
            let hash = u64::de(&mut reader).ok()?;
            if hash == PROTOCOL_VERSION_RPC_HASH {
                MessageSlot::Handshake
            } else {
                self.rpcs
                    .index_of_hash(hash)
                    .map_or(MessageSlot::Unknown, MessageSlot::Rpc)
            }
        } else {
            let index = u16::de(&mut reader).ok()?;
            if index == PROTOCOL_VERSION_RPC_INDEX {
                MessageSlot::Handshake
            } else {
                MessageSlot::Rpc(index)
            }
        };
        let size = u16::de(&mut reader).ok()?;
        Some((slot, size as usize))
    }

    fn process_handshake(&self, connection: &mut Connection, payload: &[u8]) {
        let Ok(remote) = ProtocolVersion::de(&mut BitReader::new(payload)) else {
            error!("Malformed protocol version from {:?}", connection.id());
            connection.disconnect(DisconnectReason::InvalidRpc);
            return;
        };

        if remote != self.local_version {
            self.report_version_mismatch(connection, &remote);
            connection.disconnect(DisconnectReason::ProtocolVersionMismatch);
            return;
        }
        connection.mark_protocol_verified();
    }

    fn report_version_mismatch(&self, connection: &Connection, remote: &ProtocolVersion) {
        error!(
            "Protocol version mismatch on {:?}: local {:?}, remote {:?}",
            connection.id(),
            self.local_version,
            remote
        );
        error!("Registered RPCs:");
        for (name, hash) in self.rpcs.hashes() {
            error!("  {:#018x} {}", hash, name);
        }
        error!("Registered components:");
        for (name, hash) in self.ghosts.component_kinds().hashes() {
            error!("  {:#018x} {}", hash, name);
        }
    }
}
