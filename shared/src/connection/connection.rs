use log::{debug, trace};
use netcode_serde::{BitReader, Serde};

use crate::{
    connection::{
        connection_config::ConnectionConfig, error::ConnectionError, message_type::MessageType,
        packet_header::RpcPacketHeader,
    },
    constants::RPC_PACKET_HEADER_BYTES,
    types::ConnectionId,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the remote protocol version
    Handshaking,
    /// Protocol version verified, RPCs are accepted
    Connected,
    Disconnected,
}

/// Machine-readable reason a connection was torn down
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peers were built from different protocols
    ProtocolVersionMismatch,
    /// An RPC addressed an unknown slot, arrived before the handshake, or failed to decode
    InvalidRpc,
    /// A snapshot referenced missing baselines or failed to decode
    InvalidSnapshot,
    /// Closed by the application
    Closed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub connection: ConnectionId,
    pub reason: DisconnectReason,
}

/// Per-connection state owned by a single work item: the incoming and
/// outgoing reliable RPC streams, the handshake status and the disconnect
/// reason once the connection is torn down.
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    disconnect_reason: Option<DisconnectReason>,
    events: Vec<DisconnectEvent>,
    pub(crate) incoming_rpcs: Vec<u8>,
    pub(crate) outgoing_rpcs: Vec<u8>,
    last_remote_time_ms: u32,
    pub(crate) deferred_flushes: u32,
    config: ConnectionConfig,
}

impl Connection {
    pub fn new(id: ConnectionId, config: &ConnectionConfig) -> Self {
        Self {
            id,
            state: ConnectionState::Handshaking,
            disconnect_reason: None,
            events: Vec::new(),
            incoming_rpcs: Vec::new(),
            outgoing_rpcs: Vec::new(),
            last_remote_time_ms: 0,
            deferred_flushes: 0,
            config: config.clone(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    pub fn has_protocol_version(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub(crate) fn mark_protocol_verified(&mut self) {
        if self.state == ConnectionState::Handshaking {
            debug!("Connection {:?} completed the protocol version handshake", self.id);
            self.state = ConnectionState::Connected;
        }
    }

    /// Tear the connection down. Only the first reason is kept, but a
    /// protocol version mismatch found afterwards replaces it, since it
    /// explains every other failure.
    pub fn disconnect(&mut self, reason: DisconnectReason) {
        match self.state {
            ConnectionState::Disconnected => {
                if reason == DisconnectReason::ProtocolVersionMismatch
                    && self.disconnect_reason != Some(reason)
                {
                    self.disconnect_reason = Some(reason);
                    self.events.push(DisconnectEvent {
                        connection: self.id,
                        reason,
                    });
                }
            }
            _ => {
                debug!("Disconnecting {:?}: {:?}", self.id, reason);
                self.state = ConnectionState::Disconnected;
                self.disconnect_reason = Some(reason);
                self.events.push(DisconnectEvent {
                    connection: self.id,
                    reason,
                });
            }
        }
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    pub fn take_disconnect_events(&mut self) -> Vec<DisconnectEvent> {
        std::mem::take(&mut self.events)
    }

    /// Most recent sender clock seen in a reliable packet, echoed back in
    /// outgoing packet headers
    pub fn last_remote_time_ms(&self) -> u32 {
        self.last_remote_time_ms
    }

    /// Strip the header of a reliable packet and queue its RPC stream for
    /// the next `RpcReceiver::process` pass
    pub fn receive_rpc_packet(&mut self, packet: &[u8]) -> Result<(), ConnectionError> {
        if packet.len() < RPC_PACKET_HEADER_BYTES {
            return Err(ConnectionError::TruncatedHeader {
                length: packet.len(),
                expected: MessageType::Rpc,
            });
        }

        let mut reader = BitReader::new(packet);
        let header =
            RpcPacketHeader::de(&mut reader).map_err(|_| ConnectionError::InvalidMessageType)?;
        if header.message_type != MessageType::Rpc {
            return Err(ConnectionError::UnexpectedMessageType {
                expected: MessageType::Rpc,
                actual: header.message_type,
            });
        }

        // a disconnected connection still buffers data, so a trailing handshake can
        // report the real reason the peers disagree
        self.last_remote_time_ms = header.local_time_ms;
        self.incoming_rpcs
            .extend_from_slice(&packet[RPC_PACKET_HEADER_BYTES..]);
        trace!(
            "Connection {:?} buffered {} RPC bytes",
            self.id,
            packet.len() - RPC_PACKET_HEADER_BYTES
        );
        Ok(())
    }

    /// Bytes queued for sending that did not fit in a packet yet
    pub fn pending_outgoing_rpc_bytes(&self) -> usize {
        self.outgoing_rpcs.len()
    }

    pub fn pending_incoming_rpc_bytes(&self) -> usize {
        self.incoming_rpcs.len()
    }

    /// Number of consecutive flushes that left data behind
    pub fn deferred_flushes(&self) -> u32 {
        self.deferred_flushes
    }
}
