use log::trace;
use netcode_serde::{BitReader, BitWrite, Serde};

use crate::{
    connection::message_type::MessageType,
    snapshot::{error::SnapshotError, history::ConnectionGhostState},
    tick::NetworkTick,
    transport::{
        channel::{Pipeline, TransportChannel},
        error::TransportError,
    },
    types::ConnectionId,
};

/// Size of a snapshot acknowledgement packet: `[message type][tick]`
pub const SNAPSHOT_ACK_BYTES: usize = 5;

/// Tell the sender that the snapshot of `tick` arrived
pub fn send_snapshot_ack(
    transport: &mut dyn TransportChannel,
    connection: ConnectionId,
    tick: NetworkTick,
) -> Result<usize, TransportError> {
    let mut buffer = transport.begin_send(Pipeline::Unreliable, connection)?;
    MessageType::SnapshotAck.ser(&mut buffer.writer);
    tick.get().ser(&mut buffer.writer);
    if buffer.writer.has_failed_writes() {
        return Err(TransportError::PayloadTooLarge {
            size: SNAPSHOT_ACK_BYTES,
            capacity: buffer.writer.capacity(),
        });
    }
    transport.end_send(buffer)
}

pub fn read_snapshot_ack(packet: &[u8]) -> Result<NetworkTick, SnapshotError> {
    let mut reader = BitReader::new(packet);
    if MessageType::de(&mut reader)? != MessageType::SnapshotAck {
        return Err(SnapshotError::NotASnapshot);
    }
    Ok(NetworkTick::new(u32::de(&mut reader)?))
}

impl ConnectionGhostState {
    /// Handle an acknowledgement packet from the remote peer
    pub fn receive_ack(&mut self, packet: &[u8]) -> Result<NetworkTick, SnapshotError> {
        let tick = read_snapshot_ack(packet)?;
        trace!("Snapshot ack for tick {} from {:?}", tick, self.connection());
        self.acknowledge(tick);
        Ok(tick)
    }
}
