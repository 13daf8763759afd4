use log::{trace, warn};
use netcode_serde::{BitWrite, Serde};

use crate::{
    connection::{connection::Connection, packet_header::RpcPacketHeader},
    constants::RPC_PACKET_HEADER_BYTES,
    rpc::{error::RpcError, rpc_collection::ResolvedRpcCollection},
    transport::{
        channel::{Pipeline, TransportChannel},
        error::TransportError,
    },
};

/// Packs a connection's outgoing RPC stream into reliable packets
pub struct RpcSender<'p> {
    rpcs: &'p ResolvedRpcCollection,
}

impl<'p> RpcSender<'p> {
    pub fn new(rpcs: &'p ResolvedRpcCollection) -> Self {
        Self { rpcs }
    }

    /// Send as many whole queued RPCs as the transport accepts, packing them
    /// into as few packets as possible. Whatever is left stays queued, in
    /// order, for the next flush. Returns the number of packets sent.
    pub fn flush(
        &self,
        connection: &mut Connection,
        transport: &mut dyn TransportChannel,
        now_ms: u32,
    ) -> Result<usize, RpcError> {
        if connection.is_disconnected() {
            return Ok(0);
        }
        if connection.outgoing_rpcs.is_empty() {
            connection.deferred_flushes = 0;
            return Ok(0);
        }

        let header_bytes = self.rpcs.message_header_bytes();
        let mut sent = 0;
        let mut packets = 0;
        let mut result = Ok(());

        while sent < connection.outgoing_rpcs.len() {
            let mut buffer = match transport.begin_send(Pipeline::Reliable, connection.id()) {
                Ok(buffer) => buffer,
                Err(TransportError::QueueFull { .. }) => {
                    trace!("Reliable queue of {:?} is full", connection.id());
                    break;
                }
                Err(error) => {
                    result = Err(RpcError::Transport(error));
                    break;
                }
            };

            RpcPacketHeader::new(now_ms, connection.last_remote_time_ms()).ser(&mut buffer.writer);
            let capacity = (buffer.writer.bits_free() as usize / 8).min(
                connection
                    .config()
                    .rpc_packet_capacity
                    .saturating_sub(RPC_PACKET_HEADER_BYTES),
            );

            let outgoing = &connection.outgoing_rpcs;
            let mut end = sent;
            while end < outgoing.len() {
                let size = message_size(outgoing, end, header_bytes);
                if end + size > outgoing.len() || end + size - sent > capacity {
                    break;
                }
                end += size;
            }
            if end == sent {
                let size = message_size(outgoing, sent, header_bytes);
                transport.abort_send(buffer);
                result = Err(RpcError::RpcTooLarge { size, capacity });
                break;
            }

            buffer.writer.write_bytes(&outgoing[sent..end]);
            match transport.end_send(buffer) {
                Ok(bytes) => {
                    trace!(
                        "Sent reliable packet of {} bytes to {:?}",
                        bytes,
                        connection.id()
                    );
                    sent = end;
                    packets += 1;
                }
                Err(error) => {
                    warn!(
                        "Reliable send to {:?} failed, deferring {} bytes: {}",
                        connection.id(),
                        connection.outgoing_rpcs.len() - sent,
                        error
                    );
                    break;
                }
            }
        }

        connection.outgoing_rpcs.drain(..sent);
        if connection.outgoing_rpcs.is_empty() {
            connection.deferred_flushes = 0;
        } else {
            connection.deferred_flushes += 1;
            let threshold = connection.config().deferral_warning_threshold;
            if connection.deferred_flushes == threshold {
                warn!(
                    "RPCs to {:?} have been deferred for {} consecutive flushes, {} bytes pending",
                    connection.id(),
                    connection.deferred_flushes,
                    connection.outgoing_rpcs.len()
                );
            }
        }

        result.map(|()| packets)
    }
}

/// Size of the queued message starting at `offset`, header included.
/// The stream is only ever written by `RpcQueue::schedule`.
fn message_size(outgoing: &[u8], offset: usize, header_bytes: usize) -> usize {
    let size_at = offset + header_bytes - 2;
    let payload = outgoing
        .get(size_at..size_at + 2)
        .map_or(0, |bytes| u16::from_le_bytes([bytes[0], bytes[1]]) as usize);
    header_bytes + payload
}
