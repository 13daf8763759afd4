use netcode_serde::BitWriter;

use crate::{transport::error::TransportError, types::ConnectionId};

/// Delivery guarantees of a send
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pipeline {
    /// Ordered and retransmitted, used for RPCs
    Reliable,
    /// Fire and forget, used for snapshots
    Unreliable,
}

/// A packet being built for one connection. The writer's capacity is the
/// largest payload the pipeline accepts.
pub struct SendBuffer {
    pipeline: Pipeline,
    connection: ConnectionId,
    pub writer: BitWriter,
}

impl SendBuffer {
    pub fn new(pipeline: Pipeline, connection: ConnectionId, capacity: usize) -> Self {
        Self {
            pipeline,
            connection,
            writer: BitWriter::with_capacity(capacity),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn into_parts(self) -> (Pipeline, ConnectionId, Vec<u8>) {
        (self.pipeline, self.connection, self.writer.into_bytes())
    }
}

/// Packet channel the replication core sends through. Implemented by the
/// socket layer; incoming packets are handed to `Connection::receive_rpc_packet`
/// and the snapshot receiver directly.
pub trait TransportChannel {
    /// Reserve a packet for `connection`
    fn begin_send(
        &mut self,
        pipeline: Pipeline,
        connection: ConnectionId,
    ) -> Result<SendBuffer, TransportError>;

    /// Queue a packet built from `begin_send`, returning the number of bytes sent
    fn end_send(&mut self, buffer: SendBuffer) -> Result<usize, TransportError>;

    /// Release a packet from `begin_send` that will not be sent
    fn abort_send(&mut self, buffer: SendBuffer) {
        drop(buffer);
    }
}
