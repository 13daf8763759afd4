use std::marker::PhantomData;

use log::trace;
use netcode_serde::{Serde, StreamWriter};

use crate::{
    connection::connection::Connection,
    constants::RPC_PACKET_HEADER_BYTES,
    rpc::{error::RpcError, rpc::Rpc, rpc_collection::ResolvedRpcCollection},
};

/// Typed handle for sending one RPC type, obtained from
/// `RpcCollection::get_rpc_queue`
pub struct RpcQueue<R: Rpc> {
    phantom: PhantomData<fn(R)>,
}

impl<R: Rpc> Clone for RpcQueue<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Rpc> Copy for RpcQueue<R> {}

impl<R: Rpc> Default for RpcQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rpc> RpcQueue<R> {
    pub fn new() -> Self {
        Self {
            phantom: PhantomData,
        }
    }

    /// Append `rpc` to the connection's outgoing RPC stream. It goes out with
    /// the next `RpcSender::flush`.
    pub fn schedule(
        &self,
        connection: &mut Connection,
        rpcs: &ResolvedRpcCollection,
        rpc: &R,
    ) -> Result<(), RpcError> {
        let index = rpcs
            .index_of::<R>()
            .ok_or(RpcError::NotRegistered { name: R::NAME })?;

        let mut payload = StreamWriter::new();
        rpc.ser(&mut payload);
        let payload = payload.to_bytes();
        if payload.len() > u16::MAX as usize {
            return Err(RpcError::PayloadTooLarge {
                name: R::NAME,
                size: payload.len(),
                max: u16::MAX as usize,
            });
        }

        let size = rpcs.message_header_bytes() + payload.len();
        let capacity = connection
            .config()
            .rpc_packet_capacity
            .saturating_sub(RPC_PACKET_HEADER_BYTES);
        if size > capacity {
            return Err(RpcError::RpcTooLarge { size, capacity });
        }

        let mut header = StreamWriter::new();
        if rpcs.uses_dynamic_assembly_list() {
            R::rpc_hash().ser(&mut header);
        } else {
            index.ser(&mut header);
        }
        (payload.len() as u16).ser(&mut header);

        trace!(
            "Scheduled RPC '{}' ({} bytes) on {:?}",
            R::NAME,
            size,
            connection.id()
        );
        connection.outgoing_rpcs.extend_from_slice(header.as_bytes());
        connection.outgoing_rpcs.extend_from_slice(&payload);
        Ok(())
    }
}
