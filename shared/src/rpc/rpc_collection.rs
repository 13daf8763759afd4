use std::{any::TypeId, collections::HashMap};

use log::debug;
use netcode_serde::{BitReader, SerdeErr};

use crate::{
    constants::{MAX_RPC_TYPES, PROTOCOL_VERSION_RPC_HASH},
    hash::collection_hash,
    rpc::{error::RpcError, queue::RpcQueue, received::ReceivedRpcs, rpc::Rpc},
    types::ConnectionId,
};

/// What an executor gets to work with: a reader bounded to the RPC payload
/// and the connection it came from
pub struct RpcExecutorParameters<'a, 'b> {
    pub reader: &'a mut BitReader<'b>,
    pub connection: ConnectionId,
    pub received: &'a mut ReceivedRpcs,
}

/// Decodes and handles one RPC payload. A decode error disconnects the sender.
pub type RpcExecuteFn = fn(&mut RpcExecutorParameters) -> Result<(), SerdeErr>;

/// Executor used by `register_rpc`: decode the payload and push it into
/// the `ReceivedRpcs` inbox
pub fn default_executor<R: Rpc>(params: &mut RpcExecutorParameters) -> Result<(), SerdeErr> {
    let rpc = R::de(params.reader)?;
    params.received.push(params.connection, rpc);
    Ok(())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RpcCollectionState {
    /// Registration allowed
    Open,
    /// Version hash calculated, slots sorted by hash
    Finalized,
}

#[derive(Clone)]
struct RpcEntry {
    hash: u64,
    name: &'static str,
    type_id: TypeId,
    executor: Option<RpcExecuteFn>,
}

/// Registry of RPC types. Open for registration until the version hash is
/// calculated, after which slot indices are fixed.
pub struct RpcCollection {
    entries: Vec<RpcEntry>,
    state: RpcCollectionState,
    dynamic_assembly_list: bool,
    version_hash: u64,
}

impl Default for RpcCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcCollection {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            state: RpcCollectionState::Open,
            dynamic_assembly_list: false,
            version_hash: 0,
        }
    }

    pub fn state(&self) -> RpcCollectionState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register `R` with the executor that decodes it into `ReceivedRpcs`
    pub fn register_rpc<R: Rpc>(&mut self) -> Result<(), RpcError> {
        self.register_rpc_with_executor::<R>(default_executor::<R>)
    }

    /// Register `R` with a custom executor. Registering a known type again
    /// only replaces its executor, which is allowed after finalization.
    pub fn register_rpc_with_executor<R: Rpc>(
        &mut self,
        executor: RpcExecuteFn,
    ) -> Result<(), RpcError> {
        self.insert::<R>(Some(executor))
    }

    /// Reserve a slot for `R` so it can be sent. The executor has to be
    /// supplied through `register_rpc*` before the version hash is calculated.
    pub fn get_rpc_queue<R: Rpc>(&mut self) -> Result<RpcQueue<R>, RpcError> {
        self.insert::<R>(None)?;
        Ok(RpcQueue::new())
    }

    /// Address RPCs by their 64-bit hash instead of a 16-bit slot index.
    /// Peers may then register RPCs in different sets.
    pub fn set_dynamic_assembly_list(&mut self, enabled: bool) {
        self.dynamic_assembly_list = enabled;
    }

    pub fn uses_dynamic_assembly_list(&self) -> bool {
        self.dynamic_assembly_list
    }

    fn insert<R: Rpc>(&mut self, executor: Option<RpcExecuteFn>) -> Result<(), RpcError> {
        let hash = R::rpc_hash();
        if hash == PROTOCOL_VERSION_RPC_HASH {
            return Err(RpcError::ReservedHash { name: R::NAME });
        }

        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.hash == hash) {
            if entry.type_id != TypeId::of::<R>() {
                return Err(RpcError::HashCollision {
                    hash,
                    existing: entry.name,
                    new: R::NAME,
                });
            }
            if executor.is_some() {
                entry.executor = executor;
            }
            return Ok(());
        }

        if self.state == RpcCollectionState::Finalized {
            return Err(RpcError::RegistryFinalized { name: R::NAME });
        }

        self.entries.push(RpcEntry {
            hash,
            name: R::NAME,
            type_id: TypeId::of::<R>(),
            executor,
        });
        Ok(())
    }

    /// Combine every registered type hash into the collection's version
    /// hash. Sorts the slots by hash and finalizes the collection.
    pub fn calculate_version_hash(&mut self) -> Result<u64, RpcError> {
        if self.state == RpcCollectionState::Finalized {
            return Ok(self.version_hash);
        }

        if let Some(entry) = self.entries.iter().find(|entry| entry.executor.is_none()) {
            return Err(RpcError::MissingExecutor { name: entry.name });
        }
        if self.entries.len() > MAX_RPC_TYPES {
            return Err(RpcError::TooManyRpcTypes {
                count: self.entries.len(),
                max: MAX_RPC_TYPES,
            });
        }

        self.entries.sort_by_key(|entry| entry.hash);
        let mut hashes: Vec<u64> = self.entries.iter().map(|entry| entry.hash).collect();
        self.version_hash = collection_hash(&mut hashes);
        self.state = RpcCollectionState::Finalized;

        debug!(
            "RPC collection finalized with {} types, version hash {:#018x}",
            self.entries.len(),
            self.version_hash
        );
        Ok(self.version_hash)
    }

    /// Finalize and produce the read-only table used by dispatch and send code
    pub fn resolve(&mut self) -> Result<ResolvedRpcCollection, RpcError> {
        let version_hash = self.calculate_version_hash()?;

        let mut rpcs = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let executor = entry
                .executor
                .ok_or(RpcError::MissingExecutor { name: entry.name })?;
            rpcs.push(ResolvedRpc {
                hash: entry.hash,
                name: entry.name,
                type_id: entry.type_id,
                executor,
            });
        }

        let index_by_hash = rpcs
            .iter()
            .enumerate()
            .map(|(index, rpc)| (rpc.hash, index as u16))
            .collect();
        let index_by_type = rpcs
            .iter()
            .enumerate()
            .map(|(index, rpc)| (rpc.type_id, index as u16))
            .collect();

        Ok(ResolvedRpcCollection {
            rpcs,
            index_by_hash,
            index_by_type,
            dynamic_assembly_list: self.dynamic_assembly_list,
            version_hash,
        })
    }
}

#[derive(Clone)]
struct ResolvedRpc {
    hash: u64,
    name: &'static str,
    type_id: TypeId,
    executor: RpcExecuteFn,
}

/// Immutable RPC table shared by every connection once the protocol is
/// resolved. Slots are sorted by type hash.
#[derive(Clone)]
pub struct ResolvedRpcCollection {
    rpcs: Vec<ResolvedRpc>,
    index_by_hash: HashMap<u64, u16>,
    index_by_type: HashMap<TypeId, u16>,
    dynamic_assembly_list: bool,
    version_hash: u64,
}

impl ResolvedRpcCollection {
    pub fn len(&self) -> usize {
        self.rpcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rpcs.is_empty()
    }

    pub fn version_hash(&self) -> u64 {
        self.version_hash
    }

    pub fn uses_dynamic_assembly_list(&self) -> bool {
        self.dynamic_assembly_list
    }

    /// Bytes of the message header: slot index or type hash, then the payload size
    pub fn message_header_bytes(&self) -> usize {
        if self.dynamic_assembly_list {
            8 + 2
        } else {
            2 + 2
        }
    }

    pub fn index_of_hash(&self, hash: u64) -> Option<u16> {
        self.index_by_hash.get(&hash).copied()
    }

    pub fn index_of<R: Rpc>(&self) -> Option<u16> {
        self.index_by_type.get(&TypeId::of::<R>()).copied()
    }

    pub fn hash(&self, index: u16) -> Option<u64> {
        self.rpcs.get(index as usize).map(|rpc| rpc.hash)
    }

    pub fn name(&self, index: u16) -> Option<&'static str> {
        self.rpcs.get(index as usize).map(|rpc| rpc.name)
    }

    pub fn executor(&self, index: u16) -> Option<RpcExecuteFn> {
        self.rpcs.get(index as usize).map(|rpc| rpc.executor)
    }

    /// Name and hash of every slot, in slot order
    pub fn hashes(&self) -> Vec<(&'static str, u64)> {
        self.rpcs.iter().map(|rpc| (rpc.name, rpc.hash)).collect()
    }
}
