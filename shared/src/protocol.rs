use netcode_serde::CompressionModel;

use crate::{
    connection::{connection::Connection, connection_config::ConnectionConfig},
    constants::NETCODE_VERSION,
    rpc::{
        protocol_version::{queue_protocol_version, ProtocolVersion},
        receiver::RpcReceiver,
        rpc::Rpc,
        rpc_collection::{ResolvedRpcCollection, RpcCollection, RpcExecuteFn},
        sender::RpcSender,
    },
    snapshot::{
        applier::SnapshotApplier,
        deserializer::SnapshotDeserializer,
        history::{ConnectionGhostState, GhostSnapshotStore},
        receiver::SnapshotReceiver,
        serializer::SnapshotSerializer,
    },
    types::ConnectionId,
    world::{
        component::{component_kinds::ComponentKinds, ghost_component::GhostComponent},
        ghost::{ghost_collection::GhostCollection, ghost_type::GhostType},
    },
};

pub mod error;
pub use error::ProtocolError;

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

// Protocol
pub struct Protocol {
    pub rpcs: RpcCollection,
    pub component_kinds: ComponentKinds,
    pub ghost_types: Vec<GhostType>,
    /// Packet capacities, history depth and worker count of every connection
    pub connection: ConnectionConfig,
    /// Prefix code used for every packed value on the wire
    pub compression_model: CompressionModel,
    /// Application defined version, peers with different game versions are disconnected
    pub game_version: i32,
    locked: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            rpcs: RpcCollection::new(),
            component_kinds: ComponentKinds::new(),
            ghost_types: Vec::new(),
            connection: ConnectionConfig::default(),
            compression_model: CompressionModel::default(),
            game_version: 0,
            locked: false,
        }
    }
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    pub fn connection_config(&mut self, config: ConnectionConfig) -> &mut Self {
        self.check_lock();
        self.connection = config;
        self
    }

    pub fn compression_model(&mut self, model: CompressionModel) -> &mut Self {
        self.check_lock();
        self.compression_model = model;
        self
    }

    pub fn game_version(&mut self, version: i32) -> &mut Self {
        self.check_lock();
        self.game_version = version;
        self
    }

    pub fn enable_dynamic_assembly_list(&mut self) -> &mut Self {
        self.check_lock();
        self.rpcs.set_dynamic_assembly_list(true);
        self
    }

    /// Panics if `R` collides with another registered RPC
    pub fn add_rpc<R: Rpc>(&mut self) -> &mut Self {
        self.check_lock();
        if let Err(error) = self.rpcs.register_rpc::<R>() {
            panic!("{}", error);
        }
        self
    }

    /// Panics if `R` collides with another registered RPC
    pub fn add_rpc_with_executor<R: Rpc>(&mut self, executor: RpcExecuteFn) -> &mut Self {
        self.check_lock();
        if let Err(error) = self.rpcs.register_rpc_with_executor::<R>(executor) {
            panic!("{}", error);
        }
        self
    }

    /// Panics if `C` collides with another registered component
    pub fn add_component<C: GhostComponent>(&mut self) -> &mut Self {
        self.check_lock();
        if let Err(error) = self.component_kinds.add_component::<C>() {
            panic!("{}", error);
        }
        self
    }

    /// Panics if `E` collides with another registered component
    pub fn add_buffer<E: GhostComponent>(&mut self) -> &mut Self {
        self.check_lock();
        if let Err(error) = self.component_kinds.add_buffer::<E>() {
            panic!("{}", error);
        }
        self
    }

    /// Registers the ghost type's components and buffers along with it.
    /// Panics if one of them collides with a registered component.
    pub fn add_ghost_type(&mut self, ghost_type: GhostType) -> &mut Self {
        self.check_lock();
        if let Err(error) = ghost_type.register_kinds(&mut self.component_kinds) {
            panic!("{}", error);
        }
        self.ghost_types.push(ghost_type);
        self
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(
        &mut self,
        plugin: P,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_connection_config(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.connection = config;
        Ok(self)
    }

    pub fn try_compression_model(
        &mut self,
        model: CompressionModel,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.compression_model = model;
        Ok(self)
    }

    pub fn try_game_version(&mut self, version: i32) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.game_version = version;
        Ok(self)
    }

    pub fn try_enable_dynamic_assembly_list(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.rpcs.set_dynamic_assembly_list(true);
        Ok(self)
    }

    pub fn try_add_rpc<R: Rpc>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.rpcs.register_rpc::<R>()?;
        Ok(self)
    }

    pub fn try_add_rpc_with_executor<R: Rpc>(
        &mut self,
        executor: RpcExecuteFn,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.rpcs.register_rpc_with_executor::<R>(executor)?;
        Ok(self)
    }

    pub fn try_add_component<C: GhostComponent>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.component_kinds.add_component::<C>()?;
        Ok(self)
    }

    pub fn try_add_buffer<E: GhostComponent>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.component_kinds.add_buffer::<E>()?;
        Ok(self)
    }

    pub fn try_add_ghost_type(&mut self, ghost_type: GhostType) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        ghost_type.register_kinds(&mut self.component_kinds)?;
        self.ghost_types.push(ghost_type);
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Checks if protocol is locked without panicking
    /// Returns Err if protocol is locked
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if protocol is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Finalize the RPC collection and lay out every ghost type. The result
    /// is immutable and shared by all connections.
    pub fn resolve(mut self) -> Result<ResolvedProtocol, ProtocolError> {
        self.locked = true;
        let rpcs = self.rpcs.resolve()?;
        let ghosts = GhostCollection::new(self.component_kinds, &self.ghost_types)?;

        let version = if rpcs.uses_dynamic_assembly_list() {
            ProtocolVersion::dynamic(NETCODE_VERSION, self.game_version)
        } else {
            ProtocolVersion::new(
                NETCODE_VERSION,
                self.game_version,
                rpcs.version_hash(),
                ghosts.version_hash(),
            )
        };

        Ok(ResolvedProtocol {
            rpcs,
            ghosts,
            connection: self.connection,
            compression_model: self.compression_model,
            version,
        })
    }
}

/// Read-only tables produced by `Protocol::resolve`, and the entry points
/// of the snapshot and RPC engines built on them
pub struct ResolvedProtocol {
    rpcs: ResolvedRpcCollection,
    ghosts: GhostCollection,
    connection: ConnectionConfig,
    compression_model: CompressionModel,
    version: ProtocolVersion,
}

impl ResolvedProtocol {
    pub fn rpcs(&self) -> &ResolvedRpcCollection {
        &self.rpcs
    }

    pub fn ghosts(&self) -> &GhostCollection {
        &self.ghosts
    }

    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn compression_model(&self) -> &CompressionModel {
        &self.compression_model
    }

    pub fn version(&self) -> &ProtocolVersion {
        &self.version
    }

    /// Create a connection with the protocol version handshake already queued
    pub fn new_connection(&self, id: ConnectionId) -> Connection {
        let mut connection = Connection::new(id, &self.connection);
        queue_protocol_version(&mut connection, &self.rpcs, &self.version);
        connection
    }

    /// Server side snapshot state of a connection
    pub fn new_ghost_state(&self, id: ConnectionId) -> ConnectionGhostState {
        ConnectionGhostState::new(id, &self.connection)
    }

    /// Client side snapshot history
    pub fn new_snapshot_store(&self) -> GhostSnapshotStore {
        GhostSnapshotStore::new(self.connection.snapshot_history_size)
    }

    pub fn rpc_receiver(&self) -> RpcReceiver<'_> {
        RpcReceiver::new(&self.rpcs, &self.ghosts, self.version)
    }

    pub fn rpc_sender(&self) -> RpcSender<'_> {
        RpcSender::new(&self.rpcs)
    }

    pub fn snapshot_serializer(&self) -> SnapshotSerializer<'_> {
        SnapshotSerializer::new(&self.ghosts, &self.compression_model, &self.connection)
    }

    pub fn snapshot_deserializer(&self) -> SnapshotDeserializer<'_> {
        SnapshotDeserializer::new(&self.ghosts, &self.compression_model, &self.connection)
    }

    pub fn snapshot_receiver(&self) -> SnapshotReceiver<'_> {
        SnapshotReceiver::new(self.snapshot_deserializer())
    }

    pub fn snapshot_applier(&self) -> SnapshotApplier<'_> {
        SnapshotApplier::new(&self.ghosts)
    }
}
