//! # Netcode Shared
//! Snapshot delta replication and reliable RPC dispatch shared by netcode
//! servers and clients.
//!
//! A [`Protocol`] collects RPC types, ghost components and ghost types, and
//! resolves into a [`ResolvedProtocol`]: the immutable tables every
//! connection's snapshot and RPC work runs against.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use netcode_serde::{
    BitReader, BitWrite, BitWriter, CompressionModel, CompressionModelError, ConstBitLength,
    Serde, SerdeErr, StreamWriter, MTU_SIZE_BITS, MTU_SIZE_BYTES,
};

mod connection;
mod constants;
mod error;
mod hash;
mod protocol;
mod rpc;
mod snapshot;
mod tick;
mod transport;
mod types;
mod world;

pub use connection::{
    connection::{Connection, ConnectionState, DisconnectEvent, DisconnectReason},
    connection_config::ConnectionConfig,
    error::ConnectionError,
    message_type::MessageType,
    packet_header::RpcPacketHeader,
};
pub use constants::{
    FIELD_SIZE_BYTES, MAX_RPC_TYPES, NETCODE_VERSION, PROTOCOL_VERSION_RPC_HASH,
    PROTOCOL_VERSION_RPC_INDEX, RPC_PACKET_HEADER_BYTES, SNAPSHOT_MASK_OFFSET,
    SNAPSHOT_TICK_OFFSET,
};
pub use error::NetcodeError;
pub use hash::{collection_hash, combine_fnv1a64, fnv1a64, type_hash};
pub use protocol::{Protocol, ProtocolError, ProtocolPlugin, ResolvedProtocol};
pub use rpc::{
    error::RpcError,
    protocol_version::{queue_protocol_version, ProtocolVersion, PROTOCOL_VERSION_BYTES},
    queue::RpcQueue,
    received::ReceivedRpcs,
    receiver::RpcReceiver,
    rpc::Rpc,
    rpc_collection::{
        default_executor, ResolvedRpcCollection, RpcCollection, RpcCollectionState,
        RpcExecuteFn, RpcExecutorParameters,
    },
    sender::RpcSender,
};
pub use snapshot::{
    ack::{read_snapshot_ack, send_snapshot_ack, SNAPSHOT_ACK_BYTES},
    applier::{InterpolationTarget, SnapshotApplier},
    codec::{
        read_buffer_slot, read_i32, read_u32, read_word, write_buffer_slot, write_i32, write_u32,
        write_word,
    },
    deserializer::{ReceivedSnapshot, SnapshotDeserializer},
    error::SnapshotError,
    history::{
        Baselines, ConnectionGhostState, GhostHistory, GhostSnapshotStore, SnapshotEntry,
        SnapshotHistory, MAX_BASELINES,
    },
    layout::{
        align_to_word, buffer_block_size, change_mask_words, check_dynamic_capacity,
        mask_size_in_bytes, DynamicBlock, WORD_BITS, WORD_SIZE,
    },
    prediction_backup::PredictionBackup,
    predictor::GhostDeltaPredictor,
    receiver::SnapshotReceiver,
    serializer::{
        EntitySpan, SnapshotJob, SnapshotPacket, SnapshotSerializer, SnapshotWriteOutcome,
        SNAPSHOT_HEADER_BITS,
    },
};
pub use tick::NetworkTick;
pub use transport::{
    channel::{Pipeline, SendBuffer, TransportChannel},
    error::TransportError,
};
pub use types::{ConnectionId, GhostId, GhostTypeIndex};
pub use world::{
    chunk::{ChunkData, GhostChunk, GhostChunkMut},
    component::{
        buffer_serializer::{BufferSerializer, TypedBufferSerializer},
        change_mask::ChangeMask,
        component_kinds::{
            ComponentEntry, ComponentKinds, GhostSerializer, BUFFER_CONTENTS_CHANGED,
            BUFFER_FULLY_CHANGED, BUFFER_LENGTH_CHANGED, BUFFER_MASK_BITS, BUFFER_SLOT_SIZE,
        },
        component_serializer::{
            ComponentSerializer, EmptyComponentSerializer, PredictionError,
            SnapshotInterpolationBytes, TypedComponentSerializer,
        },
        error::GhostError,
        field_serializer::GhostFieldSerializer,
        ghost_component::{ComponentKind, GhostComponent},
        ghost_field::{GhostField, GhostFieldKind, GhostSendType},
        snapshot_slot::{SnapshotInterpolation, SnapshotSlot, SnapshotSlotMut},
    },
    ghost::{
        ghost_collection::{GhostCollection, GhostSlotLayout, GhostTypeLayout},
        ghost_type::GhostType,
    },
};
