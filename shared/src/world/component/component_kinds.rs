use std::collections::HashMap;

use crate::{
    hash::{collection_hash, type_hash},
    world::component::{
        buffer_serializer::{BufferSerializer, TypedBufferSerializer},
        component_serializer::{
            ComponentSerializer, EmptyComponentSerializer, TypedComponentSerializer,
        },
        error::GhostError,
        ghost_component::{ComponentKind, GhostComponent},
        ghost_field::GhostSendType,
    },
};

/// Size of a buffer slot in a snapshot record: `(length, dynamic_offset)`
pub const BUFFER_SLOT_SIZE: usize = 8;
/// Change mask bits of a buffer slot
pub const BUFFER_MASK_BITS: u32 = 2;
/// Buffer mask bit: the element count differs from the baseline
pub const BUFFER_LENGTH_CHANGED: u32 = 1;
/// Buffer mask bit: same element count, some elements differ
pub const BUFFER_CONTENTS_CHANGED: u32 = 2;
/// Mask value of a buffer whose length changed, every element is sent in full
pub const BUFFER_FULLY_CHANGED: u32 = BUFFER_LENGTH_CHANGED | BUFFER_CONTENTS_CHANGED;

/// Serializer of a registered kind, resolved once at registration
pub enum GhostSerializer {
    Component(Box<dyn ComponentSerializer>),
    Buffer(Box<dyn BufferSerializer>),
}

impl GhostSerializer {
    pub fn name(&self) -> &'static str {
        match self {
            GhostSerializer::Component(serializer) => serializer.name(),
            GhostSerializer::Buffer(serializer) => serializer.name(),
        }
    }

    pub fn send_type(&self) -> GhostSendType {
        match self {
            GhostSerializer::Component(serializer) => serializer.send_type(),
            GhostSerializer::Buffer(serializer) => serializer.send_type(),
        }
    }

    /// Bytes the kind occupies in a snapshot record
    pub fn slot_size(&self) -> usize {
        match self {
            GhostSerializer::Component(serializer) => serializer.snapshot_size(),
            GhostSerializer::Buffer(_) => BUFFER_SLOT_SIZE,
        }
    }

    /// Change mask bits the kind occupies in a snapshot record
    pub fn slot_mask_bits(&self) -> u32 {
        match self {
            GhostSerializer::Component(serializer) => serializer.change_mask_bits(),
            GhostSerializer::Buffer(_) => BUFFER_MASK_BITS,
        }
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, GhostSerializer::Buffer(_))
    }

    fn describe(&self) -> &'static str {
        match self {
            GhostSerializer::Component(_) => "component",
            GhostSerializer::Buffer(_) => "buffer",
        }
    }
}

pub struct ComponentEntry {
    pub kind: ComponentKind,
    pub hash: u64,
    pub serializer: GhostSerializer,
}

/// A map to hold all component and buffer types
#[derive(Default)]
pub struct ComponentKinds {
    entries: Vec<ComponentEntry>,
    kind_map: HashMap<ComponentKind, usize>,
}

impl ComponentKinds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. Components without fields get the no-op serializer.
    pub fn add_component<C: GhostComponent>(&mut self) -> Result<(), GhostError> {
        let serializer: Box<dyn ComponentSerializer> = if C::FIELDS.is_empty() {
            Box::new(EmptyComponentSerializer::<C>::new())
        } else {
            Box::new(TypedComponentSerializer::<C>::new())
        };
        self.insert(ComponentKind::of::<C>(), GhostSerializer::Component(serializer))
    }

    /// Register `E` as the element type of a replicated buffer. Elements
    /// need at least one field.
    pub fn add_buffer<E: GhostComponent>(&mut self) -> Result<(), GhostError> {
        if E::FIELDS.is_empty() {
            return Err(GhostError::EmptyBufferElement { name: E::NAME });
        }
        self.insert(
            ComponentKind::of::<E>(),
            GhostSerializer::Buffer(Box::new(TypedBufferSerializer::<E>::new())),
        )
    }

    fn insert(&mut self, kind: ComponentKind, serializer: GhostSerializer) -> Result<(), GhostError> {
        if let Some(index) = self.kind_map.get(&kind) {
            let existing = &self.entries[*index].serializer;
            if existing.is_buffer() != serializer.is_buffer() {
                return Err(GhostError::KindConflict {
                    name: serializer.name(),
                    registered_as: existing.describe(),
                    requested_as: serializer.describe(),
                });
            }
            return Ok(());
        }

        let hash = type_hash(serializer.name());
        if let Some(existing) = self.entries.iter().find(|entry| entry.hash == hash) {
            return Err(GhostError::HashCollision {
                hash,
                existing: existing.serializer.name(),
                new: serializer.name(),
            });
        }

        self.kind_map.insert(kind, self.entries.len());
        self.entries.push(ComponentEntry {
            kind,
            hash,
            serializer,
        });
        Ok(())
    }

    pub fn index_of(&self, kind: &ComponentKind) -> Option<usize> {
        self.kind_map.get(kind).copied()
    }

    pub fn entry(&self, index: usize) -> Option<&ComponentEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order independent hash of every registered kind
    pub fn version_hash(&self) -> u64 {
        let mut hashes: Vec<u64> = self.entries.iter().map(|entry| entry.hash).collect();
        collection_hash(&mut hashes)
    }

    /// Name and hash of every registered kind, for diagnostics
    pub fn hashes(&self) -> Vec<(&'static str, u64)> {
        self.entries
            .iter()
            .map(|entry| (entry.serializer.name(), entry.hash))
            .collect()
    }
}
