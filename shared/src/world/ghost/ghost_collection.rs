use std::ops::Range;

use log::debug;

use crate::{
    constants::SNAPSHOT_MASK_OFFSET,
    snapshot::layout::{align_to_word, change_mask_words, WORD_SIZE},
    types::GhostTypeIndex,
    world::{
        component::{
            component_kinds::{ComponentKinds, GhostSerializer},
            error::GhostError,
            ghost_component::ComponentKind,
        },
        ghost::ghost_type::GhostType,
    },
};

/// Where one component or buffer of a ghost type lives in its snapshot record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostSlotLayout {
    pub kind: ComponentKind,
    /// Index of the kind's serializer in `ComponentKinds`
    pub kind_index: usize,
    pub snapshot_offset: usize,
    pub snapshot_size: usize,
    pub mask_start_bit: u32,
    pub mask_bits: u32,
    pub is_buffer: bool,
}

impl GhostSlotLayout {
    pub fn range(&self) -> Range<usize> {
        self.snapshot_offset..self.snapshot_offset + self.snapshot_size
    }
}

/// Fixed snapshot record layout of a ghost type:
/// `[tick][change mask words][slots...]`, padded to a word
#[derive(Clone, Debug)]
pub struct GhostTypeLayout {
    pub name: &'static str,
    pub slots: Vec<GhostSlotLayout>,
    pub mask_bits: u32,
    pub mask_size: usize,
    pub stride: usize,
}

impl GhostTypeLayout {
    fn new(ghost_type: &GhostType, kinds: &ComponentKinds) -> Result<Self, GhostError> {
        let mut slots = Vec::new();
        let mut mask_bits = 0;
        let mut serializers = Vec::new();
        for kind in ghost_type.kinds() {
            let kind_index = kinds.index_of(kind).ok_or(GhostError::KindNotRegistered)?;
            let entry = kinds.entry(kind_index).ok_or(GhostError::KindNotRegistered)?;
            serializers.push((*kind, kind_index, mask_bits, &entry.serializer));
            mask_bits += entry.serializer.slot_mask_bits();
        }

        let mask_size = change_mask_words(mask_bits) * WORD_SIZE;
        let mut offset = SNAPSHOT_MASK_OFFSET + mask_size;
        for (kind, kind_index, mask_start_bit, serializer) in serializers {
            let snapshot_size = serializer.slot_size();
            slots.push(GhostSlotLayout {
                kind,
                kind_index,
                snapshot_offset: offset,
                snapshot_size,
                mask_start_bit,
                mask_bits: serializer.slot_mask_bits(),
                is_buffer: serializer.is_buffer(),
            });
            offset += snapshot_size;
        }

        Ok(Self {
            name: ghost_type.name(),
            slots,
            mask_bits,
            mask_size,
            stride: align_to_word(offset),
        })
    }

    pub fn mask_range(&self) -> Range<usize> {
        SNAPSHOT_MASK_OFFSET..SNAPSHOT_MASK_OFFSET + self.mask_size
    }
}

/// Immutable registry of ghost types and their serializers, shared read-only
/// by every serialization and deserialization job
pub struct GhostCollection {
    kinds: ComponentKinds,
    ghost_types: Vec<GhostTypeLayout>,
}

impl GhostCollection {
    pub fn new(kinds: ComponentKinds, ghost_types: &[GhostType]) -> Result<Self, GhostError> {
        let mut layouts: Vec<GhostTypeLayout> = Vec::with_capacity(ghost_types.len());
        for ghost_type in ghost_types {
            if layouts.iter().any(|layout| layout.name == ghost_type.name()) {
                return Err(GhostError::DuplicateGhostType {
                    name: ghost_type.name(),
                });
            }
            let layout = GhostTypeLayout::new(ghost_type, &kinds)?;
            debug!(
                "Ghost type '{}': {} slots, {} mask bits, stride {} bytes",
                layout.name,
                layout.slots.len(),
                layout.mask_bits,
                layout.stride
            );
            layouts.push(layout);
        }
        Ok(Self {
            kinds,
            ghost_types: layouts,
        })
    }

    pub fn ghost_type(&self, index: GhostTypeIndex) -> Option<&GhostTypeLayout> {
        self.ghost_types.get(index)
    }

    pub fn ghost_type_index(&self, name: &str) -> Option<GhostTypeIndex> {
        self.ghost_types.iter().position(|layout| layout.name == name)
    }

    pub fn ghost_type_count(&self) -> usize {
        self.ghost_types.len()
    }

    pub fn serializer(&self, slot: &GhostSlotLayout) -> Result<&GhostSerializer, GhostError> {
        self.kinds
            .entry(slot.kind_index)
            .map(|entry| &entry.serializer)
            .ok_or(GhostError::KindNotRegistered)
    }

    pub fn component_kinds(&self) -> &ComponentKinds {
        &self.kinds
    }

    pub fn version_hash(&self) -> u64 {
        self.kinds.version_hash()
    }
}
