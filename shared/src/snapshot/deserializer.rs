use log::trace;
use netcode_serde::{BitReader, CompressionModel, Serde};

use crate::{
    connection::{connection_config::ConnectionConfig, message_type::MessageType},
    constants::SNAPSHOT_TICK_OFFSET,
    snapshot::{
        codec::{read_buffer_slot, write_buffer_slot, write_u32},
        error::SnapshotError,
        history::{Baselines, GhostSnapshotStore, MAX_BASELINES},
        layout::{check_dynamic_capacity, DynamicBlock},
        serializer::{
            element_or_zero, predict_baseline, prepare_zero_baseline, read_mask_bits,
            SnapshotScratch,
        },
    },
    tick::NetworkTick,
    types::GhostId,
    world::{
        component::{
            buffer_serializer::BufferSerializer,
            change_mask::ChangeMask,
            component_kinds::{
                GhostSerializer, BUFFER_CONTENTS_CHANGED, BUFFER_LENGTH_CHANGED, BUFFER_MASK_BITS,
            },
        },
        ghost::ghost_collection::{GhostCollection, GhostSlotLayout},
    },
};

/// Ghosts read from one snapshot packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedSnapshot {
    pub tick: NetworkTick,
    pub ghosts: Vec<GhostId>,
}

/// Reads snapshot packets back into a `GhostSnapshotStore`, rebuilding each
/// ghost's record from the baselines the sender names
pub struct SnapshotDeserializer<'p> {
    ghosts: &'p GhostCollection,
    model: &'p CompressionModel,
    config: &'p ConnectionConfig,
}

impl<'p> SnapshotDeserializer<'p> {
    pub fn new(
        ghosts: &'p GhostCollection,
        model: &'p CompressionModel,
        config: &'p ConnectionConfig,
    ) -> Self {
        Self {
            ghosts,
            model,
            config,
        }
    }

    /// Read a whole snapshot packet, storing every ghost it carries
    pub fn read_packet(
        &self,
        packet: &[u8],
        store: &mut GhostSnapshotStore,
    ) -> Result<ReceivedSnapshot, SnapshotError> {
        let mut reader = BitReader::new(packet);
        if MessageType::de(&mut reader)? != MessageType::Snapshot {
            return Err(SnapshotError::NotASnapshot);
        }
        let tick = NetworkTick::new(u32::de(&mut reader)?);

        let mut scratch = SnapshotScratch::default();
        let mut ghosts = Vec::new();
        while reader.read_bit()? {
            ghosts.push(self.read_entity(tick, &mut reader, store, &mut scratch)?);
        }
        trace!("Read snapshot {} with {} ghosts", tick, ghosts.len());
        Ok(ReceivedSnapshot { tick, ghosts })
    }

    fn read_entity(
        &self,
        tick: NetworkTick,
        reader: &mut BitReader,
        store: &mut GhostSnapshotStore,
        scratch: &mut SnapshotScratch,
    ) -> Result<GhostId, SnapshotError> {
        let ghost_id = reader.read_packed_uint(self.model)?;
        let distance0 = reader.read_packed_uint(self.model)?;

        let mut baseline_ticks = [None; MAX_BASELINES];
        let ghost_type = if distance0 == 0 {
            reader.read_packed_uint(self.model)? as usize
        } else {
            baseline_ticks[0] = Some(tick.rewind(distance0));
            for baseline in baseline_ticks.iter_mut().skip(1) {
                let distance = reader.read_packed_uint(self.model)?;
                if distance != 0 {
                    *baseline = Some(tick.rewind(distance));
                }
            }
            store
                .ghost_type(ghost_id)
                .ok_or(SnapshotError::UnknownGhost { ghost_id })?
        };

        let layout = self
            .ghosts
            .ghost_type(ghost_type)
            .ok_or(SnapshotError::InvalidGhostType {
                index: ghost_type,
                count: self.ghosts.ghost_type_count(),
            })?;

        let history = store.history_of_type(ghost_id, ghost_type);
        let mut entries = [None; MAX_BASELINES];
        for (entry, baseline_tick) in entries.iter_mut().zip(baseline_ticks) {
            if let Some(baseline_tick) = baseline_tick {
                let baseline = history
                    .and_then(|history| history.get(baseline_tick))
                    .ok_or(SnapshotError::MissingBaseline {
                        ghost_id,
                        tick: baseline_tick.get(),
                    })?;
                *entry = Some(baseline);
            }
        }
        let baselines = Baselines::new(entries);

        let SnapshotScratch {
            record,
            dynamic,
            predicted,
            zero,
        } = scratch;
        prepare_zero_baseline(self.ghosts, layout, zero)?;

        let baseline0 = baselines.get(0);
        let base_record: &[u8] =
            baseline0.map_or(&zero[..layout.stride], |entry| entry.record.as_slice());
        let base_dynamic: &[u8] = baseline0.map_or(&[][..], |entry| entry.dynamic.as_slice());

        let mut mask = ChangeMask::new(layout.mask_bits);
        read_mask_bits(reader, &mut mask, 0, layout.mask_bits)?;

        // unchanged fields keep baseline0's value
        record.clear();
        record.extend_from_slice(base_record);
        write_u32(record, SNAPSHOT_TICK_OFFSET, tick.get());
        record[layout.mask_range()].copy_from_slice(mask.as_bytes());
        dynamic.clear();

        let delta_base: &[u8] =
            if predict_baseline(self.ghosts, layout, tick, &baselines, predicted)? {
                &predicted[..]
            } else {
                base_record
            };

        for slot in &layout.slots {
            match self.ghosts.serializer(slot)? {
                GhostSerializer::Component(serializer) => serializer.deserialize(
                    &mut record[slot.range()],
                    &delta_base[slot.range()],
                    &mask,
                    slot.mask_start_bit,
                    reader,
                    self.model,
                )?,
                GhostSerializer::Buffer(serializer) => self.read_buffer(
                    &**serializer,
                    slot,
                    mask.bits(slot.mask_start_bit, BUFFER_MASK_BITS),
                    &mut record[..],
                    dynamic,
                    base_record,
                    base_dynamic,
                    &zero[..],
                    reader,
                )?,
            }
        }

        store.store(ghost_id, ghost_type, tick, record, dynamic);
        Ok(ghost_id)
    }

    /// Mirror of the serializer's buffer payload. Elements start from the
    /// matching baseline0 element, or zeros past its end.
    #[allow(clippy::too_many_arguments)]
    fn read_buffer(
        &self,
        serializer: &dyn BufferSerializer,
        slot: &GhostSlotLayout,
        code: u32,
        record: &mut [u8],
        dynamic: &mut Vec<u8>,
        base_record: &[u8],
        base_dynamic: &[u8],
        zero: &[u8],
        reader: &mut BitReader,
    ) -> Result<(), SnapshotError> {
        let element_bits = serializer.change_mask_bits();
        let element_size = serializer.snapshot_size();
        let (base_len, base_offset) = read_buffer_slot(base_record, slot.snapshot_offset);
        let base_block = DynamicBlock::new(base_offset, element_bits, element_size, base_len);

        let length_changed = code & BUFFER_LENGTH_CHANGED != 0;
        let len = if length_changed {
            let len = reader.read_packed_uint(self.model)? as usize;
            // buffer elements always have fields, each takes at least one bit
            if len > reader.bits_remaining() as usize {
                return Err(SnapshotError::Malformed);
            }
            len
        } else {
            base_len
        };

        let block = DynamicBlock::new(dynamic.len(), element_bits, element_size, len);
        check_dynamic_capacity(&block, self.config.dynamic_data_capacity)?;
        dynamic.resize(block.end(), 0);

        let mut element_masks = ChangeMask::new(element_bits * len as u32);
        for element in 0..len {
            let start_bit = element as u32 * element_bits;
            if length_changed {
                for bit in 0..element_bits {
                    element_masks.set_bit(start_bit + bit, true);
                }
            } else if code & BUFFER_CONTENTS_CHANGED != 0 {
                read_mask_bits(reader, &mut element_masks, start_bit, element_bits)?;
            }

            let base = element_or_zero(base_dynamic, &base_block, element, zero);
            let range = block.element_range(element);
            dynamic[range.clone()].copy_from_slice(base);
            serializer.deserialize(
                &mut dynamic[range],
                base,
                &element_masks,
                start_bit,
                reader,
                self.model,
            )?;
        }

        dynamic[block.mask_range()].copy_from_slice(element_masks.as_bytes());
        write_buffer_slot(record, slot.snapshot_offset, len, block.offset);
        Ok(())
    }
}
