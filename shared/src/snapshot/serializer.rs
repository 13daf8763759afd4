use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use log::{debug, trace, warn};
use netcode_serde::{BitReader, BitWrite, BitWriter, CompressionModel, Serde, SerdeErr};

use crate::{
    connection::{connection_config::ConnectionConfig, message_type::MessageType},
    constants::SNAPSHOT_TICK_OFFSET,
    snapshot::{
        codec::{read_buffer_slot, write_buffer_slot, write_u32},
        error::SnapshotError,
        history::{Baselines, ConnectionGhostState},
        layout::{check_dynamic_capacity, DynamicBlock},
        predictor::GhostDeltaPredictor,
    },
    tick::NetworkTick,
    transport::{
        channel::{Pipeline, TransportChannel},
        error::TransportError,
    },
    types::{ConnectionId, GhostId, GhostTypeIndex},
    world::{
        chunk::GhostChunk,
        component::{
            buffer_serializer::BufferSerializer,
            change_mask::ChangeMask,
            component_kinds::{
                GhostSerializer, BUFFER_CONTENTS_CHANGED, BUFFER_FULLY_CHANGED, BUFFER_MASK_BITS,
            },
            error::GhostError,
        },
        ghost::ghost_collection::{GhostCollection, GhostSlotLayout, GhostTypeLayout},
    },
};

/// Bits taken by the snapshot packet header: message type and tick
pub const SNAPSHOT_HEADER_BITS: u32 = 8 + 32;

/// Where one entity landed in a snapshot packet
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntitySpan {
    pub ghost_id: GhostId,
    pub start_bit: u32,
    pub bit_length: u32,
}

/// Entities written to one snapshot packet. `complete` is false when the
/// packet filled up and some entities were left for the next tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotWriteOutcome {
    pub spans: Vec<EntitySpan>,
    pub complete: bool,
}

/// A finished snapshot packet of one connection
#[derive(Clone, Debug)]
pub struct SnapshotPacket {
    pub connection: ConnectionId,
    pub tick: NetworkTick,
    pub bytes: Vec<u8>,
    pub outcome: SnapshotWriteOutcome,
}

/// One connection's share of a parallel snapshot pass
pub struct SnapshotJob<'j> {
    pub ghost_state: &'j mut ConnectionGhostState,
    /// Set when the connection is torn down, checked between chunks
    pub cancelled: Option<&'j AtomicBool>,
}

impl<'j> SnapshotJob<'j> {
    pub fn new(ghost_state: &'j mut ConnectionGhostState) -> Self {
        Self {
            ghost_state,
            cancelled: None,
        }
    }

    pub fn with_cancel_flag(mut self, cancelled: &'j AtomicBool) -> Self {
        self.cancelled = Some(cancelled);
        self
    }
}

// Buffers reused from one entity to the next
#[derive(Default)]
pub(crate) struct SnapshotScratch {
    pub(crate) record: Vec<u8>,
    pub(crate) dynamic: Vec<u8>,
    pub(crate) predicted: Vec<u8>,
    pub(crate) zero: Vec<u8>,
}

/// Write `count` bits of `mask` starting at `start`, raw
pub(crate) fn write_mask_bits(writer: &mut dyn BitWrite, mask: &ChangeMask, start: u32, count: u32) {
    let mut written = 0;
    while written < count {
        let bits = (count - written).min(32);
        writer.write_bits(mask.bits(start + written, bits), bits);
        written += bits;
    }
}

pub(crate) fn read_mask_bits(
    reader: &mut BitReader,
    mask: &mut ChangeMask,
    start: u32,
    count: u32,
) -> Result<(), SerdeErr> {
    let mut read = 0;
    while read < count {
        let bits = (count - read).min(32);
        mask.set_bits(start + read, bits, reader.read_bits(bits)?);
        read += bits;
    }
    Ok(())
}

/// Size `zero` so it can stand in for a missing baseline record or buffer element
pub(crate) fn prepare_zero_baseline(
    ghosts: &GhostCollection,
    layout: &GhostTypeLayout,
    zero: &mut Vec<u8>,
) -> Result<(), SnapshotError> {
    let mut size = layout.stride;
    for slot in layout.slots.iter().filter(|slot| slot.is_buffer) {
        if let GhostSerializer::Buffer(serializer) = ghosts.serializer(slot)? {
            size = size.max(serializer.snapshot_size());
        }
    }
    if zero.len() < size {
        zero.resize(size, 0);
    }
    Ok(())
}

/// Fill `predicted` with baseline0 extrapolated through baseline1 and
/// baseline2. Returns false, leaving `predicted` untouched, when fewer than
/// three baselines exist.
pub(crate) fn predict_baseline(
    ghosts: &GhostCollection,
    layout: &GhostTypeLayout,
    tick: NetworkTick,
    baselines: &Baselines,
    predicted: &mut Vec<u8>,
) -> Result<bool, SnapshotError> {
    let (baseline0, baseline1, baseline2) =
        match (baselines.get(0), baselines.get(1), baselines.get(2)) {
            (Some(baseline0), Some(baseline1), Some(baseline2)) => {
                (baseline0, baseline1, baseline2)
            }
            _ => return Ok(false),
        };

    predicted.clear();
    predicted.extend_from_slice(&baseline0.record);
    let predictor =
        GhostDeltaPredictor::new(tick, baseline0.tick, baseline1.tick, baseline2.tick);
    for slot in &layout.slots {
        if let GhostSerializer::Component(serializer) = ghosts.serializer(slot)? {
            serializer.predict_delta(
                &mut predicted[slot.range()],
                &baseline1.record[slot.range()],
                &baseline2.record[slot.range()],
                &predictor,
            );
        }
    }
    Ok(true)
}

/// Bytes of element `element` of `block`, or zeros past its end
pub(crate) fn element_or_zero<'a>(
    dynamic: &'a [u8],
    block: &DynamicBlock,
    element: usize,
    zero: &'a [u8],
) -> &'a [u8] {
    if element < block.len {
        &dynamic[block.element_range(element)]
    } else {
        &zero[..block.element_size]
    }
}

fn baseline_distance(tick: NetworkTick, baseline: NetworkTick) -> u32 {
    tick.ticks_since(baseline) as u32
}

/// Writes ghost snapshots of the chunks replicated to a connection,
/// delta compressed against that connection's acknowledged history
pub struct SnapshotSerializer<'p> {
    ghosts: &'p GhostCollection,
    model: &'p CompressionModel,
    config: &'p ConnectionConfig,
}

impl<'p> SnapshotSerializer<'p> {
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

    /// Build one snapshot packet per job, running at most
    /// `ConnectionConfig::snapshot_workers` connections at a time. Results
    /// are in job order.
    pub fn serialize_connections(
        &self,
        tick: NetworkTick,
        chunks: &[&dyn GhostChunk],
        jobs: Vec<SnapshotJob<'_>>,
    ) -> Vec<Result<SnapshotPacket, SnapshotError>> {
        let workers = self.config.snapshot_workers.max(1);
        let mut results = Vec::with_capacity(jobs.len());
        let mut jobs = jobs.into_iter().peekable();

        while jobs.peek().is_some() {
            let batch: Vec<SnapshotJob> = jobs.by_ref().take(workers).collect();
            thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .into_iter()
                    .map(|job| scope.spawn(move || self.write_packet(tick, chunks, job)))
                    .collect();
                for handle in handles {
                    results.push(
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(SnapshotError::WorkerPanicked)),
                    );
                }
            });
        }
        results
    }

    fn write_packet(
        &self,
        tick: NetworkTick,
        chunks: &[&dyn GhostChunk],
        job: SnapshotJob<'_>,
    ) -> Result<SnapshotPacket, SnapshotError> {
        let mut writer = BitWriter::with_capacity(self.config.snapshot_packet_capacity);
        let outcome = self.write_snapshot(tick, job.ghost_state, chunks, &mut writer, job.cancelled)?;
        Ok(SnapshotPacket {
            connection: job.ghost_state.connection(),
            tick,
            bytes: writer.into_bytes(),
            outcome,
        })
    }

    /// Hand a packet built by `serialize_connections` to the transport
    pub fn send_packet(
        &self,
        transport: &mut dyn TransportChannel,
        packet: &SnapshotPacket,
    ) -> Result<usize, SnapshotError> {
        let mut buffer = transport.begin_send(Pipeline::Unreliable, packet.connection)?;
        if !buffer.writer.write_bytes(&packet.bytes) {
            return Err(TransportError::PayloadTooLarge {
                size: packet.bytes.len(),
                capacity: buffer.writer.capacity(),
            }
            .into());
        }
        Ok(transport.end_send(buffer)?)
    }

    /// Write and send the snapshot of `tick` for a single connection
    pub fn send_snapshot(
        &self,
        transport: &mut dyn TransportChannel,
        tick: NetworkTick,
        ghost_state: &mut ConnectionGhostState,
        chunks: &[&dyn GhostChunk],
    ) -> Result<SnapshotWriteOutcome, SnapshotError> {
        let mut buffer = transport.begin_send(Pipeline::Unreliable, ghost_state.connection())?;
        let outcome = self.write_snapshot(tick, ghost_state, chunks, &mut buffer.writer, None)?;
        let sent = transport.end_send(buffer)?;
        trace!(
            "Sent snapshot {} to {:?}: {} entities, {} bytes",
            tick,
            ghost_state.connection(),
            outcome.spans.len(),
            sent
        );
        Ok(outcome)
    }

    /// Write a full snapshot packet into `writer`:
    /// `[message type][tick][entities...][0 bit]`.
    ///
    /// Entities that do not fit are rolled back and left for the next tick;
    /// their snapshots are not stored, so they are never used as baselines.
    pub fn write_snapshot(
        &self,
        tick: NetworkTick,
        ghost_state: &mut ConnectionGhostState,
        chunks: &[&dyn GhostChunk],
        writer: &mut BitWriter,
        cancelled: Option<&AtomicBool>,
    ) -> Result<SnapshotWriteOutcome, SnapshotError> {
        MessageType::Snapshot.ser(writer);
        tick.get().ser(writer);
        if writer.has_failed_writes() || writer.bits_free() < 1 {
            return Err(TransportError::PayloadTooLarge {
                size: (SNAPSHOT_HEADER_BITS as usize + 1 + 7) / 8,
                capacity: writer.capacity(),
            }
            .into());
        }

        let mut scratch = SnapshotScratch::default();
        let mut outcome = SnapshotWriteOutcome {
            spans: Vec::new(),
            complete: true,
        };

        for chunk in chunks {
            if cancelled.map_or(false, |flag| flag.load(Ordering::Acquire)) {
                debug!(
                    "Abandoning snapshot {} for disconnected connection {:?}",
                    tick,
                    ghost_state.connection()
                );
                return Err(SnapshotError::Cancelled {
                    connection: ghost_state.connection(),
                });
            }

            let ghost_type = chunk.ghost_type();
            let layout = self
                .ghosts
                .ghost_type(ghost_type)
                .ok_or(SnapshotError::InvalidGhostType {
                    index: ghost_type,
                    count: self.ghosts.ghost_type_count(),
                })?;

            for index in 0..chunk.len() {
                let written = self.serialize_entity(
                    tick,
                    *chunk,
                    index,
                    ghost_type,
                    layout,
                    ghost_state,
                    writer,
                    &mut scratch,
                )?;
                match written {
                    Some(span) => outcome.spans.push(span),
                    None => {
                        outcome.complete = false;
                        break;
                    }
                }
            }
        }

        // the terminator bit is reserved by every entity's overflow check
        writer.write_bit(false);
        if !outcome.complete {
            warn!(
                "Snapshot {} for {:?} is full after {} entities, the rest is sent next tick",
                tick,
                ghost_state.connection(),
                outcome.spans.len()
            );
        }
        Ok(outcome)
    }

    /// Serialize one entity. Returns `None` after rolling the writer back
    /// when the entity does not fit in the packet.
    #[allow(clippy::too_many_arguments)]
    fn serialize_entity(
        &self,
        tick: NetworkTick,
        chunk: &dyn GhostChunk,
        index: usize,
        ghost_type: GhostTypeIndex,
        layout: &GhostTypeLayout,
        ghost_state: &mut ConnectionGhostState,
        writer: &mut BitWriter,
        scratch: &mut SnapshotScratch,
    ) -> Result<Option<EntitySpan>, SnapshotError> {
        let ghost_id = chunk.ghost_id(index).ok_or(GhostError::EntityOutOfRange {
            component: layout.name,
            index,
            length: chunk.len(),
        })?;
        let connection = ghost_state.connection();
        let SnapshotScratch {
            record,
            dynamic,
            predicted,
            zero,
        } = scratch;

        prepare_zero_baseline(self.ghosts, layout, zero)?;
        self.copy_entity(tick, chunk, index, layout, connection, record, dynamic)?;

        let baselines = ghost_state
            .store()
            .history_of_type(ghost_id, ghost_type)
            .map(|history| history.baselines(tick))
            .unwrap_or_default();
        let baseline0 = baselines.get(0);
        let base_record: &[u8] =
            baseline0.map_or(&zero[..layout.stride], |entry| entry.record.as_slice());
        let base_dynamic: &[u8] = baseline0.map_or(&[][..], |entry| entry.dynamic.as_slice());

        // change mask, always against baseline0
        let mut mask = ChangeMask::new(layout.mask_bits);
        for slot in &layout.slots {
            match self.ghosts.serializer(slot)? {
                GhostSerializer::Component(serializer) => serializer.calculate_change_mask(
                    &record[slot.range()],
                    &base_record[slot.range()],
                    &mut mask,
                    slot.mask_start_bit,
                ),
                GhostSerializer::Buffer(serializer) => {
                    let code = buffer_change_mask(
                        &**serializer,
                        slot,
                        &record[..],
                        &mut dynamic[..],
                        base_record,
                        base_dynamic,
                    );
                    mask.set_bits(slot.mask_start_bit, BUFFER_MASK_BITS, code);
                }
            }
        }
        record[layout.mask_range()].copy_from_slice(mask.as_bytes());

        let delta_base: &[u8] =
            if predict_baseline(self.ghosts, layout, tick, &baselines, predicted)? {
                &predicted[..]
            } else {
                base_record
            };

        let start_bit = writer.length_in_bits();
        writer.write_bit(true);
        writer.write_packed_uint(ghost_id, self.model);
        match baseline0 {
            None => {
                writer.write_packed_uint(0, self.model);
                writer.write_packed_uint(ghost_type as u32, self.model);
            }
            Some(baseline0) => {
                for baseline in [Some(baseline0), baselines.get(1), baselines.get(2)] {
                    let distance = baseline.map_or(0, |entry| baseline_distance(tick, entry.tick));
                    writer.write_packed_uint(distance, self.model);
                }
            }
        }
        write_mask_bits(writer, &mask, 0, layout.mask_bits);

        for slot in &layout.slots {
            match self.ghosts.serializer(slot)? {
                GhostSerializer::Component(serializer) => {
                    serializer.serialize(
                        &record[slot.range()],
                        &delta_base[slot.range()],
                        &mask,
                        slot.mask_start_bit,
                        writer,
                        self.model,
                    );
                }
                GhostSerializer::Buffer(serializer) => write_buffer(
                    &**serializer,
                    slot,
                    mask.bits(slot.mask_start_bit, BUFFER_MASK_BITS),
                    &record[..],
                    &dynamic[..],
                    base_record,
                    base_dynamic,
                    &zero[..],
                    writer,
                    self.model,
                ),
            }
        }

        if writer.has_failed_writes() || writer.bits_free() < 1 {
            writer.truncate(start_bit);
            return Ok(None);
        }

        let span = EntitySpan {
            ghost_id,
            start_bit,
            bit_length: writer.length_in_bits() - start_bit,
        };
        ghost_state
            .store_mut()
            .store(ghost_id, ghost_type, tick, record, dynamic);
        Ok(Some(span))
    }

    /// Copy an entity's live values into `record` and `dynamic`. Slots not
    /// sent to `connection` stay zeroed but keep their place in the layout.
    #[allow(clippy::too_many_arguments)]
    fn copy_entity(
        &self,
        tick: NetworkTick,
        chunk: &dyn GhostChunk,
        index: usize,
        layout: &GhostTypeLayout,
        connection: ConnectionId,
        record: &mut Vec<u8>,
        dynamic: &mut Vec<u8>,
    ) -> Result<(), SnapshotError> {
        record.clear();
        record.resize(layout.stride, 0);
        write_u32(record, SNAPSHOT_TICK_OFFSET, tick.get());
        dynamic.clear();

        let owner = chunk.owner();
        for slot in &layout.slots {
            let serializer = self.ghosts.serializer(slot)?;
            let sent = serializer.send_type().is_sent_to(owner, connection);
            if !slot.is_buffer && slot.snapshot_size == 0 {
                continue;
            }
            if !sent {
                if slot.is_buffer {
                    write_buffer_slot(record, slot.snapshot_offset, 0, dynamic.len());
                }
                continue;
            }

            let column = chunk.column(&slot.kind).ok_or(GhostError::MissingColumn {
                component: serializer.name(),
            })?;
            match serializer {
                GhostSerializer::Component(serializer) => {
                    serializer.copy_to_snapshot(column, index, &mut record[slot.range()])?
                }
                GhostSerializer::Buffer(serializer) => {
                    let len = serializer.buffer_len(column, index)?;
                    let block = DynamicBlock::new(
                        dynamic.len(),
                        serializer.change_mask_bits(),
                        serializer.snapshot_size(),
                        len,
                    );
                    check_dynamic_capacity(&block, self.config.dynamic_data_capacity)?;
                    dynamic.resize(block.end(), 0);
                    serializer.copy_buffer_to_snapshot(
                        column,
                        index,
                        &mut dynamic[block.elements_range()],
                    )?;
                    write_buffer_slot(record, slot.snapshot_offset, len, block.offset);
                }
            }
        }
        Ok(())
    }
}

/// Compute a buffer's 2-bit mask value and store its per-element masks in
/// the dynamic region. A length change marks every element as changed.
fn buffer_change_mask(
    serializer: &dyn BufferSerializer,
    slot: &GhostSlotLayout,
    record: &[u8],
    dynamic: &mut [u8],
    base_record: &[u8],
    base_dynamic: &[u8],
) -> u32 {
    let element_bits = serializer.change_mask_bits();
    let element_size = serializer.snapshot_size();
    let (len, offset) = read_buffer_slot(record, slot.snapshot_offset);
    let (base_len, base_offset) = read_buffer_slot(base_record, slot.snapshot_offset);
    let block = DynamicBlock::new(offset, element_bits, element_size, len);

    let mask_bits = element_bits * len as u32;
    let (element_masks, code) = if len != base_len {
        (ChangeMask::full(mask_bits), BUFFER_FULLY_CHANGED)
    } else {
        let base_block = DynamicBlock::new(base_offset, element_bits, element_size, base_len);
        let mut element_masks = ChangeMask::new(mask_bits);
        for element in 0..len {
            serializer.calculate_change_mask(
                &dynamic[block.element_range(element)],
                &base_dynamic[base_block.element_range(element)],
                &mut element_masks,
                element as u32 * element_bits,
            );
        }
        let code = if element_masks.is_clear() {
            0
        } else {
            BUFFER_CONTENTS_CHANGED
        };
        (element_masks, code)
    };

    dynamic[block.mask_range()].copy_from_slice(element_masks.as_bytes());
    code
}

/// Write a buffer's payload for its mask value:
/// fully changed writes the length and every element, contents changed
/// writes each element's mask followed by its changed fields.
#[allow(clippy::too_many_arguments)]
fn write_buffer(
    serializer: &dyn BufferSerializer,
    slot: &GhostSlotLayout,
    code: u32,
    record: &[u8],
    dynamic: &[u8],
    base_record: &[u8],
    base_dynamic: &[u8],
    zero: &[u8],
    writer: &mut dyn BitWrite,
    model: &CompressionModel,
) {
    let element_bits = serializer.change_mask_bits();
    let element_size = serializer.snapshot_size();
    let (len, offset) = read_buffer_slot(record, slot.snapshot_offset);
    let (base_len, base_offset) = read_buffer_slot(base_record, slot.snapshot_offset);
    let block = DynamicBlock::new(offset, element_bits, element_size, len);
    let base_block = DynamicBlock::new(base_offset, element_bits, element_size, base_len);

    match code {
        BUFFER_FULLY_CHANGED => {
            writer.write_packed_uint(len as u32, model);
            let full = ChangeMask::full(element_bits);
            for element in 0..len {
                serializer.serialize(
                    &dynamic[block.element_range(element)],
                    element_or_zero(base_dynamic, &base_block, element, zero),
                    &full,
                    0,
                    writer,
                    model,
                );
            }
        }
        BUFFER_CONTENTS_CHANGED => {
            let element_masks =
                ChangeMask::from_bytes(element_bits * len as u32, &dynamic[block.mask_range()]);
            for element in 0..len {
                let start_bit = element as u32 * element_bits;
                write_mask_bits(writer, &element_masks, start_bit, element_bits);
                serializer.serialize(
                    &dynamic[block.element_range(element)],
                    element_or_zero(base_dynamic, &base_block, element, zero),
                    &element_masks,
                    start_bit,
                    writer,
                    model,
                );
            }
        }
        _ => {}
    }
}
