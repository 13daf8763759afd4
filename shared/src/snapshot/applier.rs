use log::trace;

use crate::{
    snapshot::{
        codec::read_buffer_slot,
        error::SnapshotError,
        history::{GhostSnapshotStore, SnapshotEntry},
        layout::DynamicBlock,
    },
    tick::NetworkTick,
    types::ConnectionId,
    world::{
        chunk::GhostChunkMut,
        component::{
            component_kinds::GhostSerializer, component_serializer::SnapshotInterpolationBytes,
            error::GhostError,
        },
        ghost::ghost_collection::GhostCollection,
    },
};

/// The point in time snapshots are applied at: a tick plus a fraction of
/// the following tick
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InterpolationTarget {
    pub tick: NetworkTick,
    pub fraction: f32,
}

impl InterpolationTarget {
    pub fn new(tick: NetworkTick, fraction: f32) -> Self {
        Self {
            tick,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    pub fn at(tick: NetworkTick) -> Self {
        Self::new(tick, 0.0)
    }

    /// Interpolation factor between two stored snapshots
    fn factor(&self, before: &SnapshotEntry, after: &SnapshotEntry) -> f32 {
        let span = after.tick.ticks_since(before.tick) as f32;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.tick.ticks_since(before.tick) as f32 + self.fraction) / span).clamp(0.0, 1.0)
    }
}

/// Copies received snapshots into live components through each
/// component's `copy_from_snapshot`, interpolating between the two stored
/// snapshots around the target
pub struct SnapshotApplier<'p> {
    ghosts: &'p GhostCollection,
}

impl<'p> SnapshotApplier<'p> {
    pub fn new(ghosts: &'p GhostCollection) -> Self {
        Self { ghosts }
    }

    /// Apply the store's snapshots to every entity of `chunk`. Components
    /// whose send type excludes `local` (for the chunk's owner) are left
    /// untouched. Returns the number of entities updated.
    pub fn apply(
        &self,
        store: &GhostSnapshotStore,
        target: InterpolationTarget,
        local: ConnectionId,
        chunk: &mut dyn GhostChunkMut,
    ) -> Result<usize, SnapshotError> {
        let ghost_type = chunk.ghost_type();
        let layout = self
            .ghosts
            .ghost_type(ghost_type)
            .ok_or(SnapshotError::InvalidGhostType {
                index: ghost_type,
                count: self.ghosts.ghost_type_count(),
            })?;
        let owner = chunk.owner();

        let mut applied = 0;
        for index in 0..chunk.len() {
            let Some(ghost_id) = chunk.ghost_id(index) else {
                continue;
            };
            let Some(history) = store.history_of_type(ghost_id, ghost_type) else {
                continue;
            };
            let Some(before) = history.at_or_before(target.tick) else {
                continue;
            };
            let after = history.after(before.tick);
            let factor = after.map_or(0.0, |after| target.factor(before, after));

            for slot in &layout.slots {
                let serializer = self.ghosts.serializer(slot)?;
                if !serializer.send_type().is_sent_to(owner, local) {
                    continue;
                }
                if !slot.is_buffer && slot.snapshot_size == 0 {
                    continue;
                }
                let column = chunk.column_mut(&slot.kind).ok_or(GhostError::MissingColumn {
                    component: serializer.name(),
                })?;

                match serializer {
                    GhostSerializer::Component(serializer) => {
                        let interpolation = SnapshotInterpolationBytes {
                            before: &before.record[slot.range()],
                            after: after.map(|after| &after.record[slot.range()]),
                            factor,
                        };
                        serializer.copy_from_snapshot(column, index, &interpolation)?;
                    }
                    GhostSerializer::Buffer(serializer) => {
                        let (len, offset) = read_buffer_slot(&before.record, slot.snapshot_offset);
                        let block = DynamicBlock::new(
                            offset,
                            serializer.change_mask_bits(),
                            serializer.snapshot_size(),
                            len,
                        );
                        let elements = before
                            .dynamic
                            .get(block.elements_range())
                            .ok_or(SnapshotError::Malformed)?;
                        serializer.copy_buffer_from_snapshot(column, index, elements, len)?;
                    }
                }
            }
            applied += 1;
        }

        trace!(
            "Applied {} ghosts of type '{}' at tick {}",
            applied,
            layout.name,
            target.tick
        );
        Ok(applied)
    }
}
