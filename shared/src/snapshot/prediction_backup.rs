use std::any::Any;

use crate::{
    snapshot::error::SnapshotError,
    types::GhostTypeIndex,
    world::{
        chunk::{GhostChunk, GhostChunkMut},
        component::{
            component_kinds::GhostSerializer, component_serializer::PredictionError,
            error::GhostError,
        },
        ghost::ghost_collection::{GhostCollection, GhostTypeLayout},
    },
};

/// Copy of a predicted chunk's columns taken before prediction runs, used
/// to roll back when a new snapshot arrives and to measure how far the
/// prediction drifted
pub struct PredictionBackup {
    ghost_type: GhostTypeIndex,
    columns: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

fn layout<'g>(
    ghosts: &'g GhostCollection,
    ghost_type: GhostTypeIndex,
) -> Result<&'g GhostTypeLayout, SnapshotError> {
    ghosts
        .ghost_type(ghost_type)
        .ok_or(SnapshotError::InvalidGhostType {
            index: ghost_type,
            count: ghosts.ghost_type_count(),
        })
}

impl PredictionBackup {
    pub fn backup(ghosts: &GhostCollection, chunk: &dyn GhostChunk) -> Result<Self, SnapshotError> {
        let ghost_type = chunk.ghost_type();
        let layout = layout(ghosts, ghost_type)?;

        let mut columns = Vec::with_capacity(layout.slots.len());
        for slot in &layout.slots {
            if !slot.is_buffer && slot.snapshot_size == 0 {
                columns.push(None);
                continue;
            }
            let serializer = ghosts.serializer(slot)?;
            let column = chunk.column(&slot.kind).ok_or(GhostError::MissingColumn {
                component: serializer.name(),
            })?;
            let backup = match serializer {
                GhostSerializer::Component(serializer) => serializer.backup_column(column)?,
                GhostSerializer::Buffer(serializer) => Some(serializer.backup_column(column)?),
            };
            columns.push(backup);
        }

        Ok(Self {
            ghost_type,
            columns,
        })
    }

    pub fn ghost_type(&self) -> GhostTypeIndex {
        self.ghost_type
    }

    fn check_chunk(&self, ghost_type: GhostTypeIndex) -> Result<(), SnapshotError> {
        if ghost_type != self.ghost_type {
            return Err(SnapshotError::BackupMismatch {
                expected: self.ghost_type,
                actual: ghost_type,
            });
        }
        Ok(())
    }

    /// Roll every backed up column of `chunk` back to its saved values
    pub fn restore(
        &self,
        ghosts: &GhostCollection,
        chunk: &mut dyn GhostChunkMut,
    ) -> Result<(), SnapshotError> {
        self.check_chunk(chunk.ghost_type())?;
        let layout = layout(ghosts, self.ghost_type)?;

        for (slot, backup) in layout.slots.iter().zip(&self.columns) {
            let Some(backup) = backup else {
                continue;
            };
            let serializer = ghosts.serializer(slot)?;
            let column = chunk.column_mut(&slot.kind).ok_or(GhostError::MissingColumn {
                component: serializer.name(),
            })?;
            match serializer {
                GhostSerializer::Component(serializer) => {
                    serializer.restore_from_backup(column, &**backup)?
                }
                GhostSerializer::Buffer(serializer) => {
                    serializer.restore_from_backup(column, &**backup)?
                }
            }
        }
        Ok(())
    }

    /// Largest difference per component field between the chunk's current
    /// values and the backup. Fieldless components and buffers report nothing.
    pub fn report_prediction_errors(
        &self,
        ghosts: &GhostCollection,
        chunk: &dyn GhostChunk,
    ) -> Result<Vec<PredictionError>, SnapshotError> {
        self.check_chunk(chunk.ghost_type())?;
        let layout = layout(ghosts, self.ghost_type)?;

        let mut errors = Vec::new();
        for (slot, backup) in layout.slots.iter().zip(&self.columns) {
            let (Some(backup), GhostSerializer::Component(serializer)) =
                (backup, ghosts.serializer(slot)?)
            else {
                continue;
            };
            let column = chunk.column(&slot.kind).ok_or(GhostError::MissingColumn {
                component: serializer.name(),
            })?;
            serializer.report_prediction_errors(column, &**backup, &mut errors)?;
        }
        Ok(errors)
    }
}
