use std::{any::Any, marker::PhantomData};

use crate::world::component::{
    error::GhostError,
    field_serializer::GhostFieldSerializer,
    ghost_component::GhostComponent,
    ghost_field::{GhostField, GhostSendType},
    snapshot_slot::{SnapshotInterpolation, SnapshotSlot, SnapshotSlotMut},
};

/// Capability set of a replicated dynamic buffer. The field-level methods
/// inherited from `GhostFieldSerializer` work on one element.
///
/// Columns are type-erased chunk arrays, always a `Vec<Vec<E>>` of the element
/// type the serializer was built for.
pub trait BufferSerializer: GhostFieldSerializer {
    fn buffer_len(&self, column: &dyn Any, index: usize) -> Result<usize, GhostError>;

    /// Write every element of one entity's buffer into `elements`, which is
    /// `buffer_len * snapshot_size()` bytes
    fn copy_buffer_to_snapshot(
        &self,
        column: &dyn Any,
        index: usize,
        elements: &mut [u8],
    ) -> Result<(), GhostError>;

    /// Resize one entity's buffer to `len` and rebuild its elements
    fn copy_buffer_from_snapshot(
        &self,
        column: &mut dyn Any,
        index: usize,
        elements: &[u8],
        len: usize,
    ) -> Result<(), GhostError>;

    fn backup_column(&self, column: &dyn Any) -> Result<Box<dyn Any + Send + Sync>, GhostError>;

    fn restore_from_backup(&self, column: &mut dyn Any, backup: &dyn Any) -> Result<(), GhostError>;
}

fn column<'c, E: GhostComponent>(column: &'c dyn Any) -> Result<&'c Vec<Vec<E>>, GhostError> {
    column
        .downcast_ref::<Vec<Vec<E>>>()
        .ok_or(GhostError::ColumnTypeMismatch { component: E::NAME })
}

fn column_mut<'c, E: GhostComponent>(
    column: &'c mut dyn Any,
) -> Result<&'c mut Vec<Vec<E>>, GhostError> {
    column
        .downcast_mut::<Vec<Vec<E>>>()
        .ok_or(GhostError::ColumnTypeMismatch { component: E::NAME })
}

pub struct TypedBufferSerializer<E: GhostComponent> {
    phantom_e: PhantomData<fn() -> E>,
}

impl<E: GhostComponent> TypedBufferSerializer<E> {
    pub fn new() -> Self {
        Self {
            phantom_e: PhantomData,
        }
    }

    fn buffer<'c>(&self, column: &'c dyn Any, index: usize) -> Result<&'c Vec<E>, GhostError> {
        let buffers = self::column::<E>(column)?;
        buffers.get(index).ok_or(GhostError::EntityOutOfRange {
            component: E::NAME,
            index,
            length: buffers.len(),
        })
    }
}

impl<E: GhostComponent> Default for TypedBufferSerializer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: GhostComponent> GhostFieldSerializer for TypedBufferSerializer<E> {
    fn name(&self) -> &'static str {
        E::NAME
    }

    fn fields(&self) -> &'static [GhostField] {
        E::FIELDS
    }

    fn send_type(&self) -> GhostSendType {
        E::SEND_TYPE
    }
}

impl<E: GhostComponent> BufferSerializer for TypedBufferSerializer<E> {
    fn buffer_len(&self, column: &dyn Any, index: usize) -> Result<usize, GhostError> {
        Ok(self.buffer(column, index)?.len())
    }

    fn copy_buffer_to_snapshot(
        &self,
        column: &dyn Any,
        index: usize,
        elements: &mut [u8],
    ) -> Result<(), GhostError> {
        let buffer = self.buffer(column, index)?;
        let size = self.snapshot_size();
        if size == 0 {
            return Ok(());
        }
        for (element, bytes) in buffer.iter().zip(elements.chunks_exact_mut(size)) {
            element.copy_to_snapshot(&mut SnapshotSlotMut::new(bytes, E::FIELDS));
        }
        Ok(())
    }

    fn copy_buffer_from_snapshot(
        &self,
        column: &mut dyn Any,
        index: usize,
        elements: &[u8],
        len: usize,
    ) -> Result<(), GhostError> {
        let buffers = column_mut::<E>(column)?;
        let length = buffers.len();
        let buffer = buffers.get_mut(index).ok_or(GhostError::EntityOutOfRange {
            component: E::NAME,
            index,
            length,
        })?;
        buffer.resize(len, E::default());

        let size = self.snapshot_size();
        if size == 0 {
            return Ok(());
        }
        for (element, bytes) in buffer.iter_mut().zip(elements.chunks_exact(size)) {
            element.copy_from_snapshot(&SnapshotInterpolation::single(SnapshotSlot::new(
                bytes,
                E::FIELDS,
            )));
        }
        Ok(())
    }

    fn backup_column(&self, column: &dyn Any) -> Result<Box<dyn Any + Send + Sync>, GhostError> {
        Ok(Box::new(self::column::<E>(column)?.clone()))
    }

    fn restore_from_backup(&self, column: &mut dyn Any, backup: &dyn Any) -> Result<(), GhostError> {
        let backup = self::column::<E>(backup)?;
        column_mut::<E>(column)?.clone_from(backup);
        Ok(())
    }
}
