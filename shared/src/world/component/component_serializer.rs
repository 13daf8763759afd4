use std::{any::Any, marker::PhantomData};

use netcode_serde::{BitReader, BitWrite, CompressionModel, SerdeErr};

use crate::{
    snapshot::predictor::GhostDeltaPredictor,
    world::component::{
        change_mask::ChangeMask,
        error::GhostError,
        field_serializer::GhostFieldSerializer,
        ghost_component::GhostComponent,
        ghost_field::{GhostField, GhostFieldKind, GhostSendType},
        snapshot_slot::{SnapshotInterpolation, SnapshotSlot, SnapshotSlotMut},
    },
};

/// Largest difference seen for one field between predicted and authoritative values
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionError {
    pub component: &'static str,
    pub field: &'static str,
    pub error: f32,
}

/// Capability set of a replicated component, resolved once at registration.
///
/// Columns are type-erased chunk arrays, always a `Vec<C>` of the component
/// the serializer was built for.
pub trait ComponentSerializer: GhostFieldSerializer {
    fn copy_to_snapshot(
        &self,
        column: &dyn Any,
        index: usize,
        snapshot: &mut [u8],
    ) -> Result<(), GhostError>;

    fn copy_from_snapshot(
        &self,
        column: &mut dyn Any,
        index: usize,
        snapshot: &SnapshotInterpolationBytes,
    ) -> Result<(), GhostError>;

    /// A copy of the column, `None` when there is nothing to roll back
    fn backup_column(
        &self,
        column: &dyn Any,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>, GhostError>;

    fn restore_from_backup(&self, column: &mut dyn Any, backup: &dyn Any) -> Result<(), GhostError>;

    /// Push the largest per-field difference between the column and its backup
    fn report_prediction_errors(
        &self,
        column: &dyn Any,
        backup: &dyn Any,
        errors: &mut Vec<PredictionError>,
    ) -> Result<(), GhostError>;
}

/// Raw snapshot bytes a component is rebuilt from
pub struct SnapshotInterpolationBytes<'s> {
    pub before: &'s [u8],
    pub after: Option<&'s [u8]>,
    pub factor: f32,
}

fn column<'c, C: GhostComponent>(column: &'c dyn Any) -> Result<&'c Vec<C>, GhostError> {
    column
        .downcast_ref::<Vec<C>>()
        .ok_or(GhostError::ColumnTypeMismatch { component: C::NAME })
}

fn column_mut<'c, C: GhostComponent>(
    column: &'c mut dyn Any,
) -> Result<&'c mut Vec<C>, GhostError> {
    column
        .downcast_mut::<Vec<C>>()
        .ok_or(GhostError::ColumnTypeMismatch { component: C::NAME })
}

fn out_of_range<C: GhostComponent>(index: usize, length: usize) -> GhostError {
    GhostError::EntityOutOfRange {
        component: C::NAME,
        index,
        length,
    }
}

fn field_error(field: &GhostField, current: &SnapshotSlot, backup: &SnapshotSlot, index: usize) -> f32 {
    match field.kind {
        GhostFieldKind::Float | GhostFieldKind::Quantized(_) => {
            (current.float(index) - backup.float(index)).abs()
        }
        GhostFieldKind::Int => (i64::from(current.int(index)) - i64::from(backup.int(index))).abs() as f32,
        GhostFieldKind::UInt => (i64::from(current.uint(index)) - i64::from(backup.uint(index))).abs() as f32,
        GhostFieldKind::Bool => {
            if current.boolean(index) == backup.boolean(index) {
                0.0
            } else {
                1.0
            }
        }
    }
}

/// Serializer of a component with at least one field
pub struct TypedComponentSerializer<C: GhostComponent> {
    phantom_c: PhantomData<fn() -> C>,
}

impl<C: GhostComponent> TypedComponentSerializer<C> {
    pub fn new() -> Self {
        Self {
            phantom_c: PhantomData,
        }
    }
}

impl<C: GhostComponent> Default for TypedComponentSerializer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GhostComponent> GhostFieldSerializer for TypedComponentSerializer<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn fields(&self) -> &'static [GhostField] {
        C::FIELDS
    }

    fn send_type(&self) -> GhostSendType {
        C::SEND_TYPE
    }
}

impl<C: GhostComponent> ComponentSerializer for TypedComponentSerializer<C> {
    fn copy_to_snapshot(
        &self,
        column: &dyn Any,
        index: usize,
        snapshot: &mut [u8],
    ) -> Result<(), GhostError> {
        let values = self::column::<C>(column)?;
        let value = values
            .get(index)
            .ok_or_else(|| out_of_range::<C>(index, values.len()))?;
        value.copy_to_snapshot(&mut SnapshotSlotMut::new(snapshot, C::FIELDS));
        Ok(())
    }

    fn copy_from_snapshot(
        &self,
        column: &mut dyn Any,
        index: usize,
        snapshot: &SnapshotInterpolationBytes,
    ) -> Result<(), GhostError> {
        let values = column_mut::<C>(column)?;
        let length = values.len();
        let value = values
            .get_mut(index)
            .ok_or_else(|| out_of_range::<C>(index, length))?;
        let interpolation = SnapshotInterpolation::new(
            SnapshotSlot::new(snapshot.before, C::FIELDS),
            snapshot
                .after
                .map(|after| SnapshotSlot::new(after, C::FIELDS)),
            snapshot.factor,
        );
        value.copy_from_snapshot(&interpolation);
        Ok(())
    }

    fn backup_column(
        &self,
        column: &dyn Any,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>, GhostError> {
        let values = self::column::<C>(column)?;
        Ok(Some(Box::new(values.clone())))
    }

    fn restore_from_backup(&self, column: &mut dyn Any, backup: &dyn Any) -> Result<(), GhostError> {
        let backup = self::column::<C>(backup)?;
        let values = column_mut::<C>(column)?;
        values.clone_from(backup);
        Ok(())
    }

    fn report_prediction_errors(
        &self,
        column: &dyn Any,
        backup: &dyn Any,
        errors: &mut Vec<PredictionError>,
    ) -> Result<(), GhostError> {
        let values = self::column::<C>(column)?;
        let backup = self::column::<C>(backup)?;

        let size = self.snapshot_size();
        let mut current_bytes = vec![0u8; size];
        let mut backup_bytes = vec![0u8; size];
        let mut max_errors = vec![0f32; C::FIELDS.len()];

        for (value, backup_value) in values.iter().zip(backup.iter()) {
            value.copy_to_snapshot(&mut SnapshotSlotMut::new(&mut current_bytes, C::FIELDS));
            backup_value.copy_to_snapshot(&mut SnapshotSlotMut::new(&mut backup_bytes, C::FIELDS));
            let current = SnapshotSlot::new(&current_bytes, C::FIELDS);
            let previous = SnapshotSlot::new(&backup_bytes, C::FIELDS);
            for (index, field) in C::FIELDS.iter().enumerate() {
                let error = field_error(field, &current, &previous, index);
                if error > max_errors[index] {
                    max_errors[index] = error;
                }
            }
        }

        for (field, error) in C::FIELDS.iter().zip(max_errors) {
            errors.push(PredictionError {
                component: C::NAME,
                field: field.name,
                error,
            });
        }
        Ok(())
    }
}

/// Serializer chosen at registration for components without fields. Every
/// operation is a no-op, including backup, restore and prediction error
/// reports; the snapshot slot and change mask of such a component are empty.
pub struct EmptyComponentSerializer<C: GhostComponent> {
    phantom_c: PhantomData<fn() -> C>,
}

impl<C: GhostComponent> EmptyComponentSerializer<C> {
    pub fn new() -> Self {
        Self {
            phantom_c: PhantomData,
        }
    }
}

impl<C: GhostComponent> Default for EmptyComponentSerializer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GhostComponent> GhostFieldSerializer for EmptyComponentSerializer<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn fields(&self) -> &'static [GhostField] {
        &[]
    }

    fn send_type(&self) -> GhostSendType {
        C::SEND_TYPE
    }

    fn snapshot_size(&self) -> usize {
        0
    }

    fn change_mask_bits(&self) -> u32 {
        0
    }

    fn calculate_change_mask(
        &self,
        _snapshot: &[u8],
        _baseline: &[u8],
        _mask: &mut ChangeMask,
        _start_bit: u32,
    ) {
    }

    fn predict_delta(
        &self,
        _predicted: &mut [u8],
        _baseline1: &[u8],
        _baseline2: &[u8],
        _predictor: &GhostDeltaPredictor,
    ) {
    }

    fn serialize(
        &self,
        _snapshot: &[u8],
        _baseline: &[u8],
        _mask: &ChangeMask,
        _start_bit: u32,
        _writer: &mut dyn BitWrite,
        _model: &CompressionModel,
    ) -> bool {
        true
    }

    fn deserialize(
        &self,
        _snapshot: &mut [u8],
        _baseline: &[u8],
        _mask: &ChangeMask,
        _start_bit: u32,
        _reader: &mut BitReader,
        _model: &CompressionModel,
    ) -> Result<(), SerdeErr> {
        Ok(())
    }
}

impl<C: GhostComponent> ComponentSerializer for EmptyComponentSerializer<C> {
    fn copy_to_snapshot(
        &self,
        _column: &dyn Any,
        _index: usize,
        _snapshot: &mut [u8],
    ) -> Result<(), GhostError> {
        Ok(())
    }

    fn copy_from_snapshot(
        &self,
        _column: &mut dyn Any,
        _index: usize,
        _snapshot: &SnapshotInterpolationBytes,
    ) -> Result<(), GhostError> {
        Ok(())
    }

    fn backup_column(
        &self,
        _column: &dyn Any,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>, GhostError> {
        Ok(None)
    }

    fn restore_from_backup(&self, _column: &mut dyn Any, _backup: &dyn Any) -> Result<(), GhostError> {
        Ok(())
    }

    fn report_prediction_errors(
        &self,
        _column: &dyn Any,
        _backup: &dyn Any,
        _errors: &mut Vec<PredictionError>,
    ) -> Result<(), GhostError> {
        Ok(())
    }
}
