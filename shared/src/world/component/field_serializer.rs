use netcode_serde::{BitReader, BitWrite, CompressionModel, SerdeErr};

use crate::{
    constants::FIELD_SIZE_BYTES,
    snapshot::{
        codec::{read_i32, read_u32, write_i32, write_u32},
        predictor::GhostDeltaPredictor,
    },
    world::component::{
        change_mask::ChangeMask,
        ghost_field::{GhostField, GhostFieldKind, GhostSendType},
    },
};

fn write_field(
    kind: GhostFieldKind,
    value: u32,
    baseline: u32,
    writer: &mut dyn BitWrite,
    model: &CompressionModel,
) -> bool {
    match kind {
        GhostFieldKind::UInt | GhostFieldKind::Bool => {
            writer.write_packed_uint_delta(value, baseline, model)
        }
        GhostFieldKind::Int | GhostFieldKind::Quantized(_) => {
            writer.write_packed_int_delta(value as i32, baseline as i32, model)
        }
        GhostFieldKind::Float => writer.write_packed_float_delta(
            f32::from_bits(value),
            f32::from_bits(baseline),
            model,
        ),
    }
}

fn read_field(
    kind: GhostFieldKind,
    baseline: u32,
    reader: &mut BitReader,
    model: &CompressionModel,
) -> Result<u32, SerdeErr> {
    match kind {
        GhostFieldKind::UInt | GhostFieldKind::Bool => reader.read_packed_uint_delta(baseline, model),
        GhostFieldKind::Int | GhostFieldKind::Quantized(_) => Ok(reader
            .read_packed_int_delta(baseline as i32, model)?
            as u32),
        GhostFieldKind::Float => Ok(reader
            .read_packed_float_delta(f32::from_bits(baseline), model)?
            .to_bits()),
    }
}

/// The field-level capabilities every ghost serializer shares: change
/// detection, prediction and delta coding of one value's snapshot bytes.
///
/// The default methods work from `fields()` alone, so typed serializers only
/// describe their schema. Slices passed in are exactly `snapshot_size()`
/// bytes long.
pub trait GhostFieldSerializer: Send + Sync {
    fn name(&self) -> &'static str;

    fn fields(&self) -> &'static [GhostField];

    fn send_type(&self) -> GhostSendType;

    /// Bytes one value takes in a snapshot
    fn snapshot_size(&self) -> usize {
        self.fields().len() * FIELD_SIZE_BYTES
    }

    /// Change mask bits one value takes
    fn change_mask_bits(&self) -> u32 {
        self.fields().len() as u32
    }

    /// Set one bit per field that differs from the baseline, starting at `start_bit`
    fn calculate_change_mask(
        &self,
        snapshot: &[u8],
        baseline: &[u8],
        mask: &mut ChangeMask,
        start_bit: u32,
    ) {
        for index in 0..self.fields().len() {
            let offset = index * FIELD_SIZE_BYTES;
            let changed = read_u32(snapshot, offset) != read_u32(baseline, offset);
            mask.set_bit(start_bit + index as u32, changed);
        }
    }

    /// Replace the integer fields of `predicted`, which holds baseline0, with
    /// their extrapolation from baseline0, baseline1 and baseline2
    fn predict_delta(
        &self,
        predicted: &mut [u8],
        baseline1: &[u8],
        baseline2: &[u8],
        predictor: &GhostDeltaPredictor,
    ) {
        for (index, field) in self.fields().iter().enumerate() {
            if !field.kind.is_predictable() {
                continue;
            }
            let offset = index * FIELD_SIZE_BYTES;
            let value = predictor.predict_int(
                read_i32(predicted, offset),
                read_i32(baseline1, offset),
                read_i32(baseline2, offset),
            );
            write_i32(predicted, offset, value);
        }
    }

    /// Write the fields marked in `mask`, delta encoded against `baseline`.
    /// `baseline` is either baseline0 or the predicted baseline; the mask is
    /// always computed against baseline0. Returns false if the writer ran out
    /// of space.
    fn serialize(
        &self,
        snapshot: &[u8],
        baseline: &[u8],
        mask: &ChangeMask,
        start_bit: u32,
        writer: &mut dyn BitWrite,
        model: &CompressionModel,
    ) -> bool {
        for (index, field) in self.fields().iter().enumerate() {
            if !mask.bit(start_bit + index as u32) {
                continue;
            }
            let offset = index * FIELD_SIZE_BYTES;
            if !write_field(
                field.kind,
                read_u32(snapshot, offset),
                read_u32(baseline, offset),
                writer,
                model,
            ) {
                return false;
            }
        }
        true
    }

    /// Read the fields marked in `mask` into `snapshot`, which the caller
    /// fills with baseline0 beforehand so unchanged fields keep their value
    fn deserialize(
        &self,
        snapshot: &mut [u8],
        baseline: &[u8],
        mask: &ChangeMask,
        start_bit: u32,
        reader: &mut BitReader,
        model: &CompressionModel,
    ) -> Result<(), SerdeErr> {
        for (index, field) in self.fields().iter().enumerate() {
            if !mask.bit(start_bit + index as u32) {
                continue;
            }
            let offset = index * FIELD_SIZE_BYTES;
            let value = read_field(field.kind, read_u32(baseline, offset), reader, model)?;
            write_u32(snapshot, offset, value);
        }
        Ok(())
    }
}
