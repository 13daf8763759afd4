use crate::{
    constants::FIELD_SIZE_BYTES,
    snapshot::codec::{read_u32, write_u32},
    world::component::ghost_field::{GhostField, GhostFieldKind},
};

fn quantize(value: f32, kind: GhostFieldKind) -> u32 {
    match kind {
        GhostFieldKind::Float => value.to_bits(),
        GhostFieldKind::Quantized(factor) => (value * factor as f32).round() as i32 as u32,
        GhostFieldKind::UInt => value.round() as u32,
        GhostFieldKind::Int => value.round() as i32 as u32,
        GhostFieldKind::Bool => u32::from(value != 0.0),
    }
}

fn dequantize(word: u32, kind: GhostFieldKind) -> f32 {
    match kind {
        GhostFieldKind::Float => f32::from_bits(word),
        GhostFieldKind::Quantized(factor) => word as i32 as f32 / factor as f32,
        GhostFieldKind::UInt => word as f32,
        GhostFieldKind::Int => word as i32 as f32,
        GhostFieldKind::Bool => {
            if word != 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Read access to one component's fields inside a snapshot record.
///
/// Fields are addressed by their index in the component's `FIELDS`.
/// Accessing an index past the end of `FIELDS` panics.
#[derive(Copy, Clone)]
pub struct SnapshotSlot<'s> {
    bytes: &'s [u8],
    fields: &'static [GhostField],
}

impl<'s> SnapshotSlot<'s> {
    pub fn new(bytes: &'s [u8], fields: &'static [GhostField]) -> Self {
        Self { bytes, fields }
    }

    pub fn word(&self, field: usize) -> u32 {
        read_u32(self.bytes, field * FIELD_SIZE_BYTES)
    }

    pub fn uint(&self, field: usize) -> u32 {
        self.word(field)
    }

    pub fn int(&self, field: usize) -> i32 {
        self.word(field) as i32
    }

    pub fn boolean(&self, field: usize) -> bool {
        self.word(field) != 0
    }

    /// The field as a float, dequantized according to its declared kind
    pub fn float(&self, field: usize) -> f32 {
        dequantize(self.word(field), self.fields[field].kind)
    }
}

/// Write access to one component's fields inside a snapshot record
pub struct SnapshotSlotMut<'s> {
    bytes: &'s mut [u8],
    fields: &'static [GhostField],
}

impl<'s> SnapshotSlotMut<'s> {
    pub fn new(bytes: &'s mut [u8], fields: &'static [GhostField]) -> Self {
        Self { bytes, fields }
    }

    pub fn set_word(&mut self, field: usize, value: u32) {
        write_u32(self.bytes, field * FIELD_SIZE_BYTES, value);
    }

    pub fn set_uint(&mut self, field: usize, value: u32) {
        self.set_word(field, value);
    }

    pub fn set_int(&mut self, field: usize, value: i32) {
        self.set_word(field, value as u32);
    }

    pub fn set_bool(&mut self, field: usize, value: bool) {
        self.set_word(field, u32::from(value));
    }

    /// Store a float, quantized according to the field's declared kind
    pub fn set_float(&mut self, field: usize, value: f32) {
        let kind = self.fields[field].kind;
        self.set_word(field, quantize(value, kind));
    }

    pub fn as_slot(&self) -> SnapshotSlot<'_> {
        SnapshotSlot::new(self.bytes, self.fields)
    }
}

/// The snapshots a live component is rebuilt from: the newest snapshot at or
/// before the interpolation time, and optionally the next one after it.
pub struct SnapshotInterpolation<'s> {
    before: SnapshotSlot<'s>,
    after: Option<SnapshotSlot<'s>>,
    factor: f32,
}

impl<'s> SnapshotInterpolation<'s> {
    pub fn new(before: SnapshotSlot<'s>, after: Option<SnapshotSlot<'s>>, factor: f32) -> Self {
        Self {
            before,
            after,
            factor: factor.clamp(0.0, 1.0),
        }
    }

    /// A single snapshot, no interpolation
    pub fn single(snapshot: SnapshotSlot<'s>) -> Self {
        Self::new(snapshot, None, 0.0)
    }

    pub fn before(&self) -> &SnapshotSlot<'s> {
        &self.before
    }

    pub fn after(&self) -> Option<&SnapshotSlot<'s>> {
        self.after.as_ref()
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn uint(&self, field: usize) -> u32 {
        self.before.uint(field)
    }

    pub fn int(&self, field: usize) -> i32 {
        self.before.int(field)
    }

    pub fn boolean(&self, field: usize) -> bool {
        self.before.boolean(field)
    }

    /// Linear interpolation between the two snapshots
    pub fn float(&self, field: usize) -> f32 {
        let before = self.before.float(field);
        match &self.after {
            Some(after) => before + (after.float(field) - before) * self.factor,
            None => before,
        }
    }
}
