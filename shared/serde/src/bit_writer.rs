use crate::{
    compression_model::{zigzag_encode, CompressionModel},
    constants::MTU_SIZE_BYTES,
};

/// Sink for packed bits.
///
/// Bits are laid out least significant first, both inside a multi-bit value
/// and inside each byte of the underlying buffer. Every `write_*` helper
/// returns `false` (and writes nothing) when the value would not fit, so a
/// bounded writer never spills into memory it does not own.
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);

    fn bits_written(&self) -> u32;

    fn has_failed_writes(&self) -> bool {
        false
    }

    /// Check that `bits` more bits fit. A bounded writer marks itself as
    /// failed when they do not.
    fn reserve(&mut self, _bits: u32) -> bool {
        true
    }

    fn write_byte(&mut self, byte: u8) {
        self.write_bits(u32::from(byte), 8);
    }

    fn write_bits(&mut self, value: u32, bit_count: u32) -> bool {
        debug_assert!(bit_count <= 32);
        if !self.reserve(bit_count) {
            return false;
        }
        for index in 0..bit_count {
            self.write_bit((value >> index) & 1 == 1);
        }
        true
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        if !self.reserve((bytes.len() as u32).saturating_mul(8)) {
            return false;
        }
        for byte in bytes {
            self.write_bits(u32::from(*byte), 8);
        }
        true
    }

    fn write_packed_uint(&mut self, value: u32, model: &CompressionModel) -> bool {
        let bucket = model.bucket_of(value);
        let (code, code_length) = model.code(bucket);
        let bucket_size = model.bucket_size(bucket);
        if !self.reserve(u32::from(code_length) + u32::from(bucket_size)) {
            return false;
        }
        // prefix codes go most significant bit first so they can be resolved bit by bit
        for index in (0..code_length).rev() {
            self.write_bit((code >> index) & 1 == 1);
        }
        let offset = value - model.bucket_offset(bucket);
        for index in 0..bucket_size {
            self.write_bit((offset >> index) & 1 == 1);
        }
        true
    }

    fn write_packed_int(&mut self, value: i32, model: &CompressionModel) -> bool {
        self.write_packed_uint(zigzag_encode(value), model)
    }

    fn write_packed_uint_delta(&mut self, value: u32, baseline: u32, model: &CompressionModel) -> bool {
        self.write_packed_int((value as i32).wrapping_sub(baseline as i32), model)
    }

    fn write_packed_int_delta(&mut self, value: i32, baseline: i32, model: &CompressionModel) -> bool {
        self.write_packed_int(value.wrapping_sub(baseline), model)
    }

    fn write_packed_float_delta(&mut self, value: f32, baseline: f32, _model: &CompressionModel) -> bool {
        if value.to_bits() == baseline.to_bits() {
            return self.write_bits(0, 1);
        }
        if !self.reserve(33) {
            return false;
        }
        self.write_bit(true);
        self.write_bits(value.to_bits(), 32)
    }
}

/// Fixed capacity bit writer, the unit handed out by a transport for one packet
pub struct BitWriter {
    buffer: Vec<u8>,
    capacity_bits: u32,
    bits_written: u32,
    failed_writes: bool,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(MTU_SIZE_BYTES)
    }

    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            buffer: vec![0; capacity_bytes],
            capacity_bits: (capacity_bytes as u32).saturating_mul(8),
            bits_written: 0,
            failed_writes: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn length_in_bits(&self) -> u32 {
        self.bits_written
    }

    pub fn length_in_bytes(&self) -> usize {
        ((self.bits_written + 7) / 8) as usize
    }

    pub fn bits_free(&self) -> u32 {
        self.capacity_bits - self.bits_written
    }

    /// Pad with zero bits up to the next 32-bit boundary
    pub fn align_to_word(&mut self) -> bool {
        let padding = (32 - self.bits_written % 32) % 32;
        self.write_bits(0, padding)
    }

    /// Roll the writer back to `bit_length`, clearing everything written after
    /// it along with the failed flag.
    pub fn truncate(&mut self, bit_length: u32) {
        if bit_length >= self.bits_written {
            self.failed_writes = false;
            return;
        }
        for index in bit_length..self.bits_written {
            let index = index as usize;
            self.buffer[index / 8] &= !(1 << (index % 8));
        }
        self.bits_written = bit_length;
        self.failed_writes = false;
    }

    pub fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|byte| *byte = 0);
        self.bits_written = 0;
        self.failed_writes = false;
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.buffer[..self.length_in_bytes()]
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        let length = self.length_in_bytes();
        self.buffer.truncate(length);
        self.buffer
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        if self.bits_written >= self.capacity_bits {
            self.failed_writes = true;
            return;
        }
        let index = self.bits_written as usize;
        if bit {
            self.buffer[index / 8] |= 1 << (index % 8);
        }
        self.bits_written += 1;
    }

    fn bits_written(&self) -> u32 {
        self.bits_written
    }

    fn has_failed_writes(&self) -> bool {
        self.failed_writes
    }

    fn reserve(&mut self, bits: u32) -> bool {
        if self.bits_written.saturating_add(bits) > self.capacity_bits {
            self.failed_writes = true;
            return false;
        }
        true
    }
}
