use crate::{
    compression_model::{zigzag_decode, CompressionModel},
    error::SerdeErr,
};

/// Reads back a stream produced by a [`BitWrite`](crate::BitWrite) implementor.
///
/// Every read is bounds checked against the stream length: running past the
/// end yields [`SerdeErr`] instead of touching memory outside of the buffer.
pub struct BitReader<'b> {
    buffer: &'b [u8],
    length_bits: u32,
    position: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        let length_bits = (buffer.len() as u32).saturating_mul(8);
        Self {
            buffer,
            length_bits,
            position: 0,
        }
    }

    /// A reader that stops after `length_bits`, even if the buffer is longer
    pub fn with_length_in_bits(buffer: &'b [u8], length_bits: u32) -> Self {
        let buffer_bits = (buffer.len() as u32).saturating_mul(8);
        Self {
            buffer,
            length_bits: length_bits.min(buffer_bits),
            position: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.position >= self.length_bits {
            return Err(SerdeErr);
        }
        let index = self.position as usize;
        let bit = (self.buffer[index / 8] >> (index % 8)) & 1 == 1;
        self.position += 1;
        Ok(bit)
    }

    pub fn read_bits(&mut self, bit_count: u32) -> Result<u32, SerdeErr> {
        debug_assert!(bit_count <= 32);
        if self.bits_remaining() < bit_count {
            return Err(SerdeErr);
        }
        let mut value: u32 = 0;
        for index in 0..bit_count {
            if self.read_bit()? {
                value |= 1 << index;
            }
        }
        Ok(value)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_bytes(&mut self, output: &mut [u8]) -> Result<(), SerdeErr> {
        if (self.bits_remaining() as usize) < output.len() * 8 {
            return Err(SerdeErr);
        }
        for byte in output.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    pub fn read_packed_uint(&mut self, model: &CompressionModel) -> Result<u32, SerdeErr> {
        let bucket = model
            .decode_bucket(|| self.read_bit().ok())
            .ok_or(SerdeErr)?;
        let offset = self.read_bits(u32::from(model.bucket_size(bucket)))?;
        model.bucket_offset(bucket).checked_add(offset).ok_or(SerdeErr)
    }

    pub fn read_packed_int(&mut self, model: &CompressionModel) -> Result<i32, SerdeErr> {
        Ok(zigzag_decode(self.read_packed_uint(model)?))
    }

    pub fn read_packed_uint_delta(&mut self, baseline: u32, model: &CompressionModel) -> Result<u32, SerdeErr> {
        let delta = self.read_packed_int(model)?;
        Ok((baseline as i32).wrapping_add(delta) as u32)
    }

    pub fn read_packed_int_delta(&mut self, baseline: i32, model: &CompressionModel) -> Result<i32, SerdeErr> {
        let delta = self.read_packed_int(model)?;
        Ok(baseline.wrapping_add(delta))
    }

    pub fn read_packed_float_delta(&mut self, baseline: f32, _model: &CompressionModel) -> Result<f32, SerdeErr> {
        if self.read_bit()? {
            Ok(f32::from_bits(self.read_bits(32)?))
        } else {
            Ok(baseline)
        }
    }

    /// Skip the zero padding a writer inserted with `align_to_word`
    pub fn align_to_word(&mut self) -> Result<(), SerdeErr> {
        let padding = (32 - self.position % 32) % 32;
        if self.bits_remaining() < padding {
            return Err(SerdeErr);
        }
        self.position += padding;
        Ok(())
    }

    pub fn bits_read(&self) -> u32 {
        self.position
    }

    pub fn bytes_read(&self) -> usize {
        ((self.position + 7) / 8) as usize
    }

    pub fn bits_remaining(&self) -> u32 {
        self.length_bits - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.length_bits
    }

    /// Length of the readable stream, in bytes
    pub fn length(&self) -> usize {
        ((self.length_bits + 7) / 8) as usize
    }
}
