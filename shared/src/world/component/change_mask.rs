use std::fmt;

use crate::snapshot::layout::{change_mask_words, WORD_SIZE};

/// The ChangeMask is a bitset marking which fields (or buffer states) of a
/// snapshot differ from the baseline. It is stored as whole 32-bit words, in
/// the same byte layout the mask has inside a snapshot record.
#[derive(PartialEq, Eq, Clone)]
pub struct ChangeMask {
    bit_count: u32,
    mask: Vec<u8>,
}

impl ChangeMask {
    /// Create a new, cleared ChangeMask able to hold `bit_count` bits
    pub fn new(bit_count: u32) -> Self {
        Self {
            bit_count,
            mask: vec![0; change_mask_words(bit_count) * WORD_SIZE],
        }
    }

    /// A mask with every bit set
    pub fn full(bit_count: u32) -> Self {
        let mut mask = Self::new(bit_count);
        for index in 0..bit_count {
            mask.set_bit(index, true);
        }
        mask
    }

    pub fn from_bytes(bit_count: u32, bytes: &[u8]) -> Self {
        let mut mask = Self::new(bit_count);
        let length = mask.mask.len().min(bytes.len());
        mask.mask[..length].copy_from_slice(&bytes[..length]);
        mask
    }

    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Get the value of the bit at `index`. Bits past the end read as unset.
    pub fn bit(&self, index: u32) -> bool {
        let byte_index = (index / 8) as usize;
        match self.mask.get(byte_index) {
            Some(byte) => byte & (1 << (index % 8)) != 0,
            None => false,
        }
    }

    /// Set the bit at `index`, ignoring indices past the end
    pub fn set_bit(&mut self, index: u32, value: bool) {
        if index >= self.bit_count {
            return;
        }
        let byte = &mut self.mask[(index / 8) as usize];
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }

    /// Read `count` (at most 32) bits starting at `start`, least significant first
    pub fn bits(&self, start: u32, count: u32) -> u32 {
        (0..count).fold(0, |value, offset| {
            if self.bit(start + offset) {
                value | (1 << offset)
            } else {
                value
            }
        })
    }

    pub fn set_bits(&mut self, start: u32, count: u32, value: u32) {
        for offset in 0..count {
            self.set_bit(start + offset, (value >> offset) & 1 == 1);
        }
    }

    /// Whether any of `count` bits starting at `start` is set
    pub fn any_in_range(&self, start: u32, count: u32) -> bool {
        (start..start + count).any(|index| self.bit(index))
    }

    /// Clear the whole ChangeMask
    pub fn clear(&mut self) {
        self.mask.iter_mut().for_each(|byte| *byte = 0);
    }

    /// Returns whether no bits are set
    pub fn is_clear(&self) -> bool {
        self.mask.iter().all(|byte| *byte == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mask
    }

    pub fn byte_len(&self) -> usize {
        self.mask.len()
    }
}

impl fmt::Debug for ChangeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = (0..self.bit_count)
            .map(|index| if self.bit(index) { '1' } else { '0' })
            .collect();
        write!(f, "ChangeMask({})", bits)
    }
}
