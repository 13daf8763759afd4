//! Offset and size arithmetic for snapshot records and the dynamic data
//! region. Serialization, deserialization and application all derive their
//! offsets from these functions, so both peers always agree on the layout.

use std::ops::Range;

use cfg_if::cfg_if;

use crate::snapshot::error::SnapshotError;

pub const WORD_SIZE: usize = 4;
pub const WORD_BITS: u32 = 32;

/// Round `bytes` up to the next word boundary
pub const fn align_to_word(bytes: usize) -> usize {
    (bytes + WORD_SIZE - 1) & !(WORD_SIZE - 1)
}

/// Number of 32-bit words holding `bits` mask bits
pub const fn change_mask_words(bits: u32) -> usize {
    ((bits + WORD_BITS - 1) / WORD_BITS) as usize
}

/// Bytes used by the per-element change masks of a buffer,
/// `ceil(change_mask_bits * element_count / 32)` words
pub const fn mask_size_in_bytes(change_mask_bits: u32, element_count: usize) -> usize {
    let bits = change_mask_bits as usize * element_count;
    ((bits + WORD_BITS as usize - 1) / WORD_BITS as usize) * WORD_SIZE
}

/// Size of a buffer's block in the dynamic region: element masks followed by
/// the elements, rounded up to a word
pub const fn buffer_block_size(
    change_mask_bits: u32,
    element_size: usize,
    element_count: usize,
) -> usize {
    align_to_word(mask_size_in_bytes(change_mask_bits, element_count) + element_size * element_count)
}

/// Location of one buffer's data inside a dynamic data region
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DynamicBlock {
    pub offset: usize,
    pub mask_bits: u32,
    pub element_size: usize,
    pub len: usize,
}

impl DynamicBlock {
    pub fn new(offset: usize, mask_bits: u32, element_size: usize, len: usize) -> Self {
        Self {
            offset,
            mask_bits,
            element_size,
            len,
        }
    }

    pub fn mask_size(&self) -> usize {
        mask_size_in_bytes(self.mask_bits, self.len)
    }

    pub fn mask_range(&self) -> Range<usize> {
        self.offset..self.offset + self.mask_size()
    }

    /// All elements, without the masks
    pub fn elements_range(&self) -> Range<usize> {
        let start = self.offset + self.mask_size();
        start..start + self.element_size * self.len
    }

    pub fn element_range(&self, index: usize) -> Range<usize> {
        let start = self.offset + self.mask_size() + self.element_size * index;
        start..start + self.element_size
    }

    /// Offset of the next block
    pub fn end(&self) -> usize {
        self.offset + buffer_block_size(self.mask_bits, self.element_size, self.len)
    }
}

cfg_if! {
    if #[cfg(feature = "unchecked_dynamic_data")] {
        /// Capacity checks are compiled out, the region grows to fit any block
        pub fn check_dynamic_capacity(_block: &DynamicBlock, _capacity: usize) -> Result<(), SnapshotError> {
            Ok(())
        }
    } else {
        /// Make sure a block fits in a dynamic data region of `capacity` bytes
        pub fn check_dynamic_capacity(block: &DynamicBlock, capacity: usize) -> Result<(), SnapshotError> {
            let required = block.end();
            if required > capacity {
                return Err(SnapshotError::DynamicDataOverrun { required, capacity });
            }
            Ok(())
        }
    }
}
