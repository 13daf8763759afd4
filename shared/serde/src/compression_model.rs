use crate::error::CompressionModelError;

pub const BUCKET_COUNT: usize = 16;
pub const MAX_CODE_LENGTH: u8 = 15;

// Number of raw offset bits written after each bucket's prefix code. The last
// bucket covers the remainder of the u32 range.
const BUCKET_SIZES: [u8; BUCKET_COUNT] = [0, 0, 1, 2, 3, 4, 6, 8, 10, 12, 15, 18, 21, 24, 27, 32];

// Small values dominate delta streams, so the first buckets get the shortest codes.
const DEFAULT_CODE_LENGTHS: [u8; BUCKET_COUNT] = [2, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6, 6, 6, 6, 6, 6];

/// Describes how packed integers are laid out in the bit stream.
///
/// A value is first mapped to one of 16 buckets, the bucket index is written
/// with a canonical prefix code, then the value's offset inside the bucket is
/// written as `bucket_size` raw bits. Both peers must use the same model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionModel {
    bucket_offsets: [u32; BUCKET_COUNT],
    code_lengths: [u8; BUCKET_COUNT],
    codes: [u16; BUCKET_COUNT],
    length_counts: [u16; MAX_CODE_LENGTH as usize + 1],
    sorted_buckets: [u8; BUCKET_COUNT],
    max_code_length: u8,
}

impl CompressionModel {
    /// Build a model from per-bucket prefix code lengths. The lengths must
    /// describe a complete prefix code, otherwise some bit patterns would be
    /// undecodable.
    pub fn new(code_lengths: [u8; BUCKET_COUNT]) -> Result<Self, CompressionModelError> {
        let mut max_code_length = 0;
        for (bucket, length) in code_lengths.iter().enumerate() {
            if *length == 0 || *length > MAX_CODE_LENGTH {
                return Err(CompressionModelError::InvalidCodeLength {
                    bucket,
                    length: *length,
                    max: MAX_CODE_LENGTH,
                });
            }
            max_code_length = max_code_length.max(*length);
        }

        let expected = 1u32 << max_code_length;
        let sum: u32 = code_lengths
            .iter()
            .map(|length| 1u32 << (max_code_length - length))
            .sum();
        if sum != expected {
            return Err(CompressionModelError::IncompletePrefixCode { sum, expected });
        }

        Ok(Self::build(code_lengths))
    }

    fn build(code_lengths: [u8; BUCKET_COUNT]) -> Self {
        let mut bucket_offsets = [0u32; BUCKET_COUNT];
        for bucket in 1..BUCKET_COUNT {
            bucket_offsets[bucket] =
                bucket_offsets[bucket - 1] + (1u32 << BUCKET_SIZES[bucket - 1]);
        }

        let mut length_counts = [0u16; MAX_CODE_LENGTH as usize + 1];
        let mut max_code_length = 0;
        for length in code_lengths {
            length_counts[length as usize] += 1;
            max_code_length = max_code_length.max(length);
        }

        // canonical order: shorter codes first, ties broken by bucket index
        let mut sorted_buckets = [0u8; BUCKET_COUNT];
        let mut next = 0;
        for length in 1..=max_code_length {
            for (bucket, bucket_length) in code_lengths.iter().enumerate() {
                if *bucket_length == length {
                    sorted_buckets[next] = bucket as u8;
                    next += 1;
                }
            }
        }

        let mut codes = [0u16; BUCKET_COUNT];
        let mut code: u16 = 0;
        let mut previous_length = code_lengths[sorted_buckets[0] as usize];
        for bucket in sorted_buckets {
            let length = code_lengths[bucket as usize];
            code <<= length - previous_length;
            codes[bucket as usize] = code;
            code += 1;
            previous_length = length;
        }

        Self {
            bucket_offsets,
            code_lengths,
            codes,
            length_counts,
            sorted_buckets,
            max_code_length,
        }
    }

    /// The bucket a value falls into
    pub fn bucket_of(&self, value: u32) -> usize {
        let mut bucket = BUCKET_COUNT - 1;
        while value < self.bucket_offsets[bucket] {
            bucket -= 1;
        }
        bucket
    }

    pub fn bucket_offset(&self, bucket: usize) -> u32 {
        self.bucket_offsets[bucket]
    }

    pub fn bucket_size(&self, bucket: usize) -> u8 {
        BUCKET_SIZES[bucket]
    }

    /// The prefix code of a bucket, and its length in bits
    pub fn code(&self, bucket: usize) -> (u16, u8) {
        (self.codes[bucket], self.code_lengths[bucket])
    }

    /// Number of bits `value` takes once packed with this model
    pub fn packed_bit_length(&self, value: u32) -> u32 {
        let bucket = self.bucket_of(value);
        u32::from(self.code_lengths[bucket]) + u32::from(BUCKET_SIZES[bucket])
    }

    /// Resolve a prefix code read one bit at a time, most significant bit
    /// first. Returns `None` if `next_bit` runs dry or the pattern is invalid.
    pub fn decode_bucket<F>(&self, mut next_bit: F) -> Option<usize>
    where
        F: FnMut() -> Option<bool>,
    {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for length in 1..=self.max_code_length {
            code |= i32::from(next_bit()?);
            let count = i32::from(self.length_counts[length as usize]);
            if code - first < count {
                return Some(self.sorted_buckets[(index + code - first) as usize] as usize);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        None
    }
}

impl Default for CompressionModel {
    fn default() -> Self {
        Self::build(DEFAULT_CODE_LENGTHS)
    }
}

/// Maps signed values onto unsigned ones so that small magnitudes stay small
pub fn zigzag_encode(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn zigzag_decode(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}
