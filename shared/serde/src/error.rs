use thiserror::Error;

/// The stream did not contain what the reader expected: it ran out of bits,
/// or a decoded value fell outside of its valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Serde error: bit stream is truncated or malformed")]
pub struct SerdeErr;

/// Errors that can occur while building a [`CompressionModel`](crate::CompressionModel)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionModelError {
    /// A bucket was assigned a code length outside of the supported range
    #[error("Bucket {bucket} has code length {length}, code lengths must be between 1 and {max}")]
    InvalidCodeLength { bucket: usize, length: u8, max: u8 },

    /// The code lengths do not describe a complete prefix code
    #[error("Code lengths do not form a complete prefix code (kraft sum {sum} / {expected})")]
    IncompletePrefixCode { sum: u32, expected: u32 },
}
