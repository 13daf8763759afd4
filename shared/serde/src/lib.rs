//! # Netcode Serde
//! Bit-level packed serialization shared by the snapshot and RPC wire formats.

mod bit_reader;
mod bit_writer;
mod compression_model;
mod constants;
mod error;
mod serde;
mod stream_writer;

pub use bit_reader::BitReader;
pub use bit_writer::{BitWrite, BitWriter};
pub use compression_model::{
    zigzag_decode, zigzag_encode, CompressionModel, BUCKET_COUNT, MAX_CODE_LENGTH,
};
pub use constants::{MTU_SIZE_BITS, MTU_SIZE_BYTES};
pub use error::{CompressionModelError, SerdeErr};
pub use serde::{ConstBitLength, Serde};
pub use stream_writer::StreamWriter;
