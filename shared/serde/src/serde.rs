use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr};

/// A type that can write itself into, and be read back from, a bit stream
pub trait Serde: Sized + Clone + PartialEq {
    fn ser(&self, writer: &mut dyn BitWrite);

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;

    /// Number of bits `ser` would write
    fn bit_length(&self) -> u32;
}

/// A type whose encoding always takes the same number of bits
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}

// Lengths are written 7 bits at a time, each group followed by a continue bit.
const LENGTH_GROUP_BITS: u32 = 7;

fn write_length(writer: &mut dyn BitWrite, length: usize) {
    let mut remaining = length as u64;
    loop {
        let group = (remaining & 0x7F) as u32;
        remaining >>= LENGTH_GROUP_BITS;
        writer.write_bits(group, LENGTH_GROUP_BITS);
        writer.write_bit(remaining != 0);
        if remaining == 0 {
            break;
        }
    }
}

fn read_length(reader: &mut BitReader) -> Result<usize, SerdeErr> {
    let mut length: u64 = 0;
    let mut shift = 0;
    loop {
        let group = u64::from(reader.read_bits(LENGTH_GROUP_BITS)?);
        if shift >= 64 {
            return Err(SerdeErr);
        }
        length |= group << shift;
        shift += LENGTH_GROUP_BITS;
        if !reader.read_bit()? {
            break;
        }
    }
    usize::try_from(length).map_err(|_| SerdeErr)
}

fn length_bit_length(length: usize) -> u32 {
    let mut groups = 1;
    let mut remaining = (length as u64) >> LENGTH_GROUP_BITS;
    while remaining != 0 {
        groups += 1;
        remaining >>= LENGTH_GROUP_BITS;
    }
    groups * (LENGTH_GROUP_BITS + 1)
}

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

macro_rules! impl_serde_for_narrow_int {
    ($type:ty, $unsigned:ty, $bits:expr) => {
        impl Serde for $type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bits(u32::from(*self as $unsigned), $bits);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                Ok(reader.read_bits($bits)? as $unsigned as $type)
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $type {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_for_narrow_int!(u8, u8, 8);
impl_serde_for_narrow_int!(i8, u8, 8);
impl_serde_for_narrow_int!(u16, u16, 16);
impl_serde_for_narrow_int!(i16, u16, 16);
impl_serde_for_narrow_int!(u32, u32, 32);
impl_serde_for_narrow_int!(i32, u32, 32);

impl Serde for u64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(*self as u32, 32);
        writer.write_bits((*self >> 32) as u32, 32);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let low = u64::from(reader.read_bits(32)?);
        let high = u64::from(reader.read_bits(32)?);
        Ok(low | (high << 32))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl ConstBitLength for u64 {
    fn const_bit_length() -> u32 {
        64
    }
}

impl Serde for i64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        (*self as u64).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(u64::de(reader)? as i64)
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl ConstBitLength for i64 {
    fn const_bit_length() -> u32 {
        64
    }
}

impl Serde for f32 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.to_bits(), 32);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f32::from_bits(reader.read_bits(32)?))
    }

    fn bit_length(&self) -> u32 {
        32
    }
}

impl ConstBitLength for f32 {
    fn const_bit_length() -> u32 {
        32
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        1 + self.as_ref().map_or(0, Serde::bit_length)
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        write_length(writer, self.len());
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = read_length(reader)?;
        // every item takes at least one bit, a bigger length is malformed
        if length > reader.bits_remaining() as usize {
            return Err(SerdeErr);
        }
        let mut output = Vec::with_capacity(length);
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }

    fn bit_length(&self) -> u32 {
        length_bit_length(self.len()) + self.iter().map(Serde::bit_length).sum::<u32>()
    }
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        write_length(writer, self.len());
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = read_length(reader)?;
        if length.saturating_mul(8) > reader.bits_remaining() as usize {
            return Err(SerdeErr);
        }
        let mut bytes = vec![0; length];
        reader.read_bytes(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| SerdeErr)
    }

    fn bit_length(&self) -> u32 {
        length_bit_length(self.len()) + (self.len() as u32) * 8
    }
}
