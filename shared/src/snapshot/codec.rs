//! Typed access to snapshot records and dynamic data regions. Every byte
//! offset into a snapshot goes through here; offsets come from `layout`.

/// Read a little endian u32 at `offset`.
///
/// Panics if `offset + 4` is past the end of `bytes`.
pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let word = &bytes[offset..offset + 4];
    u32::from_le_bytes([word[0], word[1], word[2], word[3]])
}

/// Write a little endian u32 at `offset`.
///
/// Panics if `offset + 4` is past the end of `bytes`.
pub fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    read_u32(bytes, offset) as i32
}

pub fn write_i32(bytes: &mut [u8], offset: usize, value: i32) {
    write_u32(bytes, offset, value as u32);
}

/// The `index`th 32-bit word
pub fn read_word(bytes: &[u8], index: usize) -> u32 {
    read_u32(bytes, index * 4)
}

pub fn write_word(bytes: &mut [u8], index: usize, value: u32) {
    write_u32(bytes, index * 4, value);
}

/// Read a buffer slot of a snapshot record: `(length, dynamic_offset)`
pub fn read_buffer_slot(record: &[u8], offset: usize) -> (usize, usize) {
    (
        read_u32(record, offset) as usize,
        read_u32(record, offset + 4) as usize,
    )
}

pub fn write_buffer_slot(record: &mut [u8], offset: usize, length: usize, dynamic_offset: usize) {
    write_u32(record, offset, length as u32);
    write_u32(record, offset + 4, dynamic_offset as u32);
}
