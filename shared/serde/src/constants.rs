/// Default capacity of a single outgoing packet
pub const MTU_SIZE_BYTES: usize = 1200;
pub const MTU_SIZE_BITS: u32 = (MTU_SIZE_BYTES as u32) * 8;
