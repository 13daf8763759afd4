use crate::BitWrite;

/// A BitWrite implementation without a capacity limit. Used to stage RPC
/// payloads and the per-connection outgoing RPC stream, which are sliced into
/// packets later.
///
/// Produces the same byte layout as [`BitWriter`](crate::BitWriter).
pub struct StreamWriter {
    buffer: Vec<u8>,
    bits_written: u32,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
            bits_written: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn length_in_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.bits_written = 0;
    }
}

impl Default for StreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for StreamWriter {
    fn write_bit(&mut self, bit: bool) {
        let index = self.bits_written as usize;
        if index / 8 == self.buffer.len() {
            self.buffer.push(0);
        }
        if bit {
            self.buffer[index / 8] |= 1 << (index % 8);
        }
        self.bits_written += 1;
    }

    fn bits_written(&self) -> u32 {
        self.bits_written
    }
}
