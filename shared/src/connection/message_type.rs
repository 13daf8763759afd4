// The kind of payload a packet carries, always its first byte

use netcode_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum MessageType {
    // Reliable packet carrying the protocol version handshake and RPCs
    Rpc,
    // Unreliable packet carrying one tick's ghost snapshots
    Snapshot,
    // Sent by the client to acknowledge a snapshot tick
    SnapshotAck,
}

impl MessageType {
    /// Inspect the message type of a raw packet without consuming it
    pub fn peek(packet: &[u8]) -> Result<Self, SerdeErr> {
        Self::de(&mut BitReader::new(packet))
    }
}

impl Serde for MessageType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let value: u8 = match self {
            MessageType::Rpc => 0,
            MessageType::Snapshot => 1,
            MessageType::SnapshotAck => 2,
        };
        value.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match u8::de(reader)? {
            0 => Ok(MessageType::Rpc),
            1 => Ok(MessageType::Snapshot),
            2 => Ok(MessageType::SnapshotAck),
            // unknown message type
            _ => Err(SerdeErr),
        }
    }

    fn bit_length(&self) -> u32 {
        <u8 as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for MessageType {
    fn const_bit_length() -> u32 {
        <u8 as ConstBitLength>::const_bit_length()
    }
}
