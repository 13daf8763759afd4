use netcode_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

use crate::connection::message_type::MessageType;

/// Header of every reliable packet: `[MessageType:u8][LocalTimeMS:u32][RemoteTimeMS:u32]`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RpcPacketHeader {
    pub message_type: MessageType,
    /// Sender clock when the packet was built
    pub local_time_ms: u32,
    /// Last `local_time_ms` the sender received from us
    pub remote_time_ms: u32,
}

impl RpcPacketHeader {
    pub fn new(local_time_ms: u32, remote_time_ms: u32) -> Self {
        Self {
            message_type: MessageType::Rpc,
            local_time_ms,
            remote_time_ms,
        }
    }
}

impl Serde for RpcPacketHeader {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.message_type.ser(writer);
        self.local_time_ms.ser(writer);
        self.remote_time_ms.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let message_type = MessageType::de(reader)?;
        let local_time_ms = u32::de(reader)?;
        let remote_time_ms = u32::de(reader)?;
        Ok(Self {
            message_type,
            local_time_ms,
            remote_time_ms,
        })
    }

    fn bit_length(&self) -> u32 {
        <Self as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for RpcPacketHeader {
    fn const_bit_length() -> u32 {
        <MessageType as ConstBitLength>::const_bit_length()
            + <u32 as ConstBitLength>::const_bit_length() * 2
    }
}
