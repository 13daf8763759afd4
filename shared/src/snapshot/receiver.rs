use log::error;

use crate::{
    connection::connection::{Connection, DisconnectReason},
    snapshot::{
        deserializer::{ReceivedSnapshot, SnapshotDeserializer},
        history::GhostSnapshotStore,
    },
};

/// Client-side entry point for snapshot packets. A snapshot that cannot be
/// read disconnects the connection it arrived on.
pub struct SnapshotReceiver<'p> {
    deserializer: SnapshotDeserializer<'p>,
}

impl<'p> SnapshotReceiver<'p> {
    pub fn new(deserializer: SnapshotDeserializer<'p>) -> Self {
        Self { deserializer }
    }

    pub fn receive(
        &self,
        connection: &mut Connection,
        store: &mut GhostSnapshotStore,
        packet: &[u8],
    ) -> Option<ReceivedSnapshot> {
        if connection.is_disconnected() {
            return None;
        }
        match self.deserializer.read_packet(packet, store) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                error!(
                    "Invalid snapshot from connection {:?}: {}. Disconnecting",
                    connection.id(),
                    err
                );
                connection.disconnect(DisconnectReason::InvalidSnapshot);
                None
            }
        }
    }
}
