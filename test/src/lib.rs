//! Fixtures shared by the netcode integration tests: a sample protocol with
//! ghost components and RPCs, and an in-memory transport.

pub mod test_protocol;

pub use local_transport::{LocalTransport, SentPacket};
pub use test_protocol::{
    crate_chunk, inventory_chunk, player_chunk, protocol, Chat, Frozen, Health, InventoryItem,
    Ping, PlayerState, SpawnRequest, Translation, Velocity, CRATE, INVENTORY, PLAYER,
};

/// Route `log` output through env_logger, once per test binary
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
