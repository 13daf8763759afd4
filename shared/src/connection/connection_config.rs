/// Contains Config properties which will be used by a Server or Client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Capacity in bytes of a reliable packet carrying RPCs
    pub rpc_packet_capacity: usize,
    /// Capacity in bytes of an unreliable packet carrying a snapshot
    pub snapshot_packet_capacity: usize,
    /// Number of snapshots kept per ghost, both for baselines and interpolation
    pub snapshot_history_size: usize,
    /// Capacity in bytes of the dynamic data region of one ghost snapshot
    pub dynamic_data_capacity: usize,
    /// Consecutive deferred RPC flushes before a warning is logged
    pub deferral_warning_threshold: u32,
    /// Number of connections serialized in parallel
    pub snapshot_workers: usize,
}

impl ConnectionConfig {
    /// Creates a new ConnectionConfig, used to initialize a Connection
    pub fn new(
        rpc_packet_capacity: usize,
        snapshot_packet_capacity: usize,
        snapshot_history_size: usize,
        dynamic_data_capacity: usize,
    ) -> Self {
        Self {
            rpc_packet_capacity,
            snapshot_packet_capacity,
            snapshot_history_size,
            dynamic_data_capacity,
            ..Self::default()
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            rpc_packet_capacity: 1400,
            snapshot_packet_capacity: 1200,
            snapshot_history_size: 32,
            dynamic_data_capacity: 16 * 1024,
            deferral_warning_threshold: 10,
            snapshot_workers: 4,
        }
    }
}
