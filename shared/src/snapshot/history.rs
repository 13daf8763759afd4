use std::collections::HashMap;

use log::trace;

use crate::{
    connection::connection_config::ConnectionConfig,
    tick::NetworkTick,
    types::{ConnectionId, GhostId, GhostTypeIndex},
};

/// Maximum number of baselines a snapshot is delta compressed against
pub const MAX_BASELINES: usize = 3;

/// One stored snapshot of a ghost: its fixed-stride record and the dynamic
/// data region its buffer slots point into
#[derive(Clone, Debug, Default)]
pub struct SnapshotEntry {
    pub tick: NetworkTick,
    pub acked: bool,
    pub record: Vec<u8>,
    pub dynamic: Vec<u8>,
}

/// Baselines selected for a snapshot, newest first
#[derive(Clone, Copy, Default)]
pub struct Baselines<'h> {
    entries: [Option<&'h SnapshotEntry>; MAX_BASELINES],
}

impl<'h> Baselines<'h> {
    pub fn new(entries: [Option<&'h SnapshotEntry>; MAX_BASELINES]) -> Self {
        Self { entries }
    }

    pub fn get(&self, index: usize) -> Option<&'h SnapshotEntry> {
        self.entries.get(index).copied().flatten()
    }

    pub fn count(&self) -> usize {
        self.entries.iter().take_while(|entry| entry.is_some()).count()
    }
}

/// Ring buffer of a ghost's snapshots. Once full, the oldest entry is
/// overwritten and its buffers reused.
pub struct SnapshotHistory {
    entries: Vec<SnapshotEntry>,
    capacity: usize,
    write_index: usize,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            write_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a snapshot, replacing an existing entry of the same tick
    pub fn store(&mut self, tick: NetworkTick, record: &[u8], dynamic: &[u8]) {
        let index = match self.entries.iter().position(|entry| entry.tick == tick) {
            Some(index) => index,
            None if self.entries.len() < self.capacity => {
                self.entries.push(SnapshotEntry::default());
                self.entries.len() - 1
            }
            None => {
                let index = self.write_index;
                self.write_index = (self.write_index + 1) % self.capacity;
                index
            }
        };

        let entry = &mut self.entries[index];
        entry.tick = tick;
        entry.acked = false;
        entry.record.clear();
        entry.record.extend_from_slice(record);
        entry.dynamic.clear();
        entry.dynamic.extend_from_slice(dynamic);
    }

    pub fn get(&self, tick: NetworkTick) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| entry.tick == tick)
    }

    /// Mark the entry of `tick` as received by the remote peer
    pub fn acknowledge(&mut self, tick: NetworkTick) -> bool {
        match self.entries.iter_mut().find(|entry| entry.tick == tick) {
            Some(entry) => {
                entry.acked = true;
                true
            }
            None => false,
        }
    }

    /// The newest acknowledged entries strictly older than `tick`, newest first
    pub fn baselines(&self, tick: NetworkTick) -> Baselines<'_> {
        let mut candidates: Vec<&SnapshotEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.acked && entry.tick.is_older_than(tick))
            .collect();
        candidates.sort_by(|a, b| b.tick.ticks_since(a.tick).cmp(&0));

        let mut entries = [None; MAX_BASELINES];
        for (slot, entry) in entries.iter_mut().zip(candidates) {
            *slot = Some(entry);
        }
        Baselines::new(entries)
    }

    /// The newest entry at or before `tick`
    pub fn at_or_before(&self, tick: NetworkTick) -> Option<&SnapshotEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.tick.is_newer_than(tick))
            .max_by(|a, b| a.tick.ticks_since(b.tick).cmp(&0))
    }

    /// The oldest entry strictly after `tick`
    pub fn after(&self, tick: NetworkTick) -> Option<&SnapshotEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.tick.is_newer_than(tick))
            .min_by(|a, b| a.tick.ticks_since(b.tick).cmp(&0))
    }

    pub fn latest(&self) -> Option<&SnapshotEntry> {
        self.entries
            .iter()
            .max_by(|a, b| a.tick.ticks_since(b.tick).cmp(&0))
    }
}

/// Snapshot history of one replicated ghost
pub struct GhostHistory {
    pub ghost_type: GhostTypeIndex,
    pub history: SnapshotHistory,
}

/// Snapshot histories of every ghost replicated over one connection, keyed
/// by ghost id. A history is allocated when a ghost is first stored and
/// retired with `remove_ghost`.
pub struct GhostSnapshotStore {
    ghosts: HashMap<GhostId, GhostHistory>,
    history_size: usize,
}

impl GhostSnapshotStore {
    pub fn new(history_size: usize) -> Self {
        Self {
            ghosts: HashMap::new(),
            history_size,
        }
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn contains(&self, ghost_id: GhostId) -> bool {
        self.ghosts.contains_key(&ghost_id)
    }

    pub fn ghost_type(&self, ghost_id: GhostId) -> Option<GhostTypeIndex> {
        self.ghosts.get(&ghost_id).map(|ghost| ghost.ghost_type)
    }

    pub fn history(&self, ghost_id: GhostId) -> Option<&SnapshotHistory> {
        self.ghosts.get(&ghost_id).map(|ghost| &ghost.history)
    }

    /// History of `ghost_id`, only if it was stored with `ghost_type`
    pub fn history_of_type(
        &self,
        ghost_id: GhostId,
        ghost_type: GhostTypeIndex,
    ) -> Option<&SnapshotHistory> {
        self.ghosts
            .get(&ghost_id)
            .filter(|ghost| ghost.ghost_type == ghost_type)
            .map(|ghost| &ghost.history)
    }

    /// Store a snapshot of `ghost_id`. A ghost stored under another ghost
    /// type before starts over with an empty history.
    pub fn store(
        &mut self,
        ghost_id: GhostId,
        ghost_type: GhostTypeIndex,
        tick: NetworkTick,
        record: &[u8],
        dynamic: &[u8],
    ) {
        let history_size = self.history_size;
        let ghost = self.ghosts.entry(ghost_id).or_insert_with(|| GhostHistory {
            ghost_type,
            history: SnapshotHistory::new(history_size),
        });
        if ghost.ghost_type != ghost_type {
            trace!("Ghost {} changed type, dropping its history", ghost_id);
            ghost.ghost_type = ghost_type;
            ghost.history = SnapshotHistory::new(history_size);
        }
        ghost.history.store(tick, record, dynamic);
    }

    /// Mark every ghost's entry of `tick` as acknowledged
    pub fn acknowledge(&mut self, tick: NetworkTick) -> usize {
        self.ghosts
            .values_mut()
            .map(|ghost| ghost.history.acknowledge(tick))
            .filter(|acked| *acked)
            .count()
    }

    pub fn remove_ghost(&mut self, ghost_id: GhostId) -> bool {
        self.ghosts.remove(&ghost_id).is_some()
    }

    pub fn ghost_ids(&self) -> impl Iterator<Item = GhostId> + '_ {
        self.ghosts.keys().copied()
    }
}

/// Server-side replication state of one connection, owned by the work item
/// serializing that connection's snapshots
pub struct ConnectionGhostState {
    connection: ConnectionId,
    store: GhostSnapshotStore,
    last_acked_tick: Option<NetworkTick>,
}

impl ConnectionGhostState {
    pub fn new(connection: ConnectionId, config: &ConnectionConfig) -> Self {
        Self {
            connection,
            store: GhostSnapshotStore::new(config.snapshot_history_size),
            last_acked_tick: None,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn store(&self) -> &GhostSnapshotStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GhostSnapshotStore {
        &mut self.store
    }

    /// Record that the remote peer received the snapshot of `tick`, making
    /// it eligible as a baseline
    pub fn acknowledge(&mut self, tick: NetworkTick) {
        let acked = self.store.acknowledge(tick);
        trace!(
            "Connection {:?} acknowledged tick {} ({} ghosts)",
            self.connection,
            tick,
            acked
        );
        match self.last_acked_tick {
            Some(last) if !tick.is_newer_than(last) => {}
            _ => self.last_acked_tick = Some(tick),
        }
    }

    pub fn last_acked_tick(&self) -> Option<NetworkTick> {
        self.last_acked_tick
    }

    /// Retire a ghost that is no longer replicated to this connection
    pub fn remove_ghost(&mut self, ghost_id: GhostId) -> bool {
        self.store.remove_ghost(ghost_id)
    }
}
