use std::{any::Any, collections::HashMap};

use crate::{
    types::{ConnectionId, GhostId, GhostTypeIndex},
    world::component::ghost_component::{ComponentKind, GhostComponent},
};

/// Read access to a chunk of entities that share one ghost type, as handed
/// out by the host entity storage.
///
/// Component columns are `Vec<C>`, buffer columns `Vec<Vec<E>>`, both with
/// one entry per entity in array order.
pub trait GhostChunk: Send + Sync {
    fn ghost_type(&self) -> GhostTypeIndex;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ghost_id(&self, index: usize) -> Option<GhostId>;

    /// Connection owning every entity of the chunk, if any
    fn owner(&self) -> Option<ConnectionId>;

    fn column(&self, kind: &ComponentKind) -> Option<&dyn Any>;
}

/// Write access to a chunk's component values. The chunk's structure (its
/// entities and columns) is never changed through it.
pub trait GhostChunkMut: GhostChunk {
    fn column_mut(&mut self, kind: &ComponentKind) -> Option<&mut dyn Any>;
}

/// Column storage implementing `GhostChunk`, for hosts without their own
/// archetype storage and for tests
pub struct ChunkData {
    ghost_type: GhostTypeIndex,
    ghost_ids: Vec<GhostId>,
    owner: Option<ConnectionId>,
    columns: HashMap<ComponentKind, Box<dyn Any + Send + Sync>>,
}

impl ChunkData {
    pub fn new(ghost_type: GhostTypeIndex, ghost_ids: Vec<GhostId>) -> Self {
        Self {
            ghost_type,
            ghost_ids,
            owner: None,
            columns: HashMap::new(),
        }
    }

    pub fn with_owner(mut self, owner: ConnectionId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_component<C: GhostComponent>(mut self, values: Vec<C>) -> Self {
        self.columns.insert(ComponentKind::of::<C>(), Box::new(values));
        self
    }

    pub fn with_buffer<E: GhostComponent>(mut self, buffers: Vec<Vec<E>>) -> Self {
        self.columns.insert(ComponentKind::of::<E>(), Box::new(buffers));
        self
    }

    pub fn components<C: GhostComponent>(&self) -> Option<&Vec<C>> {
        self.columns.get(&ComponentKind::of::<C>())?.downcast_ref()
    }

    pub fn components_mut<C: GhostComponent>(&mut self) -> Option<&mut Vec<C>> {
        self.columns.get_mut(&ComponentKind::of::<C>())?.downcast_mut()
    }

    pub fn buffers<E: GhostComponent>(&self) -> Option<&Vec<Vec<E>>> {
        self.columns.get(&ComponentKind::of::<E>())?.downcast_ref()
    }

    pub fn buffers_mut<E: GhostComponent>(&mut self) -> Option<&mut Vec<Vec<E>>> {
        self.columns.get_mut(&ComponentKind::of::<E>())?.downcast_mut()
    }
}

impl GhostChunk for ChunkData {
    fn ghost_type(&self) -> GhostTypeIndex {
        self.ghost_type
    }

    fn len(&self) -> usize {
        self.ghost_ids.len()
    }

    fn ghost_id(&self, index: usize) -> Option<GhostId> {
        self.ghost_ids.get(index).copied()
    }

    fn owner(&self) -> Option<ConnectionId> {
        self.owner
    }

    fn column(&self, kind: &ComponentKind) -> Option<&dyn Any> {
        self.columns.get(kind).map(|column| &**column as &dyn Any)
    }
}

impl GhostChunkMut for ChunkData {
    fn column_mut(&mut self, kind: &ComponentKind) -> Option<&mut dyn Any> {
        self.columns
            .get_mut(kind)
            .map(|column| &mut **column as &mut dyn Any)
    }
}
