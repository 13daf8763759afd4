use std::any::TypeId;

use crate::world::component::{
    ghost_field::{GhostField, GhostSendType},
    snapshot_slot::{SnapshotInterpolation, SnapshotSlotMut},
};

/// A replicated component, or the element type of a replicated buffer.
///
/// `FIELDS` is the schema of the component's snapshot: each field takes one
/// 32-bit word, in declaration order. `copy_to_snapshot` and
/// `copy_from_snapshot` translate between the live value and that schema.
pub trait GhostComponent: Clone + Default + Send + Sync + 'static {
    /// Stable name, hashed to identify the component on the wire
    const NAME: &'static str;
    const FIELDS: &'static [GhostField];
    const SEND_TYPE: GhostSendType = GhostSendType::All;

    fn copy_to_snapshot(&self, snapshot: &mut SnapshotSlotMut);

    fn copy_from_snapshot(&mut self, snapshot: &SnapshotInterpolation);
}

/// ComponentKind - should be one unique value for each type of Component
#[derive(Eq, Hash, Copy, Clone, PartialEq, Debug)]
pub struct ComponentKind {
    type_id: TypeId,
}

impl From<TypeId> for ComponentKind {
    fn from(type_id: TypeId) -> Self {
        Self { type_id }
    }
}

impl ComponentKind {
    pub fn of<C: 'static>() -> Self {
        Self::from(TypeId::of::<C>())
    }
}
