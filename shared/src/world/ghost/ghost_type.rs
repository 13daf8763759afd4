use crate::world::component::{
    component_kinds::ComponentKinds,
    error::GhostError,
    ghost_component::{ComponentKind, GhostComponent},
};

type RegisterFn = fn(&mut ComponentKinds) -> Result<(), GhostError>;

/// The schema of a replicated entity: its components and buffers, in the
/// order they are laid out in snapshots and serialized on the wire.
#[derive(Clone)]
pub struct GhostType {
    name: &'static str,
    slots: Vec<(ComponentKind, RegisterFn)>,
}

impl GhostType {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Vec::new(),
        }
    }

    pub fn component<C: GhostComponent>(mut self) -> Self {
        self.slots
            .push((ComponentKind::of::<C>(), ComponentKinds::add_component::<C>));
        self
    }

    pub fn buffer<E: GhostComponent>(mut self) -> Self {
        self.slots
            .push((ComponentKind::of::<E>(), ComponentKinds::add_buffer::<E>));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ComponentKind> {
        self.slots.iter().map(|(kind, _)| kind)
    }

    /// Register every component and buffer of this ghost type
    pub(crate) fn register_kinds(&self, kinds: &mut ComponentKinds) -> Result<(), GhostError> {
        for (_, register) in &self.slots {
            register(kinds)?;
        }
        Ok(())
    }
}
