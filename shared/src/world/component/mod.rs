pub mod buffer_serializer;
pub mod change_mask;
pub mod component_kinds;
pub mod component_serializer;
pub mod error;
pub mod field_serializer;
pub mod ghost_component;
pub mod ghost_field;
pub mod snapshot_slot;
