pub mod ghost_collection;
pub mod ghost_type;
