pub mod chunk;
pub mod component;
pub mod ghost;
