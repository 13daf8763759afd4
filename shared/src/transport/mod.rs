pub mod channel;
pub mod error;
