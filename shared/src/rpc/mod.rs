pub mod error;
pub mod protocol_version;
pub mod queue;
pub mod received;
pub mod receiver;
pub mod rpc;
pub mod rpc_collection;
pub mod sender;
