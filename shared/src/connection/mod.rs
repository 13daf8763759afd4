pub mod connection;
pub mod connection_config;
pub mod error;
pub mod message_type;
pub mod packet_header;
