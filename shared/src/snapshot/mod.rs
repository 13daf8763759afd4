pub mod ack;
pub mod applier;
pub mod codec;
pub mod deserializer;
pub mod error;
pub mod history;
pub mod layout;
pub mod prediction_backup;
pub mod predictor;
pub mod receiver;
pub mod serializer;
