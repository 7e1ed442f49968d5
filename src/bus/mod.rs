pub mod errors;
pub mod message_bus;
pub mod receiver;
pub mod sink;


pub use errors::BusError;
pub use message_bus::MessageBus;
pub use receiver::{BatchReceiver, StreamOutcome};
pub use sink::BatchSink;
