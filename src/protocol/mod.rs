pub mod ack;
pub mod errors;
pub mod frame;
pub mod message;
pub mod request;


pub use ack::AckResult;
pub use errors::{DispatchCause, QueryError};
pub use message::BatchMessage;
pub use request::{QueryRequest, ScanRequest};
