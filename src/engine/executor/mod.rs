pub mod context;
pub mod message;
pub mod types;
pub mod worker;


pub use message::EngineMessage;
pub use types::{EngineHandle, EngineSettings, QueryEngine};
