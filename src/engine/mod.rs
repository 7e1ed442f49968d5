pub mod emitter;
pub mod event;
pub mod executor;
pub mod store;


pub use emitter::{BatchEmitter, EmitReport, EmitterState};
pub use event::SensorEvent;
pub use executor::{EngineHandle, EngineSettings, QueryEngine};
pub use store::{EventScan, EventStore, MemoryStore, StoreError, TieredStore};
