pub mod recording_sink;
pub mod request_factory;
pub mod scripted_store;
pub mod sensor_event_factory;

pub use recording_sink::RecordingSink;
pub use request_factory::RequestFactory;
pub use scripted_store::ScriptedStore;
pub use sensor_event_factory::SensorEventFactory;
