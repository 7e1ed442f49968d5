use std::sync::Arc;

use tracing::info;

use crate::bus::{BatchSink, MessageBus};
use crate::engine::{EngineHandle, EngineSettings, MemoryStore, QueryEngine, SensorEvent};
use crate::shared::config::CONFIG;

/// What a frontend connection needs: the engine to submit queries to and the
/// bus the engine publishes batch streams on.
pub struct FrontendContext<E> {
    pub engine: EngineHandle,
    pub bus: Arc<MessageBus<E>>,
}

impl<E> FrontendContext<E> {
    pub fn new(engine: EngineHandle, bus: Arc<MessageBus<E>>) -> Arc<Self> {
        Arc::new(Self { engine, bus })
    }
}

impl FrontendContext<SensorEvent> {
    pub async fn from_config() -> anyhow::Result<Arc<Self>> {
        let store = MemoryStore::new();
        if let Some(path) = CONFIG.seed_path() {
            store.load_jsonl(path).await?;
        }
        info!(target: "pulse::frontend", events = store.len(), "Memory store ready");

        let bus: Arc<MessageBus<SensorEvent>> =
            Arc::new(MessageBus::new(CONFIG.bus.channel_capacity));
        let sink: Arc<dyn BatchSink<SensorEvent>> = bus.clone();
        let engine =
            QueryEngine::spawn(Arc::new(store), sink, EngineSettings::from_config(&CONFIG));

        Ok(Self::new(engine, bus))
    }
}
