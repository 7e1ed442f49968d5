use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::WeakSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::bus::BatchSink;
use crate::engine::executor::message::EngineMessage;
use crate::engine::executor::types::EngineSettings;
use crate::engine::store::EventStore;

/// State owned by the engine worker task.
pub struct EngineContext<S: EventStore> {
    pub store: Arc<S>,
    pub sink: Arc<dyn BatchSink<S::Event>>,
    pub settings: EngineSettings,
    /// Running scans by channel handle.
    pub active: HashMap<String, CancellationToken>,
    pub shutting_down: bool,
    pub shutdown_waiters: Vec<oneshot::Sender<()>>,
    /// Lets query tasks report back without keeping the mailbox alive.
    pub mailbox: WeakSender<EngineMessage>,
}

impl<S: EventStore> EngineContext<S> {
    pub fn new(
        store: Arc<S>,
        sink: Arc<dyn BatchSink<S::Event>>,
        settings: EngineSettings,
        mailbox: WeakSender<EngineMessage>,
    ) -> Self {
        Self {
            store,
            sink,
            settings,
            active: HashMap::new(),
            shutting_down: false,
            shutdown_waiters: Vec::new(),
            mailbox,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.active.len() < self.settings.max_concurrent_queries
    }
}
