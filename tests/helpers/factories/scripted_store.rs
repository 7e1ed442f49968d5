use crate::engine::store::{EventScan, EventStore, StoreError};
use crate::protocol::ScanRequest;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Store whose scans replay a fixed script of events and faults.
#[derive(Clone)]
pub struct ScriptedStore {
    items: Vec<Result<u32, StoreError>>,
    refuse: Option<StoreError>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    opened: Arc<AtomicUsize>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            refuse: None,
            delay: None,
            gate: None,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Events `0..count`.
    pub fn with_events(mut self, count: u32) -> Self {
        self.items = (0..count).map(Ok).collect();
        self
    }

    /// Events `0..before`, then a read fault.
    pub fn failing_after(mut self, before: u32, reason: &str) -> Self {
        self.items = (0..before).map(Ok).collect();
        self.items.push(Err(StoreError::Read(reason.to_string())));
        self.items.push(Ok(before));
        self
    }

    pub fn refusing(mut self, error: StoreError) -> Self {
        self.refuse = Some(error);
        self
    }

    /// Pause before every event.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold `open_scan` until the returned notify is signalled.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for ScriptedStore {
    type Event = u32;

    async fn open_scan(&self, _request: &ScanRequest) -> Result<EventScan<u32>, StoreError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }
        let delay = self.delay;
        let scan = futures::stream::iter(self.items.clone()).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(scan.boxed())
    }
}
