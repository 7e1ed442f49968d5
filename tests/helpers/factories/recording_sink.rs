use crate::bus::{BatchSink, BusError};
use crate::protocol::BatchMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Sink that keeps every published message, optionally refusing delivery
/// after a number of messages to simulate a consumer that went away.
#[derive(Clone)]
pub struct RecordingSink<E> {
    messages: Arc<Mutex<Vec<(String, BatchMessage<E>)>>>,
    accept: Option<usize>,
}

impl<E: Send + 'static> RecordingSink<E> {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            accept: None,
        }
    }

    pub fn closing_after(mut self, accepted: usize) -> Self {
        self.accept = Some(accepted);
        self
    }

    pub fn messages(&self) -> Vec<BatchMessage<E>>
    where
        E: Clone,
    {
        self.messages.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn handles(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(h, _)| h.clone()).collect()
    }
}

#[async_trait]
impl<E: Send + 'static> BatchSink<E> for RecordingSink<E> {
    async fn publish(&self, channel_handle: &str, message: BatchMessage<E>) -> Result<(), BusError> {
        let mut messages = self.messages.lock();
        if self.accept.is_some_and(|limit| messages.len() >= limit) {
            return Err(BusError::Closed(channel_handle.to_string()));
        }
        messages.push((channel_handle.to_string(), message));
        Ok(())
    }
}
