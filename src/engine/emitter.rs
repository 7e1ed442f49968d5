use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BatchSink, BusError};
use crate::engine::store::EventScan;
use crate::protocol::BatchMessage;

const LOG_TARGET: &str = "pulse::engine::emitter";

/// Description carried by the terminal message of a cancelled query.
pub const CANCELLED: &str = "query cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    Scanning,
    Completed,
    Aborted,
}

/// What one emitter run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReport {
    pub state: EmitterState,
    /// Non-terminal `Batch` messages delivered.
    pub batches_sent: usize,
    /// Events delivered across `Batch` and `FinalBatch` messages.
    pub events_sent: usize,
    /// False when the subscriber vanished and no terminal message got through.
    pub terminal_delivered: bool,
}

/// Turns one scan into the batch stream of one channel handle.
///
/// Events are grouped into batches of exactly `batch_size` and published as
/// soon as a group is full; whatever remains when the scan ends (possibly
/// nothing) goes out as the `FinalBatch`. Any scan fault or a cancellation
/// ends the stream with a single `Aborted` message instead.
pub struct BatchEmitter<E> {
    channel_handle: String,
    batch_size: NonZeroUsize,
    sink: Arc<dyn BatchSink<E>>,
    cancel: CancellationToken,
    state: EmitterState,
    batches_sent: usize,
    events_sent: usize,
}

impl<E: Send + 'static> BatchEmitter<E> {
    pub fn new(
        channel_handle: impl Into<String>,
        batch_size: NonZeroUsize,
        sink: Arc<dyn BatchSink<E>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channel_handle: channel_handle.into(),
            batch_size,
            sink,
            cancel,
            state: EmitterState::Scanning,
            batches_sent: 0,
            events_sent: 0,
        }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub async fn run(mut self, mut scan: EventScan<E>) -> EmitReport {
        let size = self.batch_size.get();
        let cancel = self.cancel.clone();
        let mut pending = Vec::with_capacity(size);

        debug!(
            target: LOG_TARGET,
            channel_handle = %self.channel_handle,
            batch_size = size,
            "Scan started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abort(CANCELLED.to_string()).await,
                next = scan.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    pending.push(event);
                    if pending.len() == size {
                        let batch = std::mem::replace(&mut pending, Vec::with_capacity(size));
                        if let Err(e) = self.send(BatchMessage::Batch(batch)).await {
                            return self.abandon(e);
                        }
                    }
                }
                Some(Err(e)) => return self.abort(e.to_string()).await,
                None => return self.complete(pending).await,
            }
        }
    }

    async fn send(&mut self, message: BatchMessage<E>) -> Result<(), BusError> {
        let events = message.len();
        let counts_as_batch = !message.is_terminal();
        self.sink.publish(&self.channel_handle, message).await?;
        if counts_as_batch {
            self.batches_sent += 1;
        }
        self.events_sent += events;
        Ok(())
    }

    async fn complete(mut self, remainder: Vec<E>) -> EmitReport {
        if let Err(e) = self.send(BatchMessage::FinalBatch(remainder)).await {
            return self.abandon(e);
        }
        self.state = EmitterState::Completed;
        info!(
            target: LOG_TARGET,
            channel_handle = %self.channel_handle,
            batches = self.batches_sent,
            events = self.events_sent,
            "Query completed"
        );
        self.report(true)
    }

    async fn abort(mut self, description: String) -> EmitReport {
        self.state = EmitterState::Aborted;
        warn!(
            target: LOG_TARGET,
            channel_handle = %self.channel_handle,
            batches = self.batches_sent,
            reason = %description,
            "Query aborted"
        );
        let delivered = self
            .sink
            .publish(&self.channel_handle, BatchMessage::Aborted(description))
            .await
            .is_ok();
        self.report(delivered)
    }

    /// The subscriber is gone; nothing more can be delivered.
    fn abandon(mut self, error: BusError) -> EmitReport {
        self.state = EmitterState::Aborted;
        warn!(
            target: LOG_TARGET,
            channel_handle = %self.channel_handle,
            error = %error,
            "Channel abandoned, stopping scan"
        );
        self.report(false)
    }

    fn report(&self, terminal_delivered: bool) -> EmitReport {
        EmitReport {
            state: self.state,
            batches_sent: self.batches_sent,
            events_sent: self.events_sent,
            terminal_delivered,
        }
    }
}
