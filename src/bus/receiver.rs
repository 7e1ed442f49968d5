use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc::{Receiver, WeakSender};

use crate::bus::message_bus::Routes;
use crate::protocol::BatchMessage;

/// How a batch stream ended, as seen by its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome<E> {
    /// The terminal `FinalBatch` arrived; all events, in order.
    Completed(Vec<E>),
    /// The scan failed. Events received before the abort are discarded.
    Aborted(String),
    /// The route vanished before any terminal message.
    Disconnected { batches_received: usize },
}

/// Consuming end of one channel handle.
///
/// Yields the delivered messages in order and nothing after the first
/// terminal message. Dropping it unregisters the handle from its bus.
pub struct BatchReceiver<E> {
    channel_handle: String,
    rx: Receiver<BatchMessage<E>>,
    finished: bool,
    route: WeakSender<BatchMessage<E>>,
    routes: Weak<Routes<E>>,
}

impl<E> BatchReceiver<E> {
    pub(crate) fn new(
        channel_handle: String,
        rx: Receiver<BatchMessage<E>>,
        route: WeakSender<BatchMessage<E>>,
        routes: Weak<Routes<E>>,
    ) -> Self {
        Self {
            channel_handle,
            rx,
            finished: false,
            route,
            routes,
        }
    }

    pub fn channel_handle(&self) -> &str {
        &self.channel_handle
    }

    /// True once a terminal message has been handed out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next_message(&mut self) -> Option<BatchMessage<E>> {
        if self.finished {
            return None;
        }
        let message = self.rx.recv().await?;
        if message.is_terminal() {
            self.finish();
        }
        Some(message)
    }

    /// Like `next_message`, but gives up after `timeout`. The protocol has
    /// no heartbeat, so this is how a caller notices a silent engine.
    pub async fn next_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<BatchMessage<E>>, tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.next_message()).await
    }

    /// Drains the stream to its end.
    pub async fn collect(mut self) -> StreamOutcome<E> {
        let mut events = Vec::new();
        let mut batches_received = 0;
        while let Some(message) = self.next_message().await {
            match message {
                BatchMessage::Batch(batch) => {
                    batches_received += 1;
                    events.extend(batch);
                }
                BatchMessage::FinalBatch(batch) => {
                    events.extend(batch);
                    return StreamOutcome::Completed(events);
                }
                BatchMessage::Aborted(description) => return StreamOutcome::Aborted(description),
            }
        }
        StreamOutcome::Disconnected { batches_received }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.rx.close();
    }
}

impl<E> Drop for BatchReceiver<E> {
    fn drop(&mut self) {
        let (Some(routes), Some(own)) = (self.routes.upgrade(), self.route.upgrade()) else {
            return;
        };
        // The handle may already belong to a newer subscription.
        routes.remove_if(&self.channel_handle, |_, current| current.same_channel(&own));
    }
}

impl<E> Stream for BatchReceiver<E> {
    type Item = BatchMessage<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(message)) => {
                if message.is_terminal() {
                    this.finish();
                }
                Poll::Ready(Some(message))
            }
            other => other,
        }
    }
}
