use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc::{Sender, channel};
use tracing::{debug, warn};

use crate::bus::errors::BusError;
use crate::bus::receiver::BatchReceiver;
use crate::bus::sink::BatchSink;
use crate::protocol::BatchMessage;

const LOG_TARGET: &str = "pulse::bus";

pub(crate) type Routes<E> = DashMap<String, Sender<BatchMessage<E>>>;

/// In-process message bus with dynamically named addresses.
///
/// Every subscription is a bounded channel, so a publisher to a slow
/// subscriber waits instead of buffering without limit. A route is dropped as
/// soon as a terminal message has been delivered through it; later publishes
/// to the same handle fail with `NoSubscriber`. Dropping a receiver drops its
/// route as well.
pub struct MessageBus<E> {
    routes: Arc<Routes<E>>,
    channel_capacity: usize,
}

impl<E: Send + 'static> MessageBus<E> {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Registers the caller as the only consumer of `channel_handle`.
    ///
    /// A handle whose previous receiver was dropped can be reused.
    pub fn subscribe(&self, channel_handle: &str) -> Result<BatchReceiver<E>, BusError> {
        let (tx, rx) = channel(self.channel_capacity);
        let route = tx.downgrade();
        match self.routes.entry(channel_handle.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_closed() {
                    return Err(BusError::HandleInUse(channel_handle.to_string()));
                }
                occupied.insert(tx);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(tx);
            }
        }
        debug!(target: LOG_TARGET, channel_handle, "Subscribed");
        Ok(BatchReceiver::new(
            channel_handle.to_string(),
            rx,
            route,
            Arc::downgrade(&self.routes),
        ))
    }

    pub fn is_active(&self, channel_handle: &str) -> bool {
        self.routes
            .get(channel_handle)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Drops the route without a terminal message. The receiver observes the
    /// end of the stream as a disconnection.
    pub fn close(&self, channel_handle: &str) -> bool {
        let removed = self.routes.remove(channel_handle).is_some();
        if removed {
            debug!(target: LOG_TARGET, channel_handle, "Route closed");
        }
        removed
    }

    pub fn active_routes(&self) -> usize {
        self.routes.iter().filter(|route| !route.is_closed()).count()
    }

    /// Routes still registered, live or not.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub async fn send(&self, channel_handle: &str, message: BatchMessage<E>) -> Result<(), BusError> {
        // Clone the sender so no map guard is held across the await.
        let tx = self
            .routes
            .get(channel_handle)
            .map(|route| route.value().clone())
            .ok_or_else(|| BusError::NoSubscriber(channel_handle.to_string()))?;

        let terminal = message.is_terminal();
        if tx.send(message).await.is_err() {
            warn!(target: LOG_TARGET, channel_handle, "Subscriber dropped, discarding route");
            self.remove_route(channel_handle, &tx);
            return Err(BusError::Closed(channel_handle.to_string()));
        }
        if terminal {
            self.remove_route(channel_handle, &tx);
        }
        Ok(())
    }

    fn remove_route(&self, channel_handle: &str, tx: &Sender<BatchMessage<E>>) {
        // Only remove the route we published through; the handle may have
        // been re-subscribed in the meantime.
        self.routes
            .remove_if(channel_handle, |_, current| current.same_channel(tx));
    }
}

#[async_trait]
impl<E: Send + 'static> BatchSink<E> for MessageBus<E> {
    async fn publish(&self, channel_handle: &str, message: BatchMessage<E>) -> Result<(), BusError> {
        self.send(channel_handle, message).await
    }
}
