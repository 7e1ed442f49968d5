use async_trait::async_trait;

use crate::bus::errors::BusError;
use crate::protocol::BatchMessage;

/// Publishing side of the transport, as seen by the engine.
#[async_trait]
pub trait BatchSink<E>: Send + Sync {
    /// Delivers one message to a channel handle, waiting while the
    /// subscriber's buffer is full.
    async fn publish(&self, channel_handle: &str, message: BatchMessage<E>) -> Result<(), BusError>;
}
