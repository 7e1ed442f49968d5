use tokio::sync::oneshot;

use crate::protocol::{AckResult, ScanRequest};

pub enum EngineMessage {
    Query {
        request: ScanRequest,
        ack: oneshot::Sender<AckResult>,
    },
    Cancel {
        channel_handle: String,
        completion: oneshot::Sender<bool>,
    },
    /// Sent by a query task when its scan is over, whatever the outcome.
    Finished { channel_handle: String },
    Shutdown {
        completion: oneshot::Sender<()>,
    },
}
