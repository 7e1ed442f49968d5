use async_trait::async_trait;

use crate::engine::EngineHandle;
use crate::protocol::{AckResult, ScanRequest};

/// A persistence engine as the dispatcher sees it: one call that resolves
/// with the start-acknowledgment. Where the engine runs is opaque.
#[async_trait]
pub trait PersistenceEngine: Send + Sync {
    async fn query(&self, request: ScanRequest) -> AckResult;

    /// Requests cancellation of the scan feeding `channel_handle`.
    async fn cancel(&self, channel_handle: &str) -> bool;
}

#[async_trait]
impl PersistenceEngine for EngineHandle {
    async fn query(&self, request: ScanRequest) -> AckResult {
        EngineHandle::query(self, request).await
    }

    async fn cancel(&self, channel_handle: &str) -> bool {
        EngineHandle::cancel(self, channel_handle).await
    }
}
