pub mod memory;
pub mod tiered;


use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::protocol::ScanRequest;

pub use memory::MemoryStore;
pub use tiered::TieredStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage read failed: {0}")]
    Read(String),

    #[error("event serialization failed: {0}")]
    Serialization(String),

    #[error("seed file could not be loaded: {0}")]
    Seed(String),
}

/// Events of one scan in natural (timestamp ascending) order. An `Err` item
/// is a fault after the scan started.
pub type EventScan<E> = BoxStream<'static, Result<E, StoreError>>;

/// The storage side of the persistence engine.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    type Event: Send + 'static;

    /// Prepares a scan. Failing here means the query never starts.
    async fn open_scan(&self, request: &ScanRequest) -> Result<EventScan<Self::Event>, StoreError>;
}
