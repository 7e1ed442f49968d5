use async_trait::async_trait;
use tracing::info;

use crate::engine::store::{EventScan, EventStore, StoreError};
use crate::protocol::ScanRequest;

const LOG_TARGET: &str = "pulse::engine::store::tiered";

/// A first-level store (usually a recent-events cache) backed by a
/// second-level store.
///
/// The first level is asked to open the scan; if it refuses, the second level
/// serves it. Once a scan is open it is never switched between tiers.
pub struct TieredStore<F, S> {
    first_level: F,
    second_level: S,
}

impl<F, S> TieredStore<F, S> {
    pub fn new(first_level: F, second_level: S) -> Self {
        Self {
            first_level,
            second_level,
        }
    }

    pub fn first_level(&self) -> &F {
        &self.first_level
    }

    pub fn second_level(&self) -> &S {
        &self.second_level
    }
}

#[async_trait]
impl<F, S, E> EventStore for TieredStore<F, S>
where
    F: EventStore<Event = E>,
    S: EventStore<Event = E>,
    E: Send + 'static,
{
    type Event = E;

    async fn open_scan(&self, request: &ScanRequest) -> Result<EventScan<E>, StoreError> {
        match self.first_level.open_scan(request).await {
            Ok(scan) => {
                info!(target: LOG_TARGET, sensor_id = %request.sensor_id, "Scanning first level storage");
                Ok(scan)
            }
            Err(e) => {
                info!(
                    target: LOG_TARGET,
                    sensor_id = %request.sensor_id,
                    error = %e,
                    "First level storage refused scan, falling back to second level"
                );
                self.second_level.open_scan(request).await
            }
        }
    }
}
