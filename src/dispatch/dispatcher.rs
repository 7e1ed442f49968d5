use std::time::Duration;

use tracing::{info, warn};

use crate::dispatch::traits::PersistenceEngine;
use crate::protocol::{AckResult, DispatchCause, QueryError, QueryRequest};
use crate::shared::config::Settings;

const LOG_TARGET: &str = "pulse::dispatch";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub ack_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
        }
    }
}

impl DispatchSettings {
    pub fn from_config(settings: &Settings) -> Self {
        Self {
            ack_timeout: Duration::from_millis(settings.dispatch.ack_timeout_ms),
        }
    }
}

/// Validates queries and forwards them to a persistence engine.
///
/// `query` returns as soon as the engine has accepted or rejected the
/// request; the batches travel separately to the request's channel handle.
/// Nothing is retried here.
pub struct QueryDispatcher<P> {
    engine: P,
    settings: DispatchSettings,
}

impl<P: PersistenceEngine> QueryDispatcher<P> {
    pub fn new(engine: P, settings: DispatchSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &P {
        &self.engine
    }

    /// Resolves with the engine's acknowledgment, or fails with
    /// `InvalidArgument` without contacting the engine.
    pub async fn query(&self, request: &QueryRequest) -> Result<AckResult, QueryError> {
        let scan = request.validate().inspect_err(|e| {
            warn!(
                target: LOG_TARGET,
                channel_handle = %request.channel_handle,
                error = %e,
                "Rejected malformed query"
            );
        })?;

        info!(
            target: LOG_TARGET,
            channel_handle = %scan.channel_handle,
            sensor_id = %scan.sensor_id,
            batch_size = scan.batch_size.get(),
            "Dispatching query"
        );

        let ack = match tokio::time::timeout(self.settings.ack_timeout, self.engine.query(scan))
            .await
        {
            Ok(ack) => ack,
            Err(_) => AckResult::Failed(DispatchCause::Transport(format!(
                "no acknowledgment within {} ms",
                self.settings.ack_timeout.as_millis()
            ))),
        };

        match &ack {
            AckResult::Started => {
                info!(target: LOG_TARGET, channel_handle = %request.channel_handle, "Query started")
            }
            AckResult::Failed(cause) => warn!(
                target: LOG_TARGET,
                channel_handle = %request.channel_handle,
                cause = %cause,
                "Query not started"
            ),
        }
        Ok(ack)
    }

    pub async fn cancel(&self, channel_handle: &str) -> bool {
        self.engine.cancel(channel_handle).await
    }
}
