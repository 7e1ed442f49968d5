use std::sync::Arc;

use tokio::sync::mpsc::{Sender, channel};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::bus::BatchSink;
use crate::engine::store::EventStore;
use crate::engine::executor::context::EngineContext;
use crate::engine::executor::message::EngineMessage;
use crate::engine::executor::worker::run_worker_loop;
use crate::protocol::{AckResult, DispatchCause, ScanRequest};
use crate::shared::config::Settings;

const LOG_TARGET: &str = "pulse::engine";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub mailbox_capacity: usize,
    pub max_concurrent_queries: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            max_concurrent_queries: 64,
        }
    }
}

impl EngineSettings {
    pub fn from_config(settings: &Settings) -> Self {
        Self {
            mailbox_capacity: settings.engine.mailbox_capacity,
            max_concurrent_queries: settings.engine.max_concurrent_queries,
        }
    }
}

/// Cloneable address of a running persistence engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: Sender<EngineMessage>,
}

pub struct QueryEngine;

impl QueryEngine {
    /// Spawns the engine worker over `store`, publishing batch streams into
    /// `sink`.
    pub fn spawn<S: EventStore>(
        store: Arc<S>,
        sink: Arc<dyn BatchSink<S::Event>>,
        settings: EngineSettings,
    ) -> EngineHandle {
        let (tx, rx) = channel(settings.mailbox_capacity.max(1));
        let ctx = EngineContext::new(store, sink, settings, tx.downgrade());

        tokio::spawn(async move {
            run_worker_loop(ctx, rx).await;
        });

        info!(target: LOG_TARGET, "Engine spawned");
        EngineHandle { tx }
    }
}

impl EngineHandle {
    /// Submits a validated query and waits for its start-acknowledgment only.
    pub async fn query(&self, request: ScanRequest) -> AckResult {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .tx
            .send(EngineMessage::Query {
                request,
                ack: ack_tx,
            })
            .await
            .is_err()
        {
            warn!(target: LOG_TARGET, "Engine mailbox closed");
            return AckResult::Failed(DispatchCause::Transport(
                "engine mailbox closed".to_string(),
            ));
        }

        ack_rx.await.unwrap_or_else(|_| {
            AckResult::Failed(DispatchCause::Transport(
                "engine dropped the acknowledgment".to_string(),
            ))
        })
    }

    /// Asks the engine to stop the scan feeding `channel_handle`. Returns
    /// false if no such scan is running.
    pub async fn cancel(&self, channel_handle: &str) -> bool {
        let (completion, done) = oneshot::channel();
        let sent = self
            .tx
            .send(EngineMessage::Cancel {
                channel_handle: channel_handle.to_string(),
                completion,
            })
            .await;
        sent.is_ok() && done.await.unwrap_or(false)
    }

    /// Cancels every running scan, waits for their terminal messages and
    /// stops the worker.
    pub async fn shutdown(&self) {
        let (completion, done) = oneshot::channel();
        if self
            .tx
            .send(EngineMessage::Shutdown { completion })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
