use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, WeakSender};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::BatchSink;
use crate::engine::emitter::BatchEmitter;
use crate::engine::executor::context::EngineContext;
use crate::engine::executor::message::EngineMessage;
use crate::engine::store::EventStore;
use crate::protocol::{AckResult, DispatchCause, ScanRequest};

const LOG_TARGET: &str = "pulse::engine::worker";

/// Main loop of the engine. Owns admission and the table of running scans;
/// the scans themselves run on their own tasks.
pub async fn run_worker_loop<S: EventStore>(
    mut ctx: EngineContext<S>,
    mut rx: Receiver<EngineMessage>,
) {
    info!(target: LOG_TARGET, "Engine worker started");

    while let Some(msg) = rx.recv().await {
        match msg {
            EngineMessage::Query { request, ack } => on_query(&mut ctx, request, ack),
            EngineMessage::Cancel {
                channel_handle,
                completion,
            } => {
                let found = on_cancel(&ctx, &channel_handle);
                let _ = completion.send(found);
            }
            EngineMessage::Finished { channel_handle } => {
                ctx.active.remove(&channel_handle);
                debug!(
                    target: LOG_TARGET,
                    channel_handle = %channel_handle,
                    active = ctx.active.len(),
                    "Query torn down"
                );
            }
            EngineMessage::Shutdown { completion } => {
                info!(target: LOG_TARGET, active = ctx.active.len(), "Engine shutdown requested");
                ctx.shutting_down = true;
                ctx.shutdown_waiters.push(completion);
                for token in ctx.active.values() {
                    token.cancel();
                }
            }
        }

        if ctx.shutting_down && ctx.active.is_empty() {
            for waiter in ctx.shutdown_waiters.drain(..) {
                let _ = waiter.send(());
            }
            break;
        }
    }

    info!(target: LOG_TARGET, "Engine worker shutting down");
}

fn on_query<S: EventStore>(
    ctx: &mut EngineContext<S>,
    request: ScanRequest,
    ack: oneshot::Sender<AckResult>,
) {
    let handle = request.channel_handle.clone();

    let rejection = if ctx.shutting_down {
        Some(DispatchCause::ShuttingDown)
    } else if ctx.active.contains_key(&handle) {
        Some(DispatchCause::HandleInUse(handle.clone()))
    } else if !ctx.has_capacity() {
        Some(DispatchCause::Overloaded)
    } else {
        None
    };

    if let Some(cause) = rejection {
        warn!(target: LOG_TARGET, channel_handle = %handle, cause = %cause, "Query rejected");
        let _ = ack.send(AckResult::Failed(cause));
        return;
    }

    let token = CancellationToken::new();
    ctx.active.insert(handle.clone(), token.clone());
    debug!(
        target: LOG_TARGET,
        channel_handle = %handle,
        sensor_id = %request.sensor_id,
        active = ctx.active.len(),
        "Query admitted"
    );

    tokio::spawn(run_query(
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.sink),
        request,
        ack,
        token,
        ctx.mailbox.clone(),
    ));
}

fn on_cancel<S: EventStore>(ctx: &EngineContext<S>, channel_handle: &str) -> bool {
    match ctx.active.get(channel_handle) {
        Some(token) => {
            info!(target: LOG_TARGET, channel_handle, "Cancelling query");
            token.cancel();
            true
        }
        None => false,
    }
}

/// Opens the scan, resolves the ack, and streams the batches.
async fn run_query<S: EventStore>(
    store: Arc<S>,
    sink: Arc<dyn BatchSink<S::Event>>,
    request: ScanRequest,
    ack: oneshot::Sender<AckResult>,
    cancel: CancellationToken,
    mailbox: WeakSender<EngineMessage>,
) {
    let handle = request.channel_handle.clone();

    match store.open_scan(&request).await {
        Ok(scan) => {
            // A caller that stopped waiting for the ack has been told the
            // query failed, so its handle must not receive anything.
            if ack.send(AckResult::Started).is_err() {
                warn!(target: LOG_TARGET, channel_handle = %handle, "Ack receiver gone, not starting scan");
            } else {
                let emitter = BatchEmitter::new(handle.clone(), request.batch_size, sink, cancel);
                let report = emitter.run(scan).await;
                debug!(target: LOG_TARGET, channel_handle = %handle, ?report, "Emitter finished");
            }
        }
        Err(e) => {
            warn!(target: LOG_TARGET, channel_handle = %handle, error = %e, "Failed to open scan");
            let _ = ack.send(AckResult::Failed(DispatchCause::StorageUnavailable(
                e.to_string(),
            )));
        }
    }

    if let Some(mailbox) = mailbox.upgrade() {
        let _ = mailbox
            .send(EngineMessage::Finished {
                channel_handle: handle,
            })
            .await;
    }
}
