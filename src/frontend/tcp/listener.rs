use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::frontend::context::FrontendContext;
use crate::protocol::frame::{read_frame, write_frame};
use crate::protocol::{AckResult, BatchMessage, DispatchCause, QueryRequest};
use crate::shared::config::CONFIG;

const LOG_TARGET: &str = "pulse::frontend::tcp";

pub async fn run_tcp_server<E>(ctx: Arc<FrontendContext<E>>) -> anyhow::Result<()>
where
    E: Serialize + Send + Sync + 'static,
{
    let addr = &CONFIG.server.tcp_addr;
    let listener = TcpListener::bind(addr).await?;
    info!(target: LOG_TARGET, "TCP listener active on {}", addr);
    serve(listener, ctx).await
}

/// Accepts connections forever. Each connection carries exactly one query:
/// a request line in, an ack line out, then the envelope lines.
pub async fn serve<E>(listener: TcpListener, ctx: Arc<FrontendContext<E>>) -> anyhow::Result<()>
where
    E: Serialize + Send + Sync + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        let ctx = Arc::clone(&ctx);

        tokio::spawn(async move {
            debug!(target: LOG_TARGET, %peer, "Connection accepted");
            if let Err(e) = handle_connection(stream, ctx).await {
                error!(target: LOG_TARGET, %peer, "Connection error: {e}");
            }
        });
    }
}

async fn handle_connection<E>(
    stream: TcpStream,
    ctx: Arc<FrontendContext<E>>,
) -> anyhow::Result<()>
where
    E: Serialize + Send + Sync + 'static,
{
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let request: QueryRequest = match read_frame(&mut reader).await {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()),
        Err(e) => {
            let cause = DispatchCause::Rejected(format!("malformed request: {e}"));
            write_frame(&mut write, &AckResult::Failed(cause)).await?;
            return Ok(());
        }
    };

    let scan = match request.validate() {
        Ok(scan) => scan,
        Err(e) => {
            write_frame(&mut write, &AckResult::Failed(DispatchCause::Rejected(e.to_string())))
                .await?;
            return Ok(());
        }
    };

    let handle = scan.channel_handle.clone();
    let mut receiver = match ctx.bus.subscribe(&handle) {
        Ok(receiver) => receiver,
        Err(_) => {
            write_frame(&mut write, &AckResult::Failed(DispatchCause::HandleInUse(handle)))
                .await?;
            return Ok(());
        }
    };

    let ack = ctx.engine.query(scan).await;
    if let Err(e) = write_frame(&mut write, &ack).await {
        if ack.is_started() {
            ctx.engine.cancel(&handle).await;
        }
        return Err(e.into());
    }
    if !ack.is_started() {
        return Ok(());
    }

    // Any input after the request is discarded; end of input means the
    // client left and the scan should stop.
    let mut discard = [0u8; 256];
    loop {
        tokio::select! {
            message = receiver.next_message() => {
                let Some(message) = message else {
                    warn!(target: LOG_TARGET, channel_handle = %handle, "Route closed before terminal message");
                    return Ok(());
                };
                let terminal = message.is_terminal();
                if let Err(e) = relay(&mut write, &message).await {
                    ctx.engine.cancel(&handle).await;
                    if e.kind() == std::io::ErrorKind::InvalidData {
                        warn!(target: LOG_TARGET, channel_handle = %handle, error = %e, "Batch serialization failed");
                        let aborted: BatchMessage<E> =
                            BatchMessage::Aborted(format!("event serialization failed: {e}"));
                        write_frame(&mut write, &aborted).await?;
                        return Ok(());
                    }
                    return Err(e.into());
                }
                if terminal {
                    debug!(target: LOG_TARGET, channel_handle = %handle, "Stream relayed");
                    return Ok(());
                }
            }
            read = reader.read(&mut discard) => {
                if matches!(read, Ok(0) | Err(_)) {
                    info!(target: LOG_TARGET, channel_handle = %handle, "Client disconnected, cancelling query");
                    ctx.engine.cancel(&handle).await;
                    return Ok(());
                }
            }
        }
    }
}

/// Encodes before writing so a serialization failure never leaves a partial
/// line on the wire.
async fn relay<E: Serialize>(
    write: &mut OwnedWriteHalf,
    message: &BatchMessage<E>,
) -> std::io::Result<()> {
    let frame = serde_json::to_value(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    write_frame(write, &frame).await
}
