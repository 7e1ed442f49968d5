use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::dispatch::traits::PersistenceEngine;
use crate::engine::emitter::CANCELLED;
use crate::protocol::frame::{read_frame, write_frame};
use crate::protocol::{AckResult, BatchMessage, DispatchCause, ScanRequest};

const LOG_TARGET: &str = "pulse::remote";

/// A persistence engine on another node, reached over the TCP frontend.
///
/// Envelopes received after a `Started` ack are republished on the local
/// bus under the request's channel handle, so a caller consumes a remote
/// query exactly like a local one.
pub struct RemoteEngine {
    addr: String,
    bus: Arc<MessageBus<Value>>,
    links: Arc<DashMap<String, (u64, CancellationToken)>>,
    next_link: AtomicU64,
}

impl RemoteEngine {
    pub fn new(addr: impl Into<String>, bus: Arc<MessageBus<Value>>) -> Self {
        Self {
            addr: addr.into(),
            bus,
            links: Arc::new(DashMap::new()),
            next_link: AtomicU64::new(0),
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus<Value>> {
        &self.bus
    }

    /// Sends the request and reads the acknowledgment line.
    async fn start(
        &self,
        request: &ScanRequest,
    ) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf, AckResult), String> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| format!("connect to {}: {e}", self.addr))?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        write_frame(&mut write, &request.to_wire())
            .await
            .map_err(|e| format!("send request to {}: {e}", self.addr))?;

        let ack = read_frame::<_, AckResult>(&mut reader)
            .await
            .map_err(|e| format!("read acknowledgment from {}: {e}", self.addr))?
            .ok_or_else(|| format!("{} closed the connection before acknowledging", self.addr))?;

        Ok((reader, write, ack))
    }
}

#[async_trait]
impl PersistenceEngine for RemoteEngine {
    async fn query(&self, request: ScanRequest) -> AckResult {
        let handle = request.channel_handle.clone();
        if self.links.contains_key(&handle) {
            return AckResult::Failed(DispatchCause::HandleInUse(handle));
        }

        let (reader, write, ack) = match self.start(&request).await {
            Ok(started) => started,
            Err(cause) => {
                warn!(target: LOG_TARGET, channel_handle = %handle, cause = %cause, "Remote query failed");
                return AckResult::Failed(DispatchCause::Transport(cause));
            }
        };

        if ack.is_started() {
            let id = self.next_link.fetch_add(1, Ordering::Relaxed);
            let token = CancellationToken::new();
            self.links.insert(handle.clone(), (id, token.clone()));
            tokio::spawn(forward(
                reader,
                write,
                ForwardLink {
                    handle,
                    id,
                    token,
                    bus: Arc::clone(&self.bus),
                    links: Arc::clone(&self.links),
                },
            ));
        }
        ack
    }

    async fn cancel(&self, channel_handle: &str) -> bool {
        match self.links.get(channel_handle) {
            Some(link) => {
                link.1.cancel();
                true
            }
            None => false,
        }
    }
}

struct ForwardLink {
    handle: String,
    id: u64,
    token: CancellationToken,
    bus: Arc<MessageBus<Value>>,
    links: Arc<DashMap<String, (u64, CancellationToken)>>,
}

/// Relays envelopes from the connection to the local bus until a terminal
/// message, a cancellation, or the end of the connection.
async fn forward(mut reader: BufReader<OwnedReadHalf>, write: OwnedWriteHalf, link: ForwardLink) {
    let handle = link.handle.as_str();

    loop {
        let next = tokio::select! {
            biased;
            _ = link.token.cancelled() => {
                info!(target: LOG_TARGET, channel_handle = handle, "Remote query cancelled");
                let _ = link.bus.send(handle, BatchMessage::Aborted(CANCELLED.to_string())).await;
                break;
            }
            next = read_frame::<_, BatchMessage<Value>>(&mut reader) => next,
        };

        match next {
            Ok(Some(message)) => {
                let terminal = message.is_terminal();
                if let Err(e) = link.bus.send(handle, message).await {
                    debug!(target: LOG_TARGET, channel_handle = handle, error = %e, "Local subscriber gone");
                    break;
                }
                if terminal {
                    break;
                }
            }
            Ok(None) => {
                warn!(target: LOG_TARGET, channel_handle = handle, "Connection closed before terminal message");
                link.bus.close(handle);
                break;
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(target: LOG_TARGET, channel_handle = handle, error = %e, "Undecodable envelope");
                let _ = link
                    .bus
                    .send(handle, BatchMessage::Aborted(format!("malformed batch message: {e}")))
                    .await;
                break;
            }
            Err(e) => {
                warn!(target: LOG_TARGET, channel_handle = handle, error = %e, "Connection lost");
                link.bus.close(handle);
                break;
            }
        }
    }

    link.links
        .remove_if(handle, |_, (id, _)| *id == link.id);
    // Dropping the socket tells the server to stop streaming.
    drop(write);
}
