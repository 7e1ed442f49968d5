use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::distributions::{Alphanumeric, DistString};
use serde_json::Value;
use tracing::{error, info};

use pulse_stream::bus::MessageBus;
use pulse_stream::dispatch::{DispatchSettings, QueryDispatcher, RemoteEngine};
use pulse_stream::logging;
use pulse_stream::protocol::{AckResult, BatchMessage, QueryError, QueryRequest};
use pulse_stream::shared::config::model::load_settings;

const FALLBACK_ADDR: &str = "127.0.0.1:7171";
const FALLBACK_BATCH_SIZE: usize = 500;

#[derive(Parser)]
#[command(name = "pulse-query")]
#[command(about = "Stream a sensor time range from a pulse engine", long_about = None)]
struct Args {
    /// Engine TCP address [default: server.tcp_addr, else 127.0.0.1:7171]
    #[arg(short, long)]
    addr: Option<String>,

    /// Inclusive lower bound, e.g. 2024-01-01T00:00:00.000+0000
    #[arg(long)]
    since: String,

    /// Inclusive upper bound
    #[arg(long)]
    until: String,

    /// Sensor to scan
    #[arg(short, long)]
    sensor: String,

    /// Events per batch [default: query.default_batch_size, else 500]
    #[arg(short, long)]
    batch_size: Option<i64>,

    /// Channel handle; a random one is generated when omitted
    #[arg(long)]
    handle: Option<String>,

    /// How long to wait for the engine's acknowledgment
    #[arg(long, default_value = "5000")]
    ack_timeout_ms: u64,

    /// Log level written to stderr
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    logging::init_for_cli(&args.log_level)?;

    // The client works without a configuration file; one only supplies defaults.
    let settings = load_settings().ok();
    let addr = args.addr.unwrap_or_else(|| {
        settings
            .as_ref()
            .map(|s| s.server.tcp_addr.clone())
            .unwrap_or_else(|| FALLBACK_ADDR.to_string())
    });
    let batch_size = args.batch_size.unwrap_or_else(|| {
        let size = settings
            .as_ref()
            .map(|s| s.default_batch_size())
            .unwrap_or(FALLBACK_BATCH_SIZE);
        i64::try_from(size).unwrap_or(i64::MAX)
    });

    let handle = args.handle.unwrap_or_else(|| {
        format!(
            "pulse.query.{}",
            Alphanumeric.sample_string(&mut rand::thread_rng(), 12)
        )
    });
    let request = QueryRequest::new(args.since, args.until, args.sensor, batch_size, &handle);

    let bus: Arc<MessageBus<Value>> = Arc::new(MessageBus::new(16));
    let mut rx = bus.subscribe(&handle)?;
    let dispatcher = QueryDispatcher::new(
        RemoteEngine::new(addr, Arc::clone(&bus)),
        DispatchSettings {
            ack_timeout: Duration::from_millis(args.ack_timeout_ms),
        },
    );

    match dispatcher.query(&request).await {
        Ok(AckResult::Started) => info!(channel_handle = %handle, "Query started"),
        Ok(AckResult::Failed(cause)) => {
            error!(channel_handle = %handle, cause = %cause, "Query was not started");
            return Ok(ExitCode::FAILURE);
        }
        Err(QueryError::InvalidArgument(reason)) => {
            eprintln!("invalid query: {reason}");
            return Ok(ExitCode::from(2));
        }
        Err(e) => {
            error!(error = %e, "Query failed");
            return Ok(ExitCode::FAILURE);
        }
    }

    let mut events = 0usize;
    while let Some(message) = rx.next_message().await {
        println!("{}", serde_json::to_string(&message)?);
        events += message.len();
        match message {
            BatchMessage::FinalBatch(_) => {
                info!(channel_handle = %handle, events, "Stream completed");
                return Ok(ExitCode::SUCCESS);
            }
            BatchMessage::Aborted(description) => {
                error!(channel_handle = %handle, reason = %description, "Stream aborted");
                return Ok(ExitCode::FAILURE);
            }
            BatchMessage::Batch(_) => {}
        }
    }

    error!(channel_handle = %handle, events, "Connection lost before the final batch");
    Ok(ExitCode::FAILURE)
}
