use pulse_stream::frontend::start_all;
use pulse_stream::logging;
use pulse_stream::shared::config::CONFIG;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init()?;
    info!(tcp_addr = %CONFIG.server.tcp_addr, "Pulse stream engine is starting...");
    start_all().await
}
