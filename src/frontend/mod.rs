pub mod context;
pub mod tcp;

use context::FrontendContext;

pub async fn start_all() -> anyhow::Result<()> {
    let ctx = FrontendContext::from_config().await?;
    tcp::listener::run_tcp_server(ctx).await
}
