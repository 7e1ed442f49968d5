use crate::bus::{BatchSink, MessageBus};
use crate::engine::store::EventStore;
use crate::engine::{EngineSettings, QueryEngine};
use crate::frontend::context::FrontendContext;
use crate::frontend::tcp::listener::serve;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Starts an engine over `store` behind a TCP frontend on an ephemeral port.
pub async fn spawn_server<S>(
    store: S,
    settings: EngineSettings,
) -> (SocketAddr, Arc<FrontendContext<S::Event>>)
where
    S: EventStore,
    S::Event: Serialize + Sync,
{
    let bus: Arc<MessageBus<S::Event>> = Arc::new(MessageBus::new(8));
    let sink: Arc<dyn BatchSink<S::Event>> = bus.clone();
    let engine = QueryEngine::spawn(Arc::new(store), sink, settings);
    let ctx = FrontendContext::new(engine, bus);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(serve(listener, Arc::clone(&ctx)));
    (addr, ctx)
}
