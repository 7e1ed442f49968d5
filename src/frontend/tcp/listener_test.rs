use crate::engine::EngineSettings;
use crate::engine::store::{EventScan, EventStore, StoreError};
use crate::protocol::{QueryRequest, ScanRequest};
use crate::test_helpers::factories::{RequestFactory, ScriptedStore};
use crate::test_helpers::server::spawn_server;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// The write half is returned so the connection stays open until the test
/// drops it.
async fn send_line(addr: SocketAddr, line: &str) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    write.write_all(line.as_bytes()).await.unwrap();
    write.write_all(b"\n").await.unwrap();
    (BufReader::new(read), write)
}

async fn send_request(
    addr: SocketAddr,
    request: &QueryRequest,
) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    send_line(addr, &serde_json::to_string(request).unwrap()).await
}

async fn read_json(reader: &mut BufReader<OwnedReadHalf>) -> Option<Value> {
    let mut line = String::new();
    let n = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("server answered in time")
        .unwrap();
    (n > 0).then(|| serde_json::from_str(&line).unwrap())
}

#[tokio::test]
async fn streams_ack_then_envelopes() {
    let (addr, _ctx) =
        spawn_server(ScriptedStore::new().with_events(5), EngineSettings::default()).await;
    let request = RequestFactory::new().with_batch_size(2).with_handle("tcp-a").create();
    let (mut reader, _write) = send_request(addr, &request).await;

    assert_eq!(read_json(&mut reader).await, Some(json!({"ack": "started"})));
    assert_eq!(read_json(&mut reader).await, Some(json!({"batch": [0, 1]})));
    assert_eq!(read_json(&mut reader).await, Some(json!({"batch": [2, 3]})));
    assert_eq!(
        read_json(&mut reader).await,
        Some(json!({"batch": [4], "isLast": true}))
    );
    assert_eq!(read_json(&mut reader).await, None);
}

#[tokio::test]
async fn malformed_request_line_is_rejected() {
    let (addr, _ctx) = spawn_server(ScriptedStore::new(), EngineSettings::default()).await;
    let (mut reader, _write) = send_line(addr, "{not json").await;

    let ack = read_json(&mut reader).await.unwrap();
    assert_eq!(ack["ack"], "failed");
    assert_eq!(ack["cause"]["kind"], "rejected");
    assert_eq!(read_json(&mut reader).await, None);
}

#[tokio::test]
async fn invalid_request_is_rejected_without_scanning() {
    let store = ScriptedStore::new().with_events(3);
    let (addr, _ctx) = spawn_server(store.clone(), EngineSettings::default()).await;
    let request = RequestFactory::new().with_batch_size(0).create();
    let (mut reader, _write) = send_request(addr, &request).await;

    let ack = read_json(&mut reader).await.unwrap();
    assert_eq!(ack["cause"]["kind"], "rejected");
    assert!(ack["cause"]["detail"].as_str().unwrap().contains("batchSize"));
    assert_eq!(store.opened(), 0);
}

#[tokio::test]
async fn handle_already_subscribed_on_server_is_rejected() {
    let (addr, ctx) = spawn_server(ScriptedStore::new(), EngineSettings::default()).await;
    let _held = ctx.bus.subscribe("taken").unwrap();

    let request = RequestFactory::new().with_handle("taken").create();
    let (mut reader, _write) = send_request(addr, &request).await;

    let ack = read_json(&mut reader).await.unwrap();
    assert_eq!(
        ack,
        json!({"ack": "failed", "cause": {"kind": "handle_in_use", "detail": "taken"}})
    );
}

#[tokio::test]
async fn client_disconnect_cancels_the_scan() {
    let store = ScriptedStore::new()
        .with_events(10_000)
        .with_delay(Duration::from_millis(1));
    let (addr, ctx) = spawn_server(
        store,
        EngineSettings {
            mailbox_capacity: 8,
            max_concurrent_queries: 1,
        },
    )
    .await;

    {
        let request = RequestFactory::new().with_handle("leaver").create();
        let (mut reader, _write) = send_request(addr, &request).await;
        assert_eq!(read_json(&mut reader).await, Some(json!({"ack": "started"})));
    }

    // Once the cancelled scan is torn down the single slot frees up again.
    let mut freed = false;
    for i in 0..100 {
        let request = RequestFactory::new()
            .with_handle(&format!("after-{i}"))
            .create();
        let scan = request.validate().unwrap();
        if ctx.engine.query(scan).await.is_started() {
            freed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(freed, "engine slot should be released after the client left");
}

struct Unserializable;

impl Serialize for Unserializable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("payload not representable"))
    }
}

struct BrokenPayloadStore;

#[async_trait]
impl EventStore for BrokenPayloadStore {
    type Event = Unserializable;

    async fn open_scan(
        &self,
        _request: &ScanRequest,
    ) -> Result<EventScan<Unserializable>, StoreError> {
        Ok(futures::stream::iter(vec![Ok(Unserializable)]).boxed())
    }
}

#[tokio::test]
async fn serialization_failure_aborts_the_stream() {
    let (addr, _ctx) = spawn_server(BrokenPayloadStore, EngineSettings::default()).await;
    let request = RequestFactory::new().with_batch_size(1).with_handle("broken").create();
    let (mut reader, _write) = send_request(addr, &request).await;

    assert_eq!(read_json(&mut reader).await, Some(json!({"ack": "started"})));
    let terminal = read_json(&mut reader).await.unwrap();
    let description = terminal["abortingException"].as_str().unwrap();
    assert!(description.contains("payload not representable"), "{description}");
    assert_eq!(read_json(&mut reader).await, None);
}

#[tokio::test]
async fn rejected_query_leaves_no_route_on_the_server_bus() {
    let store = ScriptedStore::new().refusing(StoreError::Unavailable("disk offline".into()));
    let (addr, ctx) = spawn_server(store, EngineSettings::default()).await;
    let request = RequestFactory::new().with_handle("refused").create();
    let (mut reader, _write) = send_request(addr, &request).await;

    let ack = read_json(&mut reader).await.unwrap();
    assert_eq!(ack["cause"]["kind"], "storage_unavailable");
    assert_eq!(read_json(&mut reader).await, None);
    assert_eq!(ctx.bus.route_count(), 0);
}

#[tokio::test]
async fn unterminated_client_chatter_is_discarded() {
    let store = ScriptedStore::new()
        .with_events(6)
        .with_delay(Duration::from_millis(10));
    let (addr, _ctx) = spawn_server(store, EngineSettings::default()).await;
    let request = RequestFactory::new().with_batch_size(3).with_handle("chatty").create();
    let (mut reader, mut write) = send_request(addr, &request).await;

    write.write_all(&vec![b'x'; 16 * 1024]).await.unwrap();

    assert_eq!(read_json(&mut reader).await, Some(json!({"ack": "started"})));
    assert_eq!(read_json(&mut reader).await, Some(json!({"batch": [0, 1, 2]})));
    assert_eq!(
        read_json(&mut reader).await,
        Some(json!({"batch": [3, 4, 5]}))
    );
    assert_eq!(
        read_json(&mut reader).await,
        Some(json!({"batch": [], "isLast": true}))
    );
}
