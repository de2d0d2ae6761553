use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use bluecollar_broker::{Broker, InMemoryBroker};
use bluecollar_registry::{InstancePolicy, RegistryBuilder, TypeBuilder};
use bluecollar_worker::{Worker, WorkerConfig};
use bluecollar_ws::{allow_all, router, GatewayState, WsConfig};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn test_config(label: &str) -> WsConfig {
    WsConfig {
        broker: bluecollar_core::BrokerLocation {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        },
        queues: bluecollar_core::QueueNames {
            work_queue: format!("list_bcqueue_ws_test_{label}"),
            worker_list: format!("list_bcworkers_ws_test_{label}"),
        },
        bind_host: "127.0.0.1".into(),
        bind_port: 0,
        request_timeout: Duration::from_secs(2),
        reply_prefix: "bc".into(),
        fallback: bluecollar_ws::Fallback::None,
        skip_longpolling: false,
        auth_stop_on_fail: true,
    }
}

fn spawn_calculator_worker(broker: Arc<dyn Broker>, config: &WsConfig) {
    let registry = Arc::new(
        RegistryBuilder::new()
            .register_type(
                TypeBuilder::new("Calculator", InstancePolicy::Singleton, || {
                    Arc::new(0i64) as Arc<dyn Any + Send + Sync>
                })
                .method::<i64, _, _>("add", |_instance, args, _kwargs| async move {
                    let a = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
                    let b = args.get(1).and_then(|v| v.as_i64()).unwrap_or(0);
                    Ok(json!(a + b))
                }),
            )
            .build(),
    );
    let worker_config = WorkerConfig {
        broker: bluecollar_core::BrokerLocation {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        },
        queues: config.queues.clone(),
        poll_timeout: Duration::from_millis(50),
        reply_ttl: Duration::from_secs(30),
        worker_id: "ws-test-worker".into(),
    };
    tokio::spawn(async move {
        let mut worker = Worker::new(registry, broker, worker_config);
        worker.run().await;
    });
}

async fn spawn_gateway(state: Arc<GatewayState>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    port
}

async fn connect(port: u16) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let (stream, _response) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/"))
        .await
        .unwrap();
    stream
}

#[tokio::test]
async fn request_reply_round_trips_over_the_socket() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let config = test_config("request_reply");
    spawn_calculator_worker(broker.clone(), &config);
    let state = Arc::new(GatewayState {
        config,
        broker,
        stats: bluecollar_ws::Stats::new(),
        auth: allow_all(),
        http_fallback: None,
        rest_fallback: None,
    });
    let port = spawn_gateway(state).await;

    let mut socket = connect(port).await;
    socket
        .send(Message::Text(
            json!({"method": "Calculator.add", "args": [2, 3]})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    let text = reply.into_text().unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!(5));
}

#[tokio::test]
async fn subscribe_then_publish_forwards_messages() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let config = test_config("pubsub");
    let state = Arc::new(GatewayState {
        config,
        broker: broker.clone(),
        stats: bluecollar_ws::Stats::new(),
        auth: allow_all(),
        http_fallback: None,
        rest_fallback: None,
    });
    let port = spawn_gateway(state).await;

    let mut socket = connect(port).await;
    socket
        .send(Message::Text(
            json!({"subscribe": ["news"]}).to_string().into(),
        ))
        .await
        .unwrap();
    // Give the pump a moment to subscribe before publishing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    broker
        .publish("news", b"{\"hello\":1}".to_vec())
        .await
        .unwrap();

    let reply = socket.next().await.unwrap().unwrap();
    let text = reply.into_text().unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "message");
    assert_eq!(value["channel"], "news");
    assert_eq!(value["data"], json!({"hello": 1}));
}

#[tokio::test]
async fn denied_subscribe_is_rejected_when_auth_stop_on_fail() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let mut config = test_config("auth_stop_on_fail");
    config.auth_stop_on_fail = true;
    let state = Arc::new(GatewayState {
        config,
        broker,
        stats: bluecollar_ws::Stats::new(),
        auth: Arc::new(|_: &serde_json::Map<String, serde_json::Value>| false),
        http_fallback: None,
        rest_fallback: None,
    });
    let port = spawn_gateway(state).await;

    let mut socket = connect(port).await;
    socket
        .send(Message::Text(
            json!({"subscribe": ["news"]}).to_string().into(),
        ))
        .await
        .unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&reply.into_text().unwrap()).unwrap();
    assert_eq!(value, json!("Authentication failed."));
}

#[tokio::test]
async fn denied_subscribe_still_forwards_when_auth_stop_on_fail_is_false() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let mut config = test_config("auth_continue_on_fail");
    config.auth_stop_on_fail = false;
    let state = Arc::new(GatewayState {
        config,
        broker: broker.clone(),
        stats: bluecollar_ws::Stats::new(),
        auth: Arc::new(|_: &serde_json::Map<String, serde_json::Value>| false),
        http_fallback: None,
        rest_fallback: None,
    });
    let port = spawn_gateway(state).await;

    let mut socket = connect(port).await;
    socket
        .send(Message::Text(
            json!({"subscribe": ["news"]}).to_string().into(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    broker
        .publish("news", b"\"still-forwarded\"".to_vec())
        .await
        .unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&reply.into_text().unwrap()).unwrap();
    assert_eq!(value["data"], json!("still-forwarded"));
}

#[tokio::test]
async fn resubscribe_does_not_duplicate_pump_or_drop_existing_channel() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let config = test_config("resubscribe");
    let state = Arc::new(GatewayState {
        config,
        broker: broker.clone(),
        stats: bluecollar_ws::Stats::new(),
        auth: allow_all(),
        http_fallback: None,
        rest_fallback: None,
    });
    let port = spawn_gateway(state).await;

    let mut socket = connect(port).await;
    socket
        .send(Message::Text(
            json!({"subscribe": ["news"]}).to_string().into(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    socket
        .send(Message::Text(
            json!({"subscribe": ["news", "sports"]}).to_string().into(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    broker
        .publish("news", b"\"one\"".to_vec())
        .await
        .unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&reply.into_text().unwrap()).unwrap();
    assert_eq!(value["data"], json!("one"));

    // The resubscribe must have actually subscribed to "sports" too, not
    // just kept the original pump's "news" subscription alive.
    broker
        .publish("sports", b"\"two\"".to_vec())
        .await
        .unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("resubscribe must not freeze the inbound frame loop")
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&reply.into_text().unwrap()).unwrap();
    assert_eq!(value["channel"], "sports");
    assert_eq!(value["data"], json!("two"));
}
