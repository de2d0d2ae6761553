use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use bluecollar_broker::{Broker, InMemoryBroker};
use bluecollar_core::{Envelope, Reply};
use bluecollar_http::{router, GatewayState, HttpConfig};
use bluecollar_registry::{InstancePolicy, RegistryBuilder, TypeBuilder};
use bluecollar_worker::{Worker, WorkerConfig};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

fn test_config() -> HttpConfig {
    HttpConfig {
        broker: bluecollar_core::BrokerLocation {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        },
        queues: bluecollar_core::QueueNames {
            work_queue: "list_bcqueue_http_test".into(),
            worker_list: "list_bcworkers_http_test".into(),
        },
        bind_host: "127.0.0.1".into(),
        bind_port: 0,
        prefix: "/".into(),
        request_timeout: Duration::from_secs(2),
        reply_prefix: "bc".into(),
    }
}

fn spawn_calculator_worker(broker: Arc<dyn Broker>) {
    let registry = Arc::new(
        RegistryBuilder::new()
            .register_type(
                TypeBuilder::new("Calculator", InstancePolicy::Singleton, || {
                    Arc::new(0i64) as Arc<dyn Any + Send + Sync>
                })
                .method::<i64, _, _>("add", |_instance, args, _kwargs| async move {
                    let a = args.first().and_then(|v| v.as_str()).and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
                    let b = args.get(1).and_then(|v| v.as_str()).and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
                    Ok(json!(a + b))
                }),
        )
        .build(),
    );
    let config = WorkerConfig {
        broker: bluecollar_core::BrokerLocation {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        },
        queues: bluecollar_core::QueueNames {
            work_queue: "list_bcqueue_http_test".into(),
            worker_list: "list_bcworkers_http_test".into(),
        },
        poll_timeout: Duration::from_millis(50),
        reply_ttl: Duration::from_secs(30),
        worker_id: "http-test-worker".into(),
    };
    tokio::spawn(async move {
        let mut worker = Worker::new(registry, broker, config);
        worker.run().await
    });
}

#[tokio::test]
async fn get_request_dispatches_positional_args_from_path() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    spawn_calculator_worker(broker.clone());
    // Let the worker register before we push, so its roster check races
    // don't flake the test.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
    });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/Calculator.add/2/3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let reply = Reply::decode(&body).unwrap();
    assert_eq!(reply, Reply::ok(json!(5)));
}

#[tokio::test]
async fn post_request_dispatches_json_envelope() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    spawn_calculator_worker(broker.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
    });
    let app = router(state);

    let envelope = Envelope::new("Calculator.add").with_args(vec![json!("4"), json!("5")]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(envelope.to_bytes()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(Reply::decode(&body).unwrap(), Reply::ok(json!(9)));
}

#[tokio::test]
async fn unsupported_http_method_returns_501() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
    });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 501);
}

#[tokio::test]
async fn missing_response_times_out_with_500() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let mut config = test_config();
    config.request_timeout = Duration::from_millis(30);
    let state = Arc::new(GatewayState { config, broker });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/no.such.worker")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
}
