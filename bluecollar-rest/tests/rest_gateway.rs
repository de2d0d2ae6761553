use std::any::Any;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use bluecollar_broker::{Broker, InMemoryBroker};
use bluecollar_registry::{InstancePolicy, RegistryBuilder, TypeBuilder};
use bluecollar_rest::{router, GatewayState, MethodCache, RestConfig};
use bluecollar_worker::{Worker, WorkerConfig};
use flate2::read::ZlibDecoder;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

fn test_config() -> RestConfig {
    RestConfig {
        broker: bluecollar_core::BrokerLocation {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        },
        queues: bluecollar_core::QueueNames {
            work_queue: "list_bcqueue_rest_test".into(),
            worker_list: "list_bcworkers_rest_test".into(),
        },
        bind_host: "127.0.0.1".into(),
        bind_port: 0,
        prefix: "/".into(),
        request_timeout: Duration::from_secs(2),
        reply_prefix: "bc".into(),
        error_doc_url: None,
    }
}

/// A worker exposing `Resource.http_get`, reachable at `/resource/42`.
fn spawn_resource_worker(broker: Arc<dyn Broker>) {
    let registry = Arc::new(
        RegistryBuilder::new()
            .register_type(
                TypeBuilder::new("resource", InstancePolicy::Singleton, || {
                    Arc::new(()) as Arc<dyn Any + Send + Sync>
                })
                .method::<(), _, _>("http_get", |_instance, args, _kwargs| async move {
                    let id = args.first().cloned().unwrap_or(json!(null));
                    Ok(json!({"id": id}))
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
            work_queue: "list_bcqueue_rest_test".into(),
            worker_list: "list_bcworkers_rest_test".into(),
        },
        poll_timeout: Duration::from_millis(50),
        reply_ttl: Duration::from_secs(30),
        worker_id: "rest-test-worker".into(),
    };
    tokio::spawn(async move {
        let mut worker = Worker::new(registry, broker, config);
        worker.run().await
    });
}

fn decode_deflate(bytes: &[u8]) -> String {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).unwrap();
    out
}

#[tokio::test]
async fn resource_walk_finds_resource_and_returns_deflated_json() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    spawn_resource_worker(broker.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
        method_cache: MethodCache::new(),
    });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/resource/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-encoding").unwrap(),
        "deflate"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let decoded = decode_deflate(&body);
    let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(value, json!({"id": "42"}));
}

#[tokio::test]
async fn unresolved_resource_returns_404() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    spawn_resource_worker(broker.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
        method_cache: MethodCache::new(),
    });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/does/not/exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn options_short_circuits_with_cors_headers() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
        method_cache: MethodCache::new(),
    });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/resource/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn supress_response_codes_folds_status_into_body() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let state = Arc::new(GatewayState {
        config: test_config(),
        broker,
        method_cache: MethodCache::new(),
    });
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/does/not/exist?supress_response_codes=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["response_code"], json!(404));
}
