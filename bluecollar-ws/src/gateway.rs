use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use bluecollar_broker::{Broker, PubSub};
use bluecollar_core::new_reply_channel;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tower::ServiceExt;

use crate::auth::AuthPredicate;
use crate::config::{Fallback, WsConfig};
use crate::stats::Stats;
use crate::xhr;

/// Shared state for one WS gateway process: its broker, the pluggable
/// subscribe-auth predicate, stats counters, and the fallback routers it was
/// configured with (§4.7 "Fallback").
pub struct GatewayState {
    pub config: WsConfig,
    pub broker: Arc<dyn Broker>,
    pub stats: Stats,
    pub auth: AuthPredicate,
    pub http_fallback: Option<Router>,
    pub rest_fallback: Option<Router>,
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", any(dispatch))
        .route("/{*path}", any(dispatch))
        .with_state(state)
}

async fn dispatch(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    upgrade: Option<WebSocketUpgrade>,
    body: Bytes,
) -> Response {
    match upgrade {
        Some(upgrade) => {
            let state = state.clone();
            upgrade.on_upgrade(move |socket| handle_socket(socket, state))
        }
        None => {
            if !state.config.skip_longpolling && uri.path().ends_with("/xhr/") {
                return xhr::long_poll(&state, method, uri, body).await;
            }
            match state.config.fallback {
                Fallback::Http => match &state.http_fallback {
                    Some(router) => fallback_through(router, method, uri, headers, body).await,
                    None => not_a_websocket(),
                },
                Fallback::Rest => match &state.rest_fallback {
                    Some(router) => fallback_through(router, method, uri, headers, body).await,
                    None => not_a_websocket(),
                },
                Fallback::None => not_a_websocket(),
            }
        }
    }
}

fn not_a_websocket() -> Response {
    (
        StatusCode::BAD_REQUEST,
        "WebSocket connection is expected here.",
    )
        .into_response()
}

async fn fallback_through(
    router: &Router,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    let request = builder
        .body(Body::from(body))
        .expect("method/uri/headers already validated by the inbound request");
    router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|err: Infallible| match err {})
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    state.stats.record_connect();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(64);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut client = ClientPubSub::new();

    while let Some(frame) = stream.next().await {
        let Ok(frame) = frame else { break };
        match frame {
            Message::Text(text) => handle_frame(&state, &tx, &mut client, text.as_str()).await,
            Message::Close(_) => break,
            _ => continue,
        }
    }

    client.teardown(&state).await;
    drop(tx);
    let _ = writer.await;
    state.stats.record_disconnect();
}

/// Decode one inbound WS frame and dispatch it per §4.7: a `subscribe` or
/// `unsubscribe` array routes to the pub/sub flow; anything else is a
/// request/reply envelope forwarded to the work queue, unmodified except for
/// a gateway-stamped `reply_channel`, matching the original's "set
/// `reply_channel`, rpush the whole dict" behavior.
async fn handle_frame(
    state: &Arc<GatewayState>,
    tx: &mpsc::Sender<Message>,
    client: &mut ClientPubSub,
    text: &str,
) {
    let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(text) else {
        let _ = send_text(tx, "Unable to JSON decode request.").await;
        return;
    };

    if let Some(Value::Array(channels)) = obj.get("subscribe") {
        let channels = string_values(channels);
        client.subscribe(state, tx.clone(), channels).await;
        return;
    }
    if let Some(Value::Array(channels)) = obj.get("unsubscribe") {
        let channels = string_values(channels);
        client.unsubscribe(state, tx.clone(), channels).await;
        return;
    }

    let reply_channel = new_reply_channel(&state.config.reply_prefix);
    obj.insert(
        "reply_channel".to_string(),
        Value::String(reply_channel.clone()),
    );
    let bytes = serde_json::to_vec(&Value::Object(obj)).expect("object always serializes");

    if let Err(err) = state
        .broker
        .push(&state.config.queues.work_queue, bytes)
        .await
    {
        tracing::error!(%err, "broker connection lost pushing envelope");
        let _ = send_text(tx, "Requested timed out.").await;
        return;
    }

    match state
        .broker
        .blocking_pop(&reply_channel, state.config.request_timeout)
        .await
    {
        Ok(Some(reply_bytes)) => {
            let _ = tx
                .send(Message::Text(
                    String::from_utf8_lossy(&reply_bytes).into_owned().into(),
                ))
                .await;
        }
        _ => {
            let _ = send_text(tx, "Requested timed out.").await;
        }
    }
}

async fn send_text(tx: &mpsc::Sender<Message>, body: &str) -> Result<(), ()> {
    tx.send(Message::Text(
        Value::String(body.to_string()).to_string().into(),
    ))
    .await
    .map_err(|_| ())
}

fn string_values(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

pub(crate) fn decode_payload(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

type SharedPubSub = Arc<Mutex<Box<dyn PubSub>>>;

/// One connected client's pub/sub state (§3 "Pub/sub client state"): at most
/// one live pump task at a time, killed before a replacement starts.
struct ClientPubSub {
    handle: Option<SharedPubSub>,
    pump: Option<JoinHandle<()>>,
    channels: HashSet<String>,
}

impl ClientPubSub {
    fn new() -> Self {
        Self {
            handle: None,
            pump: None,
            channels: HashSet::new(),
        }
    }

    async fn subscribe(
        &mut self,
        state: &Arc<GatewayState>,
        tx: mpsc::Sender<Message>,
        channels: Vec<String>,
    ) {
        if channels.is_empty() {
            return;
        }
        if !(state.auth)(&auth_payload(&channels)) {
            if state.config.auth_stop_on_fail {
                let _ = send_text(&tx, "Authentication failed.").await;
                return;
            }
            tracing::warn!("auth predicate failed but auth_stop_on_fail is false, subscribing anyway");
        }

        let handle = match &self.handle {
            Some(handle) => {
                // Abort the running pump before touching the handle: it
                // holds the mutex across `next_message().await`, which
                // blocks until a message arrives, so locking first would
                // freeze this subscribe (and the whole inbound frame loop)
                // until the pump happened to wake up on its own.
                if let Some(pump) = self.pump.take() {
                    pump.abort();
                }
                let mut guard = handle.lock().await;
                for channel in &channels {
                    if let Err(err) = guard.subscribe(channel).await {
                        tracing::warn!(%err, "broker connection lost subscribing");
                        return;
                    }
                }
                drop(guard);
                handle.clone()
            }
            None => match state.broker.subscribe(&channels).await {
                Ok(pubsub) => {
                    let handle: SharedPubSub = Arc::new(Mutex::new(pubsub));
                    self.handle = Some(handle.clone());
                    state.stats.record_pubsub_open();
                    handle
                }
                Err(err) => {
                    tracing::warn!(%err, "broker connection lost subscribing");
                    return;
                }
            },
        };

        self.channels.extend(channels);
        self.restart_pump(state, tx, handle);
    }

    async fn unsubscribe(
        &mut self,
        state: &Arc<GatewayState>,
        tx: mpsc::Sender<Message>,
        channels: Vec<String>,
    ) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        if channels.is_empty() {
            self.channels.clear();
            self.handle = None;
            state.stats.record_pubsub_close();
            return;
        }

        {
            let mut guard = handle.lock().await;
            for channel in &channels {
                let _ = guard.unsubscribe(channel).await;
                self.channels.remove(channel);
            }
        }

        if self.channels.is_empty() {
            self.handle = None;
            state.stats.record_pubsub_close();
            return;
        }

        self.restart_pump(state, tx, handle);
    }

    /// Kill any prior pump, then spawn a fresh one over `handle`. Invariant
    /// (§8 property 8): never two pumps alive for the same client — the
    /// abort always happens before the new task is spawned.
    fn restart_pump(&mut self, state: &Arc<GatewayState>, tx: mpsc::Sender<Message>, handle: SharedPubSub) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        let state = state.clone();
        self.pump = Some(tokio::spawn(async move {
            loop {
                let message = {
                    let mut guard = handle.lock().await;
                    guard.next_message().await
                };
                match message {
                    Ok(Some(msg)) => {
                        state.stats.record_event_forwarded();
                        let event = serde_json::json!({
                            "type": "message",
                            "channel": msg.channel,
                            "data": decode_payload(&msg.payload),
                        });
                        if tx.send(Message::Text(event.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(%err, "broker connection lost in pub/sub pump");
                        break;
                    }
                }
            }
        }));
    }

    async fn teardown(&mut self, state: &Arc<GatewayState>) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if self.handle.take().is_some() {
            state.stats.record_pubsub_close();
        }
    }
}

fn auth_payload(channels: &[String]) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "subscribe".to_string(),
        Value::Array(channels.iter().cloned().map(Value::String).collect()),
    );
    map
}
