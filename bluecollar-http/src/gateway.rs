use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use bluecollar_broker::Broker;
use bluecollar_core::{new_reply_channel, Envelope};
use serde_json::{Map, Value};

use crate::config::HttpConfig;

/// Shared state handed to every request handler.
pub struct GatewayState {
    pub config: HttpConfig,
    pub broker: Arc<dyn Broker>,
}

/// Build the gateway's router: every path is handled by the same dispatcher,
/// which validates the prefix itself (§4.5 "Path prefix mismatch").
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
    body: Bytes,
) -> Response {
    let path = uri.path();
    let Some(after_prefix) = strip_prefix(path, &state.config.prefix) else {
        return plaintext(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "500: Expected prefix {} not found in request path.",
                state.config.prefix
            ),
        );
    };

    let envelope = match method {
        Method::GET => match build_get_envelope(after_prefix, uri.query()) {
            Ok(envelope) => envelope,
            Err(message) => return plaintext(StatusCode::INTERNAL_SERVER_ERROR, message),
        },
        Method::POST => match build_post_envelope(&body) {
            Ok(envelope) => envelope,
            Err(message) => return plaintext(StatusCode::INTERNAL_SERVER_ERROR, message),
        },
        _ => {
            return plaintext(
                StatusCode::NOT_IMPLEMENTED,
                "501: Method not implemented. Only GET/POST are expected.".to_string(),
            )
        }
    };

    let reply_channel = new_reply_channel(&state.config.reply_prefix);
    let envelope = envelope.with_reply_channel(reply_channel.clone());

    if let Err(err) = state
        .broker
        .push(&state.config.queues.work_queue, envelope.to_bytes())
        .await
    {
        tracing::error!(%err, "broker connection lost pushing envelope");
        return plaintext(
            StatusCode::INTERNAL_SERVER_ERROR,
            "500: broker connection lost".to_string(),
        );
    }

    match state
        .broker
        .blocking_pop(&reply_channel, state.config.request_timeout)
        .await
    {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            bytes,
        )
            .into_response(),
        Ok(None) => plaintext(
            StatusCode::INTERNAL_SERVER_ERROR,
            "500: Timed out waiting for response.".to_string(),
        ),
        Err(err) => {
            tracing::error!(%err, "broker connection lost awaiting reply");
            plaintext(
                StatusCode::INTERNAL_SERVER_ERROR,
                "500: broker connection lost".to_string(),
            )
        }
    }
}

fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix == "/" {
        return path.strip_prefix('/').or(Some(path));
    }
    path.strip_prefix(prefix)
}

fn build_get_envelope(rest: &str, query: Option<&str>) -> Result<Envelope, String> {
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let method = segments
        .next()
        .ok_or_else(|| "500: no method segment in request path.".to_string())?
        .to_string();
    let args: Vec<Value> = segments.map(|s| Value::String(s.to_string())).collect();
    let kwargs = query.map(parse_list_valued_query).unwrap_or_default();
    Ok(Envelope::new(method).with_args(args).with_kwargs(kwargs))
}

/// Mirrors Python's `urlparse.parse_qs`: every value is a list, since a query
/// string may repeat a key.
fn parse_list_valued_query(query: &str) -> Map<String, Value> {
    let mut kwargs: Map<String, Value> = Map::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        kwargs
            .entry(key.into_owned())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("always inserted as an array")
            .push(Value::String(value.into_owned()));
    }
    kwargs
}

fn build_post_envelope(body: &[u8]) -> Result<Envelope, String> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| "500: Unable to parse JSON data in POST.".to_string())?;
    let Value::Object(_) = &value else {
        return Err(format!(
            "500: Expected dict in POST data, received {}",
            json_type_name(&value)
        ));
    };
    Envelope::from_value(value).map_err(|err| format!("500: {err}"))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn plaintext(status: StatusCode, body: String) -> Response {
    (status, [("content-type", "text/plain")], body).into_response()
}
