use axum::body::Bytes;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::gateway::{decode_payload, GatewayState};

/// The XHR long-poll fallback (§4.7 "XHR long-poll"): one broker pub/sub
/// listen loop per HTTP request, returning the first `type == "message"`
/// event it sees. Served at `*/xhr/` when enabled and not skipped.
pub async fn long_poll(state: &GatewayState, method: Method, uri: Uri, body: Bytes) -> Response {
    let params = if method == Method::POST {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            _ => return plaintext(StatusCode::BAD_REQUEST, "Unable to parse JSON data in POST."),
        }
    } else {
        uri.query().map(parse_query).unwrap_or_default()
    };

    let channels = params
        .get("subscribe")
        .map(string_list)
        .unwrap_or_default();
    if channels.is_empty() {
        return plaintext(StatusCode::BAD_REQUEST, "subscribe is required.");
    }
    let callback = params.get("callback").and_then(first_string);

    let mut pubsub = match state.broker.subscribe(&channels).await {
        Ok(pubsub) => pubsub,
        Err(err) => {
            tracing::error!(%err, "broker connection lost subscribing for long-poll");
            return plaintext(
                StatusCode::GATEWAY_TIMEOUT,
                "Application did not respond in a timely fashion.",
            );
        }
    };

    let event = match tokio::time::timeout(state.config.request_timeout, pubsub.next_message()).await
    {
        Ok(Ok(Some(msg))) => serde_json::json!({
            "type": "message",
            "channel": msg.channel,
            "data": decode_payload(&msg.payload),
        }),
        _ => {
            return plaintext(
                StatusCode::GATEWAY_TIMEOUT,
                "Application did not respond in a timely fashion.",
            )
        }
    };

    match callback {
        Some(name) => (
            StatusCode::OK,
            [("content-type", "text/javascript")],
            format!("{name}({event});"),
        )
            .into_response(),
        None => (
            StatusCode::OK,
            [("content-type", "application/json")],
            event.to_string(),
        )
            .into_response(),
    }
}

fn plaintext(status: StatusCode, body: &str) -> Response {
    (status, [("content-type", "text/plain")], body.to_string()).into_response()
}

/// Unwraps a param value to its first string, whether it arrived as a bare
/// JSON string (POST body) or an array-wrapped query value (GET, per
/// `parse_query` below) — mirrors the REST gateway's `first_string`.
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_query(query: &str) -> Map<String, Value> {
    let mut map: Map<String, Value> = Map::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        map.entry(key.into_owned())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("always inserted as an array")
            .push(Value::String(value.into_owned()));
    }
    map
}
