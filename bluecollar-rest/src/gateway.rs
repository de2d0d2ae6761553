use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use bluecollar_broker::Broker;
use bluecollar_core::{new_reply_channel, Envelope, Reply};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{Map, Value};
use std::io::Write;

use crate::config::RestConfig;
use crate::method_cache::MethodCache;

pub struct GatewayState {
    pub config: RestConfig,
    pub broker: Arc<dyn Broker>,
    pub method_cache: MethodCache,
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
    body: Bytes,
) -> Response {
    let mut kwargs = uri
        .query()
        .map(parse_list_valued_query)
        .unwrap_or_default();
    let supress_response_codes = kwargs.remove("supress_response_codes").is_some();
    let callback = kwargs
        .remove("callback")
        .and_then(|v| first_string(&v));

    let http_method = kwargs
        .remove("method")
        .and_then(|v| first_string(&v))
        .unwrap_or_else(|| method.as_str().to_lowercase())
        .to_lowercase();

    if http_method == "options" {
        let mut response_headers = HeaderMap::new();
        response_headers.insert("access-control-allow-origin", "*".parse().unwrap());
        response_headers.insert(
            "access-control-allow-methods",
            "GET,POST,PUT,DELETE,PATCH,OPTIONS".parse().unwrap(),
        );
        if let Some(requested) = headers.get("access-control-request-headers") {
            response_headers.insert("access-control-allow-headers", requested.clone());
        }
        return (StatusCode::OK, response_headers).into_response();
    }

    if http_method == "post" {
        for (key, value) in form_urlencoded::parse(&body) {
            kwargs
                .entry(key.into_owned())
                .or_insert_with(|| Value::Array(Vec::new()))
                .as_array_mut()
                .expect("always inserted as an array")
                .push(Value::String(value.into_owned()));
        }
    }

    let path = uri.path();
    let Some(stripped) = strip_prefix(path, &state.config.prefix) else {
        return app_error(
            &state,
            StatusCode::NOT_FOUND,
            format!("Invalid request path. Expected prefix {}", state.config.prefix),
            supress_response_codes,
        );
    };

    let mut elements: Vec<String> = stripped
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    if let Some(last) = elements.last_mut() {
        if let Some(dot) = last.rfind('.') {
            if dot > 0 {
                let extension = last[dot..].to_string();
                last.truncate(dot);
                if extension != ".json" {
                    return app_error(
                        &state,
                        StatusCode::NOT_ACCEPTABLE,
                        format!("Unsupported content type {}.", &extension[1..]),
                        supress_response_codes,
                    );
                }
            }
        }
    }

    let mut resource: Option<String> = None;
    let mut args: Vec<Value> = Vec::new();
    let mut method_path = String::new();

    for (index, element) in elements.iter().enumerate() {
        if method_path.is_empty() {
            method_path = element.clone();
        } else {
            method_path.push('.');
            method_path.push_str(element);
        }

        match state.method_cache.get(&method_path) {
            Some(Some(k)) => {
                resource = Some(method_path.clone());
                args = elements[k..].iter().cloned().map(Value::String).collect();
                break;
            }
            Some(None) => continue,
            None => {}
        }

        let probe = Envelope::probe(format!("{method_path}.http_{http_method}"))
            .with_reply_channel(new_reply_channel(&state.config.reply_prefix));
        let reply_channel = probe.reply_channel.clone().unwrap();
        if let Err(err) = state
            .broker
            .push(&state.config.queues.work_queue, probe.to_bytes())
            .await
        {
            tracing::error!(%err, "broker connection lost during resource discovery");
            return app_error(
                &state,
                StatusCode::GATEWAY_TIMEOUT,
                "Application did not respond in a timely fashion.".to_string(),
                supress_response_codes,
            );
        }
        let popped = state
            .broker
            .blocking_pop(&reply_channel, state.config.request_timeout)
            .await;
        let bytes = match popped {
            Ok(Some(bytes)) => bytes,
            _ => {
                return app_error(
                    &state,
                    StatusCode::GATEWAY_TIMEOUT,
                    "Application did not respond in a timely fashion.".to_string(),
                    supress_response_codes,
                )
            }
        };
        let found = matches!(Reply::decode(&bytes), Ok(Reply::Presence(p)) if p.found);
        if found {
            resource = Some(method_path.clone());
            args = elements[index + 1..]
                .iter()
                .cloned()
                .map(Value::String)
                .collect();
            state.method_cache.mark_resource(&method_path, index + 1);
            break;
        } else {
            state.method_cache.mark_absent(&method_path);
        }
    }

    let Some(resource) = resource else {
        return app_error(
            &state,
            StatusCode::NOT_FOUND,
            "No supported server method found.".to_string(),
            supress_response_codes,
        );
    };

    let kwargs_map: Map<String, Value> = kwargs;
    let envelope = Envelope::new(format!("{resource}.http_{http_method}"))
        .with_args(args)
        .with_kwargs(kwargs_map)
        .with_reply_channel(new_reply_channel(&state.config.reply_prefix));
    let reply_channel = envelope.reply_channel.clone().unwrap();

    if let Err(err) = state
        .broker
        .push(&state.config.queues.work_queue, envelope.to_bytes())
        .await
    {
        tracing::error!(%err, "broker connection lost pushing envelope");
        return app_error(
            &state,
            StatusCode::GATEWAY_TIMEOUT,
            "Application did not respond in a timely fashion.".to_string(),
            supress_response_codes,
        );
    }

    let reply_bytes = match state
        .broker
        .blocking_pop(&reply_channel, state.config.request_timeout)
        .await
    {
        Ok(Some(bytes)) => bytes,
        _ => {
            return app_error(
                &state,
                StatusCode::GATEWAY_TIMEOUT,
                "Application did not respond in a timely fashion.".to_string(),
                supress_response_codes,
            )
        }
    };

    let (content_type, body) = match callback {
        Some(name) => (
            "text/javascript",
            format!("{name}({});", String::from_utf8_lossy(&reply_bytes)).into_bytes(),
        ),
        None => ("application/json", reply_bytes),
    };

    let compressed = deflate(&body);
    let mut response_headers = HeaderMap::new();
    response_headers.insert("access-control-allow-origin", "*".parse().unwrap());
    response_headers.insert("content-type", content_type.parse().unwrap());
    response_headers.insert("content-encoding", "deflate".parse().unwrap());
    (StatusCode::OK, response_headers, compressed).into_response()
}

fn app_error(
    state: &GatewayState,
    status: StatusCode,
    message: String,
    supress_response_codes: bool,
) -> Response {
    let mut error = Map::new();
    error.insert("message".to_string(), Value::String(message.clone()));
    if let Some(url) = &state.config.error_doc_url {
        let encoded: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
        error.insert(
            "more_info".to_string(),
            Value::String(format!("{url}{encoded}")),
        );
    }
    let outer_status = if supress_response_codes {
        error.insert(
            "response_code".to_string(),
            Value::Number(status.as_u16().into()),
        );
        StatusCode::OK
    } else {
        status
    };
    (
        outer_status,
        [("content-type", "application/json")],
        serde_json::to_vec(&Value::Object(error)).expect("error body always serializes"),
    )
        .into_response()
}

fn deflate(body: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).expect("in-memory writer never fails");
    encoder.finish().expect("in-memory writer never fails")
}

fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix == "/" {
        return path.strip_prefix('/').or(Some(path));
    }
    path.strip_prefix(prefix)
}

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

fn first_string(value: &Value) -> Option<String> {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
