//! The WebSocket gateway process entrypoint (§4.7). When `BC_WS_FALLBACK` is
//! set, this process also connects a second broker client and stands up the
//! chosen gateway's router to delegate non-upgrade requests to, rather than
//! running it as a separate process.

use std::sync::Arc;

use bluecollar_broker::RedisBroker;
use bluecollar_core::init_tracing;
use bluecollar_ws::{allow_all, router, Fallback, GatewayState, Stats, WsConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bluecollar-ws", version, about = "BlueCollar WebSocket gateway")]
struct Args {}

#[tokio::main]
async fn main() {
    Args::parse();
    init_tracing();

    let config = match WsConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let broker = match RedisBroker::connect(&config.broker.redis_url()).await {
        Ok(broker) => Arc::new(broker),
        Err(err) => {
            tracing::error!(%err, "could not connect to broker");
            std::process::exit(1);
        }
    };

    let (http_fallback, rest_fallback) = match config.fallback {
        Fallback::Http => (Some(build_http_fallback().await), None),
        Fallback::Rest => (None, Some(build_rest_fallback().await)),
        Fallback::None => (None, None),
    };

    let bind = format!("{}:{}", config.bind_host, config.bind_port);
    let state = Arc::new(GatewayState {
        config,
        broker,
        stats: Stats::new(),
        auth: allow_all(),
        http_fallback,
        rest_fallback,
    });
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %bind, "could not bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind, "WebSocket gateway listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(%err, "server exited");
        std::process::exit(1);
    }
}

async fn build_http_fallback() -> axum::Router {
    let config = bluecollar_http::HttpConfig::from_env().unwrap_or_else(|err| {
        tracing::error!(%err, "invalid HTTP fallback configuration");
        std::process::exit(1);
    });
    let broker = RedisBroker::connect(&config.broker.redis_url())
        .await
        .unwrap_or_else(|err| {
            tracing::error!(%err, "could not connect HTTP fallback broker");
            std::process::exit(1);
        });
    bluecollar_http::router(Arc::new(bluecollar_http::GatewayState {
        config,
        broker: Arc::new(broker),
    }))
}

async fn build_rest_fallback() -> axum::Router {
    let config = bluecollar_rest::RestConfig::from_env().unwrap_or_else(|err| {
        tracing::error!(%err, "invalid REST fallback configuration");
        std::process::exit(1);
    });
    let broker = RedisBroker::connect(&config.broker.redis_url())
        .await
        .unwrap_or_else(|err| {
            tracing::error!(%err, "could not connect REST fallback broker");
            std::process::exit(1);
        });
    bluecollar_rest::router(Arc::new(bluecollar_rest::GatewayState {
        config,
        broker: Arc::new(broker),
        method_cache: bluecollar_rest::MethodCache::new(),
    }))
}
