//! The REST gateway process entrypoint (§4.6).

use std::sync::Arc;

use bluecollar_broker::RedisBroker;
use bluecollar_core::init_tracing;
use bluecollar_rest::{router, GatewayState, MethodCache, RestConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bluecollar-rest", version, about = "BlueCollar REST gateway")]
struct Args {}

#[tokio::main]
async fn main() {
    Args::parse();
    init_tracing();

    let config = match RestConfig::from_env() {
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

    let bind = format!("{}:{}", config.bind_host, config.bind_port);
    let state = Arc::new(GatewayState {
        config,
        broker,
        method_cache: MethodCache::new(),
    });
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %bind, "could not bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind, "REST gateway listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(%err, "server exited");
        std::process::exit(1);
    }
}
