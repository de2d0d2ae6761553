//! The plain HTTP gateway process entrypoint (§4.5).

use std::sync::Arc;

use bluecollar_broker::RedisBroker;
use bluecollar_core::init_tracing;
use bluecollar_http::{router, GatewayState, HttpConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bluecollar-http", version, about = "BlueCollar plain HTTP gateway")]
struct Args {}

#[tokio::main]
async fn main() {
    Args::parse();
    init_tracing();

    let config = match HttpConfig::from_env() {
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
    let state = Arc::new(GatewayState { config, broker });
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %bind, "could not bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind, "HTTP gateway listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(%err, "server exited");
        std::process::exit(1);
    }
}
