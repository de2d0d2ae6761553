//! The worker process entrypoint. The registry it dispatches against is
//! fixed at compile time to the demo `calculator-pkg` package (§4.9 "the
//! root package argument becomes a compile-time registry"); swapping in a
//! different exposed package means depending on it here instead.

use std::sync::Arc;

use bluecollar_broker::RedisBroker;
use bluecollar_core::init_tracing;
use bluecollar_worker::{Worker, WorkerConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bluecollar-worker", version, about = "BlueCollar worker process")]
struct Args {}

#[tokio::main]
async fn main() {
    Args::parse();
    init_tracing();

    let config = match WorkerConfig::from_env() {
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

    let registry = Arc::new(calculator_pkg::registry());
    let mut worker = Worker::new(registry, broker, config);
    worker.install_signal_handler();
    worker.run().await;
}
