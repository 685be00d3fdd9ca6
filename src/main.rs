//! Gateway dispatch binary.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gateway_dispatch::config::{load_config, GatewayConfig};
use gateway_dispatch::lifecycle::{listen_for_signals, Shutdown};
use gateway_dispatch::observability;
use gateway_dispatch::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "gateway-dispatch", version, about = "Gateway dispatch layer")]
struct Args {
    /// Path to the TOML configuration file; defaults apply when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    observability::logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        routes = config.routes.len(),
        algorithm = ?config.load_balancer.algorithm,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signals = tokio::spawn(listen_for_signals(shutdown.clone()));

    let server = HttpServer::new(config);
    server.run(listener, &shutdown).await?;
    signals.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
