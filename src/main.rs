//! HTTP/JSON to gRPC gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                     GATEWAY                      │
//!   Client Request    │  ┌─────────┐   ┌────────┐   ┌──────┐   ┌───────┐ │
//!   ──────────────────┼─▶│ request │──▶│  CORS  │──▶│router│──▶│  rpc  │─┼──▶ Backend
//!                     │  │ logger  │   │        │   │      │   │channel│ │    (gRPC)
//!   Client Response   │  └─────────┘   └────────┘   └──────┘   └───────┘ │
//!   ◀─────────────────┼──────────── JSON / NDJSON ◀───────────────────────┼───
//!                     │                                                  │
//!                     │  lifecycle: startup → serving → drain ∥ close    │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use grpc_json_gateway::config::{load_config, GatewayConfig};
use grpc_json_gateway::error::StartupError;
use grpc_json_gateway::lifecycle::{spawn_signal_listener, Gateway, Shutdown};
use grpc_json_gateway::observability::{init_logging, metrics};
use grpc_json_gateway::{net, services};

#[derive(Debug, Parser)]
#[command(name = "grpc-json-gateway", version, about = "HTTP/JSON gateway for gRPC backends")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("configuration OK");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("logging error: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        listener = %config.listener.bind_address(),
        backend_transport = %config.backend.transport,
        "Gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Gateway::initialize(config, services::ALL).await?;
    let listener = net::bind(&gateway.config().listener).await?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    gateway
        .serve(listener, shutdown)
        .await
        .map_err(|source| StartupError::Listener(net::ListenerError::Serve(source)))
}
