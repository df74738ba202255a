//! Latch server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve a device with state in ./latch-state
//! latch-server --bind 0.0.0.0:7400
//!
//! # Custom identity and slower simulated bolt
//! latch-server --identity frontdoor --state-dir /var/lib/latch --actuator-latency-ms 800
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use latch_core::DeviceConfig;
use latch_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Latch lock device server
#[derive(Parser, Debug)]
#[command(name = "latch-server")]
#[command(about = "Claimable lock device server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7400")]
    bind: String,

    /// Directory for the identity seed and owner record
    #[arg(short, long, default_value = "latch-state")]
    state_dir: PathBuf,

    /// Root blessing name of the device
    #[arg(short, long, default_value = "device")]
    identity: String,

    /// Bound on a single lock or unlock, in milliseconds
    #[arg(long, default_value = "5000")]
    actuation_timeout_ms: u64,

    /// Bound on a direct status read, in milliseconds
    #[arg(long, default_value = "2000")]
    status_timeout_ms: u64,

    /// Travel time of the simulated bolt, in milliseconds
    #[arg(long, default_value = "200")]
    actuator_latency_ms: u64,

    /// Maximum concurrent connections
    #[arg(long, default_value = "64")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Latch server starting");
    tracing::info!("State directory {}", args.state_dir.display());

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        state_dir: args.state_dir,
        device_name: args.identity,
        device: DeviceConfig {
            actuation_timeout: Duration::from_millis(args.actuation_timeout_ms),
            status_timeout: Duration::from_millis(args.status_timeout_ms),
        },
        actuator_latency: Duration::from_millis(args.actuator_latency_ms),
        max_connections: args.max_connections,
    };

    let server = Server::bind(config).await?;

    if let Some(owner) = server.device().owner()? {
        tracing::info!("Device claimed by {}", owner);
    }
    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
