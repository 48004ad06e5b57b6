//! gridlearn sandbox server
//!
//! JSON-RPC requests on stdin/stdout, optional live channel on TCP.
//! Logs go to stderr so they never mix with protocol output.

use anyhow::Result;
use clap::Parser;
use gridlearn_server::{GridLearnServer, ServerConfig};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gridlearn", version, about = "Tabular RL grid-world sandbox")]
struct Cli {
    /// Address for the TCP live channel, e.g. 127.0.0.1:7878
    #[arg(long)]
    live_addr: Option<SocketAddr>,

    /// Initial delay between continuous-play ticks
    #[arg(long, default_value_t = 100)]
    speed_ms: u64,

    /// Seed for maze generation and exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Per-episode step ceiling for turbo runs
    #[arg(long, default_value_t = 100_000)]
    turbo_step_limit: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig {
        live_addr: cli.live_addr,
        default_speed_ms: cli.speed_ms,
        turbo_step_limit: cli.turbo_step_limit,
        seed: cli.seed,
        ..Default::default()
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        live_addr = ?config.live_addr,
        seed = ?config.seed,
        "gridlearn starting"
    );

    let server = GridLearnServer::new(config)?;
    server.run().await?;
    Ok(())
}
