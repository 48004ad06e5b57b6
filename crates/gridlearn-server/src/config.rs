//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the sandbox server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address for the TCP live channel (disabled when `None`)
    pub live_addr: Option<SocketAddr>,
    /// Initial delay between continuous-play ticks
    pub default_speed_ms: u64,
    /// Minimum spacing of non-boundary live updates (~30/s)
    pub broadcast_interval: Duration,
    /// Hard per-episode step ceiling in turbo runs
    pub turbo_step_limit: u64,
    /// Maximum number of learning-curve samples a turbo run returns
    pub curve_samples: u64,
    /// Seed for maze generation and agent exploration
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            live_addr: None,
            default_speed_ms: 100,
            broadcast_interval: Duration::from_millis(33),
            turbo_step_limit: 100_000,
            curve_samples: 100,
            seed: None,
        }
    }
}
