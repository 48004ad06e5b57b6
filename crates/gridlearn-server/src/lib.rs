//! # gridlearn-server
//!
//! Runtime for the gridlearn reinforcement-learning sandbox.
//!
//! This crate provides:
//! - Shared simulation state and episode orchestration
//! - Continuous play, manual steps and turbo training
//! - Live update broadcast to any number of observers
//! - JSON-RPC tools over stdio and a TCP live channel

pub mod config;
pub mod events;
pub mod mcp;
pub mod observers;
pub mod orchestrator;
pub mod simulation;
pub mod state;
pub mod throttle;
pub mod tools;
pub mod transport;

pub use config::ServerConfig;
pub use events::{LiveCommand, LiveEvent, UpdatePayload};
pub use observers::ObserverHub;
pub use orchestrator::{CurvePoint, StepReport, StepStatus, TickOutcome, TurboReport};
pub use simulation::Simulation;
pub use state::{RunMode, SimulationState, StateSnapshot};

use gridlearn_core::Result;
use std::sync::Arc;
use tracing::error;

/// gridlearn server: one simulation behind a stdio request channel and an
/// optional TCP live channel
pub struct GridLearnServer {
    simulation: Arc<Simulation>,
    config: ServerConfig,
}

impl GridLearnServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self {
            simulation: Arc::new(Simulation::new(&config)?),
            config,
        })
    }

    pub fn simulation(&self) -> &Arc<Simulation> {
        &self.simulation
    }

    /// Run until the stdio client disconnects
    pub async fn run(self) -> Result<()> {
        if let Some(addr) = self.config.live_addr {
            let listener = transport::tcp::bind(addr).await?;
            let simulation = self.simulation.clone();
            tokio::spawn(async move {
                if let Err(e) = transport::tcp::serve(simulation, listener).await {
                    error!("Live channel stopped: {}", e);
                }
            });
        }
        self.run_stdio().await
    }

    /// Run the server on stdio transport only
    pub async fn run_stdio(self) -> Result<()> {
        transport::stdio::run(self.simulation).await
    }
}
