//! # gridlearn-core
//!
//! Core types for the gridlearn reinforcement-learning sandbox.
//!
//! This crate provides the simulation pieces that carry no I/O:
//! - Grid world model, transitions, stuck detection and maze generation
//! - Tabular Q-Learning / SARSA agent
//! - Reward strategies
//! - Setup configuration and wire snapshots

pub mod action;
pub mod agent;
pub mod cell;
pub mod config;
pub mod error;
pub mod position;
pub mod reward;
pub mod snapshot;
pub mod world;

pub use action::Action;
pub use agent::{ActionChoice, ActionValues, AgentParams, Algorithm, TabularAgent, ValueTable};
pub use cell::{CellSpec, CellType};
pub use config::SimulationConfig;
pub use error::{GridLearnError, Result, error_codes};
pub use position::Position;
pub use reward::RewardStrategy;
pub use snapshot::{GridSnapshot, ValueTableWire};
pub use world::{GridWorld, MAX_CELLS, Transition};
