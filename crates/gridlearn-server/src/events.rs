//! Live-channel messages

use gridlearn_core::snapshot::row_delta;
use gridlearn_core::{Position, ValueTableWire};
use serde::{Deserialize, Serialize};

use crate::orchestrator::TickOutcome;
use crate::state::SimulationState;

/// Server to observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    Update(UpdatePayload),
    Error { message: String },
}

/// Incremental state pushed after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub agent_pos: Position,
    pub episode: u64,
    pub steps: u64,
    pub total_reward: f64,
    pub epsilon: f64,
    /// Value row of the cell the agent just left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_delta: Option<ValueTableWire>,
    /// Bonus cell that was just collected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_update: Option<Position>,
    /// Bonuses were restored by an episode reset
    #[serde(default)]
    pub respawn_bonuses: bool,
    #[serde(default)]
    pub stuck: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_reward: Option<f64>,
}

/// Observer to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LiveCommand {
    Play,
    Pause,
    SetSpeed { speed: u64 },
}

impl SimulationState {
    /// Build the live update for a tick that just ran
    pub fn update_event(&self, outcome: &TickOutcome) -> LiveEvent {
        let mut payload = UpdatePayload {
            agent_pos: self.position,
            episode: self.episode,
            steps: self.steps,
            total_reward: self.total_reward,
            epsilon: self.agent.epsilon(),
            q_delta: None,
            grid_update: None,
            respawn_bonuses: false,
            stuck: false,
            episode_done: None,
            episode_reward: None,
        };

        match outcome {
            TickOutcome::Boundary { episode_reward } => {
                payload.respawn_bonuses = true;
                payload.episode_done = Some(true);
                payload.episode_reward = Some(*episode_reward);
            }
            TickOutcome::Step(step) => {
                payload.q_delta = self
                    .agent
                    .row(step.from)
                    .map(|row| row_delta(step.from, row));
                payload.grid_update = step.collected;
                payload.stuck = step.stuck;
            }
        }
        LiveEvent::Update(payload)
    }
}
