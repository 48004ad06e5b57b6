//! Episode orchestration: ticks, manual steps, turbo runs and path tracing

use std::collections::HashSet;

use gridlearn_core::reward::STUCK_PENALTY;
use gridlearn_core::{Action, Algorithm, CellType, GridLearnError, GridSnapshot, Position, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::SimulationState;

/// One agent move (or a forced stuck update)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Cell the agent was on before the step
    pub from: Position,
    pub to: Position,
    pub reward: f64,
    pub terminal: bool,
    /// No permitted action could move the agent
    pub stuck: bool,
    /// Bonus cell collected by this step
    pub collected: Option<Position>,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The previous episode finished; the world and agent were reset to start
    Boundary { episode_reward: f64 },
    Step(StepOutcome),
}

impl TickOutcome {
    /// Boundary and terminal ticks are always broadcast
    pub fn is_episode_event(&self) -> bool {
        match self {
            TickOutcome::Boundary { .. } => true,
            TickOutcome::Step(step) => step.terminal,
        }
    }
}

/// Manual step classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Reset,
    Terminal,
    Step,
}

/// Response to a manual step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_reward: Option<f64>,
    pub agent_pos: Position,
    pub episode: u64,
    pub steps: u64,
    pub total_reward: f64,
    pub epsilon: f64,
    pub stuck: bool,
    pub env: GridSnapshot,
}

/// One learning-curve sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Global 1-based episode number
    pub episode: u64,
    pub reward: f64,
    pub steps: u64,
}

/// Response to a turbo run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurboReport {
    pub episodes: u64,
    pub curve: Vec<CurvePoint>,
    pub env: GridSnapshot,
}

impl SimulationState {
    fn at_boundary(&self) -> bool {
        self.episode_over || self.world.cell(self.position).is_terminal()
    }

    /// Advance the simulation by one unit of work.
    ///
    /// If the previous step ended the episode this performs the boundary
    /// (epsilon decay, counter bump, respawn); otherwise one agent step.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if !self.world.contains(self.position) {
            return Err(GridLearnError::Simulation(format!(
                "agent position {} is outside the grid",
                self.position
            )));
        }

        if self.at_boundary() {
            let episode_reward = self.finish_episode();
            return Ok(TickOutcome::Boundary { episode_reward });
        }
        Ok(TickOutcome::Step(self.step()))
    }

    /// One tick on behalf of a manual step request
    pub fn manual_step(&mut self) -> Result<StepReport> {
        let outcome = self.tick()?;
        let (status, episode_reward, stuck) = match outcome {
            TickOutcome::Boundary { episode_reward } => {
                (StepStatus::Reset, Some(episode_reward), false)
            }
            TickOutcome::Step(step) if step.terminal => (StepStatus::Terminal, None, step.stuck),
            TickOutcome::Step(step) => (StepStatus::Step, None, step.stuck),
        };

        Ok(StepReport {
            status,
            episode_reward,
            agent_pos: self.position,
            episode: self.episode,
            steps: self.steps,
            total_reward: self.total_reward,
            epsilon: self.agent.epsilon(),
            stuck,
            env: self.world.snapshot(),
        })
    }

    /// Run `episodes` full episodes back to back.
    ///
    /// Each episode is capped at the configured step limit. Position, step
    /// count, reward and the live layout are reset afterwards; the learned
    /// values, epsilon and episode counter carry over.
    pub fn turbo(&mut self, episodes: u64) -> TurboReport {
        let stride = episodes.div_ceil(self.limits.curve_samples).max(1);
        let limit = self.limits.turbo_step_limit;
        let mut curve = Vec::new();

        for i in 0..episodes {
            self.respawn();
            while !self.episode_over && self.steps < limit {
                self.step();
            }
            if !self.episode_over {
                debug!(episode = self.episode + 1, limit, "Turbo episode hit step limit");
            }

            self.agent.decay_epsilon();
            self.episode += 1;
            if i % stride == 0 {
                curve.push(CurvePoint {
                    episode: self.episode,
                    reward: self.total_reward,
                    steps: self.steps,
                });
            }
        }
        self.respawn();

        info!(
            episodes,
            total_episodes = self.episode,
            epsilon = self.agent.epsilon(),
            "Turbo run finished"
        );
        TurboReport {
            episodes,
            curve,
            env: self.world.snapshot(),
        }
    }

    /// Greedy path from Start under the current value table.
    ///
    /// Traced on a copy of the world so bonuses are not consumed. Stops on a
    /// state with no values, a blocked move, a terminal cell, a revisit, or
    /// after `width * height` moves.
    pub fn optimal_path(&self) -> Vec<Position> {
        let mut world = self.world.clone();
        world.reset_to_initial();

        let mut current = world.start_position();
        let mut path = vec![current];
        let mut visited = HashSet::from([current]);

        for _ in 0..world.width() * world.height() {
            let Some(action) = self.agent.best_action(current) else {
                break;
            };
            let transition = world.transition(current, action, 0.0);
            if transition.hit_wall {
                break;
            }
            path.push(transition.next);
            if transition.terminal || !visited.insert(transition.next) {
                break;
            }
            current = transition.next;
        }
        path
    }

    /// Episode boundary; returns the finished episode's reward
    fn finish_episode(&mut self) -> f64 {
        let episode_reward = self.total_reward;
        self.agent.decay_epsilon();
        self.episode += 1;
        self.respawn();
        debug!(
            episode = self.episode,
            episode_reward,
            epsilon = self.agent.epsilon(),
            "Episode finished"
        );
        episode_reward
    }

    fn respawn(&mut self) {
        self.world.reset_to_initial();
        self.position = self.world.start_position();
        self.steps = 0;
        self.total_reward = 0.0;
        self.episode_over = false;
    }

    fn step(&mut self) -> StepOutcome {
        let from = self.position;

        if self.world.is_stuck(from, self.agent.allowed_actions()) {
            let action = self
                .agent
                .allowed_actions()
                .first()
                .copied()
                .unwrap_or(Action::FALLBACK);
            self.agent
                .update_value(from, action, STUCK_PENALTY, from, true, None);
            self.total_reward += STUCK_PENALTY;
            self.episode_over = true;
            debug!(%from, "Agent stuck, ending episode");
            return StepOutcome {
                from,
                to: from,
                reward: STUCK_PENALTY,
                terminal: true,
                stuck: true,
                collected: None,
            };
        }

        let choice = self.agent.choose_action(from);
        let transition = self.world.transition(from, choice.action, self.step_penalty);

        let next_action = (self.agent.algorithm() == Algorithm::Sarsa && !transition.terminal)
            .then(|| self.agent.choose_action(transition.next).action);
        self.agent.update_value(
            from,
            choice.action,
            transition.reward,
            transition.next,
            transition.terminal,
            next_action,
        );

        self.position = transition.next;
        self.steps += 1;
        self.total_reward += transition.reward;
        if transition.terminal {
            self.episode_over = true;
        }

        StepOutcome {
            from,
            to: transition.next,
            reward: transition.reward,
            terminal: transition.terminal,
            stuck: false,
            collected: (transition.landed == CellType::Bonus).then_some(transition.next),
        }
    }
}
