//! The single shared simulation state
//!
//! All mutation goes through methods here and in `orchestrator`; the
//! [`crate::Simulation`] handle owns the one instance behind a lock.

use gridlearn_core::snapshot::table_to_wire;
use gridlearn_core::{
    CellSpec, GridSnapshot, GridWorld, Position, Result, SimulationConfig, TabularAgent,
    ValueTableWire,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ServerConfig;

/// Which driver currently owns the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Paused,
    Playing,
    Turbo,
}

/// Full observable state, as returned by the query operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub env: GridSnapshot,
    pub agent_pos: Position,
    pub q_table: ValueTableWire,
    pub episode: u64,
    pub steps: u64,
    pub total_reward: f64,
    pub epsilon: f64,
    pub run_mode: RunMode,
    pub speed_ms: u64,
}

/// Limits applied by the orchestrator
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub turbo_step_limit: u64,
    pub curve_samples: u64,
}

/// World, agent, position and counters for the one running simulation
#[derive(Debug)]
pub struct SimulationState {
    pub(crate) world: GridWorld,
    pub(crate) agent: TabularAgent,
    pub(crate) position: Position,
    pub(crate) episode: u64,
    pub(crate) steps: u64,
    pub(crate) total_reward: f64,
    pub(crate) step_penalty: f64,
    /// Set by a terminal step; the next tick performs the episode boundary
    pub(crate) episode_over: bool,
    pub(crate) run_mode: RunMode,
    pub(crate) speed_ms: u64,
    pub(crate) limits: Limits,
    rng: StdRng,
}

impl SimulationState {
    /// State with the default 8x8 world
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let defaults = SimulationConfig::default();
        let world = GridWorld::new(defaults.width, defaults.height, defaults.strategy)?;
        let agent = TabularAgent::with_seed(defaults.agent_params()?, None, rng.r#gen());

        Ok(Self {
            position: world.start_position(),
            world,
            agent,
            episode: 0,
            steps: 0,
            total_reward: 0.0,
            step_penalty: defaults.step_penalty,
            episode_over: false,
            run_mode: RunMode::Paused,
            speed_ms: config.default_speed_ms,
            limits: Limits {
                turbo_step_limit: config.turbo_step_limit,
                curve_samples: config.curve_samples.max(1),
            },
            rng,
        })
    }

    /// Replace world and agent wholesale and zero every counter.
    ///
    /// Validation happens before anything is replaced.
    pub fn setup(&mut self, config: &SimulationConfig) -> Result<()> {
        let params = config.agent_params()?;
        let world = match &config.cells {
            Some(rows) => GridWorld::from_rows(config.width, config.height, rows, config.strategy)?,
            None => GridWorld::new(config.width, config.height, config.strategy)?,
        };
        let actions = config.actions()?;

        self.agent = TabularAgent::with_seed(params, Some(&actions), self.rng.r#gen());
        self.world = world;
        self.step_penalty = config.step_penalty;
        self.position = self.world.start_position();
        self.episode = 0;
        self.steps = 0;
        self.total_reward = 0.0;
        self.episode_over = false;
        self.run_mode = RunMode::Paused;

        info!(
            width = config.width,
            height = config.height,
            algorithm = ?config.algorithm,
            strategy = ?config.strategy,
            "Simulation configured"
        );
        Ok(())
    }

    /// Change hyperparameters, strategy, step penalty and permitted actions
    /// in place. The value table and counters are kept.
    pub fn update_config(&mut self, config: &SimulationConfig) -> Result<()> {
        let params = config.agent_params()?;
        let actions = config.actions()?;
        self.agent.set_params(params);
        self.agent.set_allowed_actions(actions);
        self.world.set_strategy(config.strategy);
        self.step_penalty = config.step_penalty;
        info!(algorithm = ?config.algorithm, epsilon = config.epsilon, "Config updated");
        Ok(())
    }

    /// New random maze; learned values and epsilon are reset
    pub fn generate_maze(&mut self) -> GridSnapshot {
        self.world.generate_maze(&mut self.rng);
        self.restart_learning();
        info!(
            width = self.world.width(),
            height = self.world.height(),
            "Maze generated"
        );
        self.world.snapshot()
    }

    /// Empty grid with Start and Target; learned values and epsilon are reset
    pub fn clear(&mut self) -> GridSnapshot {
        self.world.clear();
        self.restart_learning();
        info!("Grid cleared");
        self.world.snapshot()
    }

    /// Editor path for a single cell (string form, e.g. `"bonus:5"`)
    pub fn set_cell(&mut self, pos: Position, cell: &str) -> Result<GridSnapshot> {
        self.world.set_cell(pos, CellSpec::parse_lenient(cell))?;
        Ok(self.world.snapshot())
    }

    pub fn set_speed(&mut self, speed_ms: u64) {
        self.speed_ms = speed_ms;
    }

    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn query(&self) -> StateSnapshot {
        StateSnapshot {
            env: self.world.snapshot(),
            agent_pos: self.position,
            q_table: table_to_wire(self.agent.table()),
            episode: self.episode,
            steps: self.steps,
            total_reward: self.total_reward,
            epsilon: self.agent.epsilon(),
            run_mode: self.run_mode,
            speed_ms: self.speed_ms,
        }
    }

    fn restart_learning(&mut self) {
        self.agent.reset();
        self.position = self.world.start_position();
        self.steps = 0;
        self.total_reward = 0.0;
        self.episode_over = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlearn_core::{Action, Algorithm, CellType, GridLearnError, RewardStrategy};

    fn seeded() -> SimulationState {
        let config = ServerConfig {
            seed: Some(42),
            ..Default::default()
        };
        SimulationState::new(&config).unwrap()
    }

    #[test]
    fn test_default_state() {
        let state = seeded();
        let snap = state.query();
        assert_eq!(snap.env.width, 8);
        assert_eq!(snap.agent_pos, Position::new(0, 0));
        assert_eq!(snap.run_mode, RunMode::Paused);
        assert_eq!(snap.speed_ms, 100);
        assert!(snap.q_table.is_empty());
    }

    #[test]
    fn test_setup_replaces_everything() {
        let mut state = seeded();
        state.episode = 9;
        state.steps = 4;
        state.total_reward = -3.0;
        state.agent.choose_action(Position::new(0, 0));

        let config = SimulationConfig {
            width: 3,
            height: 2,
            cells: Some(vec![
                vec!["wall".into(), "start".into(), "bonus:3".into()],
                vec!["empty".into(), "empty".into(), "target".into()],
            ]),
            algorithm: Algorithm::Sarsa,
            allowed_actions: Some(vec!["DOWN".into(), "right".into()]),
            ..Default::default()
        };
        state.setup(&config).unwrap();

        assert_eq!(state.position, Position::new(1, 0));
        assert_eq!((state.episode, state.steps, state.total_reward), (0, 0, 0.0));
        assert!(state.agent.table().is_empty());
        assert_eq!(state.agent.algorithm(), Algorithm::Sarsa);
        assert_eq!(state.agent.allowed_actions(), &[Action::Down, Action::Right]);
        assert_eq!(state.query().env.cells[0][2], "bonus:3.0");
    }

    #[test]
    fn test_bad_setup_leaves_state_alone() {
        let mut state = seeded();
        let bad = SimulationConfig {
            width: 0,
            ..Default::default()
        };
        assert!(state.setup(&bad).is_err());
        assert_eq!(state.world.width(), 8);

        let bad = SimulationConfig {
            epsilon: 2.0,
            width: 4,
            ..Default::default()
        };
        assert!(state.setup(&bad).is_err());
        assert_eq!(state.world.width(), 8);

        let bad = SimulationConfig {
            width: 4,
            height: 4,
            allowed_actions: Some(vec!["JUMP".into()]),
            ..Default::default()
        };
        assert!(matches!(state.setup(&bad), Err(GridLearnError::UnknownAction(_))));
        assert_eq!(state.world.width(), 8);
    }

    #[test]
    fn test_oversized_setup_is_rejected() {
        let mut state = seeded();
        for (width, height) in [(1 << 33, 1 << 33), (100_000, 100_000), (1, 1)] {
            let bad = SimulationConfig {
                width,
                height,
                ..Default::default()
            };
            assert!(matches!(
                state.setup(&bad),
                Err(GridLearnError::InvalidDimensions { .. })
            ));
            assert_eq!(state.world.width(), 8);
            assert_eq!(state.world.height(), 8);
        }
    }

    #[test]
    fn test_unknown_action_in_update_keeps_config() {
        let mut state = seeded();
        let config = SimulationConfig {
            epsilon: 0.7,
            allowed_actions: Some(vec!["UP".into(), "sideways".into()]),
            ..Default::default()
        };
        assert!(matches!(
            state.update_config(&config),
            Err(GridLearnError::UnknownAction(name)) if name == "sideways"
        ));
        assert_eq!(state.agent.allowed_actions(), &Action::ALL);
        assert_ne!(state.agent.epsilon(), 0.7);
    }

    #[test]
    fn test_update_config_keeps_learning() {
        let mut state = seeded();
        state.agent.choose_action(Position::new(0, 0));
        state.episode = 5;

        let config = SimulationConfig {
            epsilon: 0.7,
            strategy: RewardStrategy::CollectAllRewards,
            step_penalty: -2.0,
            allowed_actions: Some(vec!["LEFT".into()]),
            ..Default::default()
        };
        state.update_config(&config).unwrap();

        assert_eq!(state.agent.table().len(), 1);
        assert_eq!(state.episode, 5);
        assert_eq!(state.agent.epsilon(), 0.7);
        assert_eq!(state.agent.allowed_actions(), &[Action::Left]);
        assert_eq!(state.world.strategy(), RewardStrategy::CollectAllRewards);
        assert_eq!(state.step_penalty, -2.0);
    }

    #[test]
    fn test_maze_and_clear_wipe_learning() {
        let mut state = seeded();
        state.agent.choose_action(Position::new(0, 0));
        state.agent.decay_epsilon();
        state.position = Position::new(3, 3);

        let maze = state.generate_maze();
        assert!(maze.cells.iter().flatten().any(|c| c == "wall"));
        assert!(state.agent.table().is_empty());
        assert_eq!(state.agent.epsilon(), state.agent.initial_epsilon());
        assert_eq!(state.position, Position::new(0, 0));

        state.agent.choose_action(Position::new(0, 0));
        let cleared = state.clear();
        assert!(!cleared.cells.iter().flatten().any(|c| c == "wall"));
        assert!(state.agent.table().is_empty());
    }

    #[test]
    fn test_set_cell() {
        let mut state = seeded();
        let snap = state.set_cell(Position::new(2, 2), "bonus:4").unwrap();
        assert_eq!(snap.cells[2][2], "bonus:4.0");
        assert_eq!(state.world.cell(Position::new(2, 2)), CellType::Bonus);
        assert!(state.set_cell(Position::new(8, 0), "wall").is_err());
    }
}
