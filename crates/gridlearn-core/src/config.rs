//! Simulation setup / configuration request

use serde::{Deserialize, Serialize};

use crate::action::{Action, normalize_actions};
use crate::agent::{AgentParams, Algorithm};
use crate::error::Result;
use crate::reward::RewardStrategy;

/// Full simulation configuration.
///
/// Used both for setup (replaces world and agent) and for in-place config
/// updates (where the grid fields are ignored). Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    /// Rows of cell strings; `None` gives the default layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<Vec<String>>>,
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    pub algorithm: Algorithm,
    pub step_penalty: f64,
    pub strategy: RewardStrategy,
    /// Permitted action names (case-insensitive); missing or empty means
    /// all four
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<Vec<String>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let params = AgentParams::default();
        Self {
            width: 8,
            height: 8,
            cells: None,
            alpha: params.alpha,
            gamma: params.gamma,
            epsilon: params.epsilon,
            epsilon_decay: params.epsilon_decay,
            min_epsilon: params.min_epsilon,
            algorithm: params.algorithm,
            step_penalty: -1.0,
            strategy: RewardStrategy::default(),
            allowed_actions: None,
        }
    }
}

impl SimulationConfig {
    /// Validated agent hyperparameters
    pub fn agent_params(&self) -> Result<AgentParams> {
        let params = AgentParams {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon: self.epsilon,
            epsilon_decay: self.epsilon_decay,
            min_epsilon: self.min_epsilon,
            algorithm: self.algorithm,
        };
        params.validate()?;
        Ok(params)
    }

    /// Permitted actions with the "empty means all" rule applied.
    ///
    /// Fails with `UnknownAction` on the first unrecognised name.
    pub fn actions(&self) -> Result<Vec<Action>> {
        let parsed = self
            .allowed_actions
            .as_deref()
            .map(|names| names.iter().map(|n| n.parse()).collect::<Result<Vec<Action>>>())
            .transpose()?;
        Ok(normalize_actions(parsed.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridLearnError;

    #[test]
    fn test_defaults_from_partial_json() {
        let json = r#"{"width": 5, "height": 4, "algorithm": "SARSA", "strategy": "collect_all"}"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.width, 5);
        assert_eq!(config.height, 4);
        assert_eq!(config.algorithm, Algorithm::Sarsa);
        assert_eq!(config.strategy, RewardStrategy::CollectAllRewards);
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.step_penalty, -1.0);
        assert_eq!(config.actions().unwrap(), Action::ALL.to_vec());
    }

    #[test]
    fn test_allowed_actions() {
        let json = r#"{"allowed_actions": ["RIGHT", "down"]}"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.actions().unwrap(), vec![Action::Down, Action::Right]);

        let json = r#"{"allowed_actions": []}"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.actions().unwrap(), Action::ALL.to_vec());
    }

    #[test]
    fn test_unknown_action_name() {
        let json = r#"{"allowed_actions": ["UP", "JUMP"]}"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        match config.actions() {
            Err(GridLearnError::UnknownAction(name)) => assert_eq!(name, "JUMP"),
            other => panic!("expected UnknownAction, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = SimulationConfig {
            gamma: -0.5,
            ..Default::default()
        };
        assert!(config.agent_params().is_err());
    }
}
