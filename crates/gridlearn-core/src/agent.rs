//! Tabular Q-Learning / SARSA agent

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::action::{Action, normalize_actions};
use crate::error::{GridLearnError, Result};
use crate::position::Position;

/// Value-update rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// Off-policy: bootstrap from the best next action
    #[default]
    #[serde(rename = "Q-Learning")]
    QLearning,
    /// On-policy: bootstrap from the action actually taken next
    #[serde(rename = "SARSA")]
    Sarsa,
}

/// Learning hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    /// Learning rate
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Exploration rate
    pub epsilon: f64,
    /// Multiplier applied to epsilon after every episode
    pub epsilon_decay: f64,
    /// Floor for epsilon decay
    pub min_epsilon: f64,
    pub algorithm: Algorithm,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.2,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
            algorithm: Algorithm::QLearning,
        }
    }
}

impl AgentParams {
    /// Reject values outside their meaningful ranges
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(GridLearnError::InvalidParameter(format!(
                    "{name} must be within [0, 1], got {v}"
                )))
            }
        };
        unit("alpha", self.alpha)?;
        unit("gamma", self.gamma)?;
        unit("epsilon", self.epsilon)?;
        unit("epsilon_decay", self.epsilon_decay)?;
        unit("min_epsilon", self.min_epsilon)
    }
}

/// Values for the actions known at one state
pub type ActionValues = BTreeMap<Action, f64>;

/// State -> action -> value
pub type ValueTable = HashMap<Position, ActionValues>;

/// Result of [`TabularAgent::choose_action`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionChoice {
    pub action: Action,
    /// Picked by the epsilon branch rather than greedily
    pub exploratory: bool,
    /// Stored value of the chosen action
    pub value: f64,
}

/// A tabular learner over grid positions.
///
/// Rows are created lazily on first visit with one zero entry per action
/// permitted at that moment. Rows never grow when the permitted set later
/// widens; updates for actions missing from a row are ignored.
#[derive(Debug, Clone)]
pub struct TabularAgent {
    params: AgentParams,
    initial_epsilon: f64,
    actions: Vec<Action>,
    table: ValueTable,
    rng: StdRng,
}

impl TabularAgent {
    /// Agent seeded from OS entropy
    pub fn new(params: AgentParams, allowed: Option<&[Action]>) -> Self {
        Self::with_rng(params, allowed, StdRng::from_entropy())
    }

    /// Agent with a reproducible random stream
    pub fn with_seed(params: AgentParams, allowed: Option<&[Action]>, seed: u64) -> Self {
        Self::with_rng(params, allowed, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: AgentParams, allowed: Option<&[Action]>, rng: StdRng) -> Self {
        Self {
            initial_epsilon: params.epsilon,
            params,
            actions: normalize_actions(allowed),
            table: HashMap::new(),
            rng,
        }
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    /// Replace hyperparameters in place; the table and the initial epsilon
    /// are kept.
    pub fn set_params(&mut self, params: AgentParams) {
        self.params = params;
    }

    pub fn algorithm(&self) -> Algorithm {
        self.params.algorithm
    }

    pub fn epsilon(&self) -> f64 {
        self.params.epsilon
    }

    pub fn initial_epsilon(&self) -> f64 {
        self.initial_epsilon
    }

    /// Currently permitted actions
    pub fn allowed_actions(&self) -> &[Action] {
        &self.actions
    }

    /// Replace the permitted set as-is (an empty set is allowed here)
    pub fn set_allowed_actions(&mut self, actions: Vec<Action>) {
        self.actions = actions;
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    pub fn row(&self, state: Position) -> Option<&ActionValues> {
        self.table.get(&state)
    }

    fn ensure_row(&mut self, state: Position) -> &mut ActionValues {
        let actions = &self.actions;
        self.table
            .entry(state)
            .or_insert_with(|| actions.iter().map(|a| (*a, 0.0)).collect())
    }

    /// Epsilon-greedy choice among the permitted actions.
    ///
    /// Greedy ties are broken uniformly at random.
    pub fn choose_action(&mut self, state: Position) -> ActionChoice {
        self.ensure_row(state);
        if self.actions.is_empty() {
            return ActionChoice {
                action: Action::FALLBACK,
                exploratory: false,
                value: 0.0,
            };
        }

        let row = &self.table[&state];
        let value_of = |a: &Action| row.get(a).copied().unwrap_or(0.0);

        // Actions permitted after this row was created have no entry and are
        // not eligible here, unless nothing else is.
        let mut candidates: Vec<Action> = self
            .actions
            .iter()
            .copied()
            .filter(|a| row.contains_key(a))
            .collect();
        if candidates.is_empty() {
            candidates = self.actions.clone();
        }

        let (action, exploratory) = if self.rng.r#gen::<f64>() < self.params.epsilon {
            (candidates[self.rng.gen_range(0..candidates.len())], true)
        } else {
            let best = candidates
                .iter()
                .map(value_of)
                .fold(f64::NEG_INFINITY, f64::max);
            let ties: Vec<Action> = candidates
                .iter()
                .copied()
                .filter(|a| value_of(a) == best)
                .collect();
            let action = ties.choose(&mut self.rng).copied().unwrap_or(candidates[0]);
            (action, false)
        };

        ActionChoice {
            action,
            exploratory,
            value: value_of(&action),
        }
    }

    /// Best known action at `state`, first in canonical order on ties.
    /// `None` for unvisited or empty rows.
    pub fn best_action(&self, state: Position) -> Option<Action> {
        let row = self.table.get(&state)?;
        row.iter()
            .fold(None, |best: Option<(Action, f64)>, (a, v)| match best {
                Some((_, bv)) if bv >= *v => best,
                _ => Some((*a, *v)),
            })
            .map(|(a, _)| a)
    }

    /// Apply `Q(s,a) += alpha * (reward + gamma * target - Q(s,a))`.
    ///
    /// `target` is 0 on terminal transitions, otherwise the max over the next
    /// row (Q-Learning) or the value of `next_action` (SARSA, falling back to
    /// the max when no next action is given). A no-op when `action` has no
    /// entry in the row for `state`.
    pub fn update_value(
        &mut self,
        state: Position,
        action: Action,
        reward: f64,
        next: Position,
        terminal: bool,
        next_action: Option<Action>,
    ) {
        if !self.ensure_row(state).contains_key(&action) {
            return;
        }

        let target = if terminal {
            0.0
        } else {
            let algorithm = self.params.algorithm;
            let next_row = self.ensure_row(next);
            let best = next_row.values().copied().fold(f64::NEG_INFINITY, f64::max);
            let best = if best.is_finite() { best } else { 0.0 };
            match (algorithm, next_action) {
                (Algorithm::Sarsa, Some(a)) => next_row.get(&a).copied().unwrap_or(best),
                _ => best,
            }
        };

        let AgentParams { alpha, gamma, .. } = self.params;
        if let Some(q) = self.table.get_mut(&state).and_then(|row| row.get_mut(&action)) {
            *q += alpha * (reward + gamma * target - *q);
        }
    }

    /// Multiply epsilon by the decay factor, never going below the floor.
    /// Called once per finished episode.
    pub fn decay_epsilon(&mut self) {
        let p = &mut self.params;
        if p.epsilon > p.min_epsilon {
            p.epsilon = (p.epsilon * p.epsilon_decay).max(p.min_epsilon);
        }
    }

    /// Forget everything learned and restore the initial epsilon
    pub fn reset(&mut self) {
        self.table.clear();
        self.params.epsilon = self.initial_epsilon;
    }
}
