//! Reward strategies and reward constants

use serde::{Deserialize, Serialize};

/// Reward for reaching the target
pub const TARGET_REWARD: f64 = 100.0;
/// Reward for stepping into a trap
pub const TRAP_REWARD: f64 = -100.0;
/// Penalty applied when the agent has no viable move
pub const STUCK_PENALTY: f64 = -100.0;
/// Extra reward for collecting the last bonus in a world without a target
pub const COMPLETION_BONUS: f64 = 100.0;

const COLLECT_ALL_STEP_PENALTY: f64 = -0.1;
const COLLECT_ALL_MIN_BONUS: f64 = 50.0;
const COLLECT_ALL_BONUS_SCALE: f64 = 2.5;

/// How the world shapes rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RewardStrategy {
    /// Reach the target in as few steps as possible
    #[default]
    #[serde(rename = "minimize_steps")]
    MinimizeSteps,
    /// Explore and collect every bonus
    #[serde(rename = "collect_all")]
    CollectAllRewards,
}

impl RewardStrategy {
    /// Step penalty actually applied. `CollectAllRewards` overrides the
    /// caller's value so exploration stays cheap next to bonus payoffs.
    pub fn step_penalty(self, requested: f64) -> f64 {
        match self {
            RewardStrategy::MinimizeSteps => requested,
            RewardStrategy::CollectAllRewards => COLLECT_ALL_STEP_PENALTY,
        }
    }

    /// Reward for collecting a bonus worth `value`
    pub fn bonus_reward(self, value: f64) -> f64 {
        match self {
            RewardStrategy::MinimizeSteps => value,
            RewardStrategy::CollectAllRewards => {
                COLLECT_ALL_MIN_BONUS.max(value * COLLECT_ALL_BONUS_SCALE)
            }
        }
    }
}
