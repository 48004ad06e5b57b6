//! Cell types and their string form

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GridLearnError;

/// Bonus value used for `"bonus"` cells without a value, or with one that
/// does not parse.
pub const DEFAULT_BONUS_VALUE: f64 = 20.0;

/// What occupies a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Empty,
    Wall,
    Start,
    Target,
    Trap,
    Bonus,
}

impl CellType {
    pub fn as_str(self) -> &'static str {
        match self {
            CellType::Empty => "empty",
            CellType::Wall => "wall",
            CellType::Start => "start",
            CellType::Target => "target",
            CellType::Trap => "trap",
            CellType::Bonus => "bonus",
        }
    }

    /// Target and Trap end an episode when occupied
    pub fn is_terminal(self) -> bool {
        matches!(self, CellType::Target | CellType::Trap)
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellType {
    type Err = GridLearnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(CellType::Empty),
            "wall" => Ok(CellType::Wall),
            "start" => Ok(CellType::Start),
            "target" => Ok(CellType::Target),
            "trap" => Ok(CellType::Trap),
            "bonus" => Ok(CellType::Bonus),
            _ => Err(GridLearnError::UnknownCell(s.to_string())),
        }
    }
}

/// A parsed cell string: the type plus, for bonuses, its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSpec {
    pub cell: CellType,
    pub bonus: Option<f64>,
}

impl CellSpec {
    pub fn plain(cell: CellType) -> Self {
        Self { cell, bonus: None }
    }

    pub fn bonus(value: f64) -> Self {
        Self {
            cell: CellType::Bonus,
            bonus: Some(value),
        }
    }

    /// Lenient parse used for editor and setup input. Anything starting with
    /// `bonus` is a bonus (`bonus:<v>` carries a value); unknown names fall
    /// back to `Empty`.
    pub fn parse_lenient(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix("bonus") {
            let value = rest
                .strip_prefix(':')
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(DEFAULT_BONUS_VALUE);
            return Self::bonus(value);
        }
        Self::plain(s.parse().unwrap_or_default())
    }
}

/// String form of a cell for snapshots; bonuses inline their value.
pub fn format_cell(cell: CellType, bonus: Option<f64>) -> String {
    match cell {
        CellType::Bonus => format!("bonus:{:?}", bonus.unwrap_or(DEFAULT_BONUS_VALUE)),
        other => other.as_str().to_string(),
    }
}
