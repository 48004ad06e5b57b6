//! Movement actions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GridLearnError;
use crate::position::Position;

/// One of the four grid moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    /// Every action, in canonical order
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Returned when an agent has no permitted action at all
    pub const FALLBACK: Action = Action::Up;

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
        }
    }

    /// Movement delta as (dx, dy); y grows downwards
    pub fn delta(self) -> (i64, i64) {
        match self {
            Action::Up => (0, -1),
            Action::Down => (0, 1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
        }
    }

    /// Destination of this move inside a `width`x`height` grid, or `None`
    /// when it would leave the grid.
    pub fn apply(self, from: Position, width: usize, height: usize) -> Option<Position> {
        let (dx, dy) = self.delta();
        let x = from.x as i64 + dx;
        let y = from.y as i64 + dy;
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return None;
        }
        Some(Position::new(x as usize, y as usize))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = GridLearnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(Action::Up),
            "DOWN" => Ok(Action::Down),
            "LEFT" => Ok(Action::Left),
            "RIGHT" => Ok(Action::Right),
            _ => Err(GridLearnError::UnknownAction(s.to_string())),
        }
    }
}

/// Normalise a requested action subset: `None` or empty means all four,
/// duplicates are dropped and canonical order is kept.
pub fn normalize_actions(requested: Option<&[Action]>) -> Vec<Action> {
    match requested {
        Some(actions) if !actions.is_empty() => Action::ALL
            .into_iter()
            .filter(|a| actions.contains(a))
            .collect(),
        _ => Action::ALL.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&Action::Right).unwrap();
        assert_eq!(json, "\"RIGHT\"");

        let action: Action = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(action, Action::Down);
        assert_eq!("left".parse::<Action>().unwrap(), Action::Left);
        assert!("jump".parse::<Action>().is_err());
    }

    #[test]
    fn test_apply_respects_bounds() {
        let corner = Position::new(0, 0);
        assert_eq!(Action::Up.apply(corner, 3, 3), None);
        assert_eq!(Action::Left.apply(corner, 3, 3), None);
        assert_eq!(Action::Down.apply(corner, 3, 3), Some(Position::new(0, 1)));
        assert_eq!(Action::Right.apply(corner, 3, 3), Some(Position::new(1, 0)));
        assert_eq!(Action::Right.apply(Position::new(2, 1), 3, 3), None);
        assert_eq!(Action::Down.apply(Position::new(1, 2), 3, 3), None);
    }

    #[test]
    fn test_normalize_actions() {
        assert_eq!(normalize_actions(None), Action::ALL.to_vec());
        assert_eq!(normalize_actions(Some(&[])), Action::ALL.to_vec());
        assert_eq!(
            normalize_actions(Some(&[Action::Right, Action::Down, Action::Right])),
            vec![Action::Down, Action::Right]
        );
    }
}
