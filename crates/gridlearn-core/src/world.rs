//! The grid world: cell layout, bonus values, transitions and maze generation.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};

use crate::action::Action;
use crate::cell::{CellSpec, CellType, DEFAULT_BONUS_VALUE, format_cell};
use crate::error::{GridLearnError, Result};
use crate::position::Position;
use crate::reward::{COMPLETION_BONUS, RewardStrategy, TARGET_REWARD, TRAP_REWARD};
use crate::snapshot::GridSnapshot;

/// Largest grid accepted by setup
pub const MAX_CELLS: usize = 1_000_000;

/// Start and Target need a cell each
const MIN_CELLS: usize = 2;

/// Outcome of one move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Where the agent ends up (unchanged when blocked)
    pub next: Position,
    /// Reward for the move
    pub reward: f64,
    /// Episode ended with this move
    pub terminal: bool,
    /// Move was blocked by a wall or the grid edge
    pub hit_wall: bool,
    /// Type of the destination cell before any collection
    pub landed: CellType,
}

/// Saved layout restored at every episode boundary
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    cells: Vec<CellType>,
    bonuses: HashMap<Position, f64>,
}

/// A rectangular grid world.
///
/// The *live* layout changes while an episode runs (bonuses get collected);
/// the *initial* layout is what [`GridWorld::reset_to_initial`] restores.
/// Editing, maze generation and clearing rewrite both.
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: usize,
    height: usize,
    strategy: RewardStrategy,
    cells: Vec<CellType>,
    bonuses: HashMap<Position, f64>,
    initial: Layout,
    has_target: bool,
}

impl GridWorld {
    /// Empty world with Start at (0,0) and Target at the bottom-right corner
    pub fn new(width: usize, height: usize, strategy: RewardStrategy) -> Result<Self> {
        check_dimensions(width, height)?;
        let mut world = Self::blank(width, height, strategy);
        world.fill_default();
        world.capture_initial();
        Ok(world)
    }

    /// World built from rows of cell strings (`rows[y][x]`).
    ///
    /// Unknown names and missing cells become `Empty`; `bonus` without a
    /// parseable value gets [`DEFAULT_BONUS_VALUE`]. Only the first `Start`
    /// survives.
    pub fn from_rows(
        width: usize,
        height: usize,
        rows: &[Vec<String>],
        strategy: RewardStrategy,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        let mut world = Self::blank(width, height, strategy);
        let mut seen_start = false;

        for y in 0..height {
            for x in 0..width {
                let Some(raw) = rows.get(y).and_then(|row| row.get(x)) else {
                    continue;
                };
                let spec = CellSpec::parse_lenient(raw);
                let pos = Position::new(x, y);
                let cell = match spec.cell {
                    CellType::Start if seen_start => CellType::Empty,
                    CellType::Start => {
                        seen_start = true;
                        CellType::Start
                    }
                    other => other,
                };
                world.cells[y * width + x] = cell;
                if cell == CellType::Bonus {
                    world
                        .bonuses
                        .insert(pos, spec.bonus.unwrap_or(DEFAULT_BONUS_VALUE));
                }
            }
        }

        world.capture_initial();
        Ok(world)
    }

    fn blank(width: usize, height: usize, strategy: RewardStrategy) -> Self {
        let cells = vec![CellType::Empty; width * height];
        Self {
            width,
            height,
            strategy,
            initial: Layout {
                cells: cells.clone(),
                bonuses: HashMap::new(),
            },
            cells,
            bonuses: HashMap::new(),
            has_target: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn strategy(&self) -> RewardStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: RewardStrategy) {
        self.strategy = strategy;
    }

    /// Whether a Target cell exists in the live grid
    pub fn has_target(&self) -> bool {
        self.has_target
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> usize {
        pos.y * self.width + pos.x
    }

    /// Cell at `pos`; anything outside the grid reads as `Wall`
    pub fn cell(&self, pos: Position) -> CellType {
        if self.contains(pos) {
            self.cells[self.index(pos)]
        } else {
            CellType::Wall
        }
    }

    /// Live bonus value at `pos`, if a bonus is still there
    pub fn bonus_value(&self, pos: Position) -> Option<f64> {
        self.bonuses.get(&pos).copied()
    }

    /// Live bonus map
    pub fn bonuses(&self) -> &HashMap<Position, f64> {
        &self.bonuses
    }

    /// Number of bonus cells still present in the live grid
    pub fn remaining_bonuses(&self) -> usize {
        self.cells.iter().filter(|c| **c == CellType::Bonus).count()
    }

    /// First Start cell in row-major order, (0,0) when there is none
    pub fn start_position(&self) -> Position {
        self.cells
            .iter()
            .position(|c| *c == CellType::Start)
            .map(|i| Position::new(i % self.width, i / self.width))
            .unwrap_or_default()
    }

    /// Whether `action` from `from` lands on an in-bounds, non-wall cell
    pub fn can_move(&self, from: Position, action: Action) -> bool {
        action
            .apply(from, self.width, self.height)
            .is_some_and(|next| self.cell(next) != CellType::Wall)
    }

    /// True when no permitted action leads anywhere (or none is permitted)
    pub fn is_stuck(&self, from: Position, allowed: &[Action]) -> bool {
        !allowed.iter().any(|a| self.can_move(from, *a))
    }

    /// Apply one move from `from`.
    ///
    /// Deterministic for a given layout. Landing on a bonus collects it: the
    /// cell turns `Empty` until the next [`GridWorld::reset_to_initial`].
    pub fn transition(&mut self, from: Position, action: Action, step_penalty: f64) -> Transition {
        let penalty = self.strategy.step_penalty(step_penalty);

        let next = match action.apply(from, self.width, self.height) {
            Some(next) if self.cell(next) != CellType::Wall => next,
            _ => {
                return Transition {
                    next: from,
                    reward: penalty,
                    terminal: false,
                    hit_wall: true,
                    landed: CellType::Wall,
                };
            }
        };

        let landed = self.cell(next);
        let (reward, terminal) = match landed {
            CellType::Target => (TARGET_REWARD, true),
            CellType::Trap => (TRAP_REWARD, true),
            CellType::Bonus => self.collect_bonus(next),
            _ => (penalty, false),
        };

        Transition {
            next,
            reward,
            terminal,
            hit_wall: false,
            landed,
        }
    }

    fn collect_bonus(&mut self, pos: Position) -> (f64, bool) {
        let value = self.bonuses.remove(&pos).unwrap_or(DEFAULT_BONUS_VALUE);
        let idx = self.index(pos);
        self.cells[idx] = CellType::Empty;

        let mut reward = self.strategy.bonus_reward(value);
        let mut terminal = false;
        if self.strategy == RewardStrategy::CollectAllRewards
            && !self.has_target
            && self.remaining_bonuses() == 0
        {
            reward += COMPLETION_BONUS;
            terminal = true;
        }
        (reward, terminal)
    }

    /// Restore the live grid and bonus map from the initial layout
    pub fn reset_to_initial(&mut self) {
        self.cells.clone_from(&self.initial.cells);
        self.bonuses.clone_from(&self.initial.bonuses);
        self.refresh_metadata();
    }

    /// Editor path: change one cell in both the live and initial layouts.
    ///
    /// Placing a Start demotes any other Start to Empty.
    pub fn set_cell(&mut self, pos: Position, spec: CellSpec) -> Result<()> {
        if !self.contains(pos) {
            return Err(GridLearnError::OutOfBounds { x: pos.x, y: pos.y });
        }
        let idx = self.index(pos);

        if spec.cell == CellType::Start {
            for layout_cells in [&mut self.cells, &mut self.initial.cells] {
                for cell in layout_cells.iter_mut().filter(|c| **c == CellType::Start) {
                    *cell = CellType::Empty;
                }
            }
        }

        self.cells[idx] = spec.cell;
        self.initial.cells[idx] = spec.cell;
        if spec.cell == CellType::Bonus {
            let value = spec.bonus.unwrap_or(DEFAULT_BONUS_VALUE);
            self.bonuses.insert(pos, value);
            self.initial.bonuses.insert(pos, value);
        } else {
            self.bonuses.remove(&pos);
            self.initial.bonuses.remove(&pos);
        }

        self.refresh_metadata();
        Ok(())
    }

    /// Reset to an empty grid with only Start and Target, no bonuses
    pub fn clear(&mut self) {
        self.fill_default();
        self.capture_initial();
    }

    /// Carve a randomized depth-first maze.
    ///
    /// Carving runs on odd coordinates from (1,1) inside the border, then
    /// Start (0,0) and Target (bottom-right) are joined to the carved network
    /// and a bounded number of walls are punched out to create loops. Grids
    /// of 3 or fewer rows or columns are simply cleared.
    pub fn generate_maze<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let (w, h) = (self.width, self.height);
        if w <= 3 || h <= 3 {
            self.clear();
            return;
        }

        self.cells.fill(CellType::Wall);
        self.bonuses.clear();

        let origin = Position::new(1, 1);
        self.put(origin, CellType::Empty);
        let mut stack = vec![origin];
        let mut visited = HashSet::from([origin]);

        while let Some(&current) = stack.last() {
            let neighbors: Vec<Position> = [(0i64, 2i64), (0, -2), (2, 0), (-2, 0)]
                .into_iter()
                .filter_map(|(dx, dy)| {
                    let nx = current.x as i64 + dx;
                    let ny = current.y as i64 + dy;
                    let inside = nx > 0 && ny > 0 && nx < w as i64 - 1 && ny < h as i64 - 1;
                    inside.then(|| Position::new(nx as usize, ny as usize))
                })
                .filter(|p| !visited.contains(p))
                .collect();

            match neighbors.choose(rng) {
                Some(&next) => {
                    let between = Position::new((current.x + next.x) / 2, (current.y + next.y) / 2);
                    self.put(between, CellType::Empty);
                    self.put(next, CellType::Empty);
                    visited.insert(next);
                    stack.push(next);
                }
                None => {
                    stack.pop();
                }
            }
        }

        // Start corridor into (1,1)
        self.put(Position::new(0, 0), CellType::Start);
        self.put(Position::new(1, 0), CellType::Empty);
        self.put(Position::new(1, 1), CellType::Empty);

        // Target corridor along the bottom row and right column
        let target = Position::new(w - 1, h - 1);
        for pos in [
            Position::new(w - 1, h - 2),
            Position::new(w - 1, h - 3),
            Position::new(w - 2, h - 1),
            Position::new(w - 3, h - 1),
        ] {
            self.put(pos, CellType::Empty);
        }
        // ...and on to the nearest carved lattice cell
        let lattice_x = if (w - 2) % 2 == 1 { w - 2 } else { w - 3 };
        let lattice_y = if (h - 2) % 2 == 1 { h - 2 } else { h - 3 };
        for x in lattice_x..w {
            self.put(Position::new(x, h - 1), CellType::Empty);
        }
        for y in lattice_y..h {
            self.put(Position::new(lattice_x, y), CellType::Empty);
        }

        for _ in 0..(w * h) / 10 {
            let candidate = Position::new(rng.gen_range(1..=w - 2), rng.gen_range(1..=h - 2));
            if self.cell(candidate) != CellType::Wall {
                continue;
            }
            let open = Action::ALL
                .into_iter()
                .filter_map(|a| a.apply(candidate, w, h))
                .filter(|p| self.cell(*p) == CellType::Empty)
                .count();
            if open >= 2 {
                self.put(candidate, CellType::Empty);
            }
        }

        self.put(target, CellType::Target);
        self.capture_initial();
    }

    /// Serialisable view of the live grid
    pub fn snapshot(&self) -> GridSnapshot {
        let cells = (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let pos = Position::new(x, y);
                        format_cell(self.cell(pos), self.bonus_value(pos))
                    })
                    .collect()
            })
            .collect();
        GridSnapshot {
            width: self.width,
            height: self.height,
            cells,
        }
    }

    fn put(&mut self, pos: Position, cell: CellType) {
        let idx = self.index(pos);
        self.cells[idx] = cell;
    }

    fn fill_default(&mut self) {
        self.cells.fill(CellType::Empty);
        self.bonuses.clear();
        self.put(Position::new(0, 0), CellType::Start);
        self.put(Position::new(self.width - 1, self.height - 1), CellType::Target);
    }

    fn capture_initial(&mut self) {
        self.initial = Layout {
            cells: self.cells.clone(),
            bonuses: self.bonuses.clone(),
        };
        self.refresh_metadata();
    }

    fn refresh_metadata(&mut self) {
        self.has_target = self.cells.contains(&CellType::Target);
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<()> {
    match width.checked_mul(height) {
        Some(cells) if (MIN_CELLS..=MAX_CELLS).contains(&cells) => Ok(()),
        _ => Err(GridLearnError::InvalidDimensions { width, height }),
    }
}
