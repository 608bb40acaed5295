use std::{fmt, sync::Arc};

use rand::Rng;
use thiserror::Error;

use crate::{env::Environment, mdp::Mdp, util::rand_num_between};

/// Reward of a traversable cell. Any other value ends the episode on entry.
pub const OPEN: f32 = -1.0;

/// Warehouse floor plan. The exit is at the top (+100),
/// shelves and walls are -100, aisles are open.
#[rustfmt::skip]
pub const WAREHOUSE: [[f32; 11]; 11] = [
    [-100.0, -100.0, -100.0, -100.0, -100.0,  100.0, -100.0, -100.0, -100.0, -100.0, -100.0],
    [-100.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0, -100.0],
    [-100.0,   -1.0, -100.0, -100.0, -100.0, -100.0, -100.0,   -1.0, -100.0,   -1.0, -100.0],
    [-100.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0, -100.0,   -1.0, -100.0],
    [-100.0, -100.0, -100.0,   -1.0, -100.0, -100.0, -100.0,   -1.0, -100.0, -100.0, -100.0],
    [  -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0],
    [-100.0, -100.0, -100.0, -100.0, -100.0,   -1.0, -100.0, -100.0, -100.0, -100.0, -100.0],
    [-100.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0, -100.0],
    [-100.0, -100.0, -100.0,   -1.0, -100.0, -100.0, -100.0,   -1.0, -100.0, -100.0, -100.0],
    [  -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0,   -1.0],
    [-100.0, -100.0, -100.0, -100.0, -100.0, -100.0, -100.0, -100.0, -100.0, -100.0, -100.0],
];

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GridWorldState {
    pub row: usize,
    pub col: usize,
}

impl GridWorldState {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for GridWorldState {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridWorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GridWorldAction {
    Up,
    Right,
    Down,
    Left,
}

impl GridWorldAction {
    pub const ALL: [Self; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    #[must_use]
    pub const fn arrow(self) -> char {
        match self {
            Self::Up => '^',
            Self::Right => '>',
            Self::Down => 'v',
            Self::Left => '<',
        }
    }
}

impl fmt::Display for GridWorldAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "UP",
            Self::Right => "RIGHT",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
        })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GridError {
    #[error("grid has no rows")]
    Empty,
    #[error("grid rows have no columns")]
    EmptyRow,
    #[error("row {row} has {found} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("cell ({row}, {col}) is not a finite reward")]
    NonFinite { row: usize, col: usize },
    #[error("grid has no open cell to start from")]
    NoOpenCell,
}

/// A rectangular matrix of rewards, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct GridWorld {
    cells: Box<[f32]>,
    rows: usize,
    cols: usize,
}

impl GridWorld {
    /// Build a grid from its rows.
    ///
    /// # Errors
    ///
    /// Fails if the grid is empty, not rectangular, holds a NaN or infinite
    /// reward, or has no open cell an episode could start on.
    pub fn new<R: AsRef<[f32]>>(grid: &[R]) -> Result<Self, GridError> {
        let first = grid.first().ok_or(GridError::Empty)?;
        let cols = first.as_ref().len();
        if cols == 0 {
            return Err(GridError::EmptyRow);
        }
        if let Some((row, found)) = grid
            .iter()
            .map(|r| r.as_ref().len())
            .enumerate()
            .find(|(_, len)| *len != cols)
        {
            return Err(GridError::Ragged {
                row,
                expected: cols,
                found,
            });
        }

        let cells: Box<[f32]> = grid.iter().flat_map(|r| r.as_ref()).copied().collect();
        if let Some(i) = cells.iter().position(|reward| !reward.is_finite()) {
            return Err(GridError::NonFinite {
                row: i / cols,
                col: i % cols,
            });
        }
        if !cells.iter().copied().any(is_open) {
            return Err(GridError::NoOpenCell);
        }

        Ok(Self {
            cells,
            rows: grid.len(),
            cols,
        })
    }

    /// The sample warehouse floor.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn warehouse() -> Self {
        Self::new(&WAREHOUSE).expect("warehouse grid should be valid")
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn contains(&self, state: GridWorldState) -> bool {
        state.row < self.rows && state.col < self.cols
    }

    /// Reward stored at `state`.
    ///
    /// # Panics
    ///
    /// Panics if `state` is outside the grid.
    #[must_use]
    pub fn reward(&self, state: GridWorldState) -> f32 {
        assert!(self.contains(state), "{state} is outside the grid");
        self.cells[state.row * self.cols + state.col]
    }

    /// Whether `state` can be walked through. Cells outside the grid are not.
    #[must_use]
    pub fn is_open(&self, state: GridWorldState) -> bool {
        self.contains(state) && is_open(self.reward(state))
    }

    pub fn states(&self) -> impl Iterator<Item = GridWorldState> + '_ {
        (0..self.rows)
            .flat_map(move |row| (0..self.cols).map(move |col| GridWorldState { row, col }))
    }

    /// Move one cell in the direction of `action`. Edges block, nothing else does.
    #[must_use]
    pub fn neighbour(&self, state: GridWorldState, action: GridWorldAction) -> GridWorldState {
        let GridWorldState { mut row, mut col } = state;
        match action {
            GridWorldAction::Up if row > 0 => row -= 1,
            GridWorldAction::Right if col + 1 < self.cols => col += 1,
            GridWorldAction::Down if row + 1 < self.rows => row += 1,
            GridWorldAction::Left if col > 0 => col -= 1,
            _ => {}
        }
        GridWorldState { row, col }
    }
}

#[allow(clippy::float_cmp)]
fn is_open(reward: f32) -> bool {
    reward == OPEN
}

impl fmt::Display for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols) {
            for (i, reward) in row.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{reward:>5}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Draw the grid with an arrow on every open cell showing the action
/// `best_action` picks there. Goals are `G`, other terminal cells `#`.
pub fn greedy_map(
    grid: &GridWorld,
    best_action: impl Fn(GridWorldState) -> Option<GridWorldAction>,
) -> String {
    let mut out = String::with_capacity((grid.cols() + 1) * grid.rows());
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let state = GridWorldState { row, col };
            let reward = grid.reward(state);
            out.push(if is_open(reward) {
                best_action(state).map_or('?', GridWorldAction::arrow)
            } else if reward > 0.0 {
                'G'
            } else {
                '#'
            });
        }
        out.push('\n');
    }
    out
}

#[derive(Clone, Debug)]
pub struct GridWorldMdp {
    grid: Arc<GridWorld>,
}

impl GridWorldMdp {
    #[must_use]
    pub fn new(grid: GridWorld) -> Self {
        Self {
            grid: Arc::new(grid),
        }
    }

    #[must_use]
    pub fn grid(&self) -> &GridWorld {
        &self.grid
    }
}

impl Mdp for GridWorldMdp {
    type Action = GridWorldAction;
    type State = GridWorldState;

    fn start_state(&self, rng: &mut impl Rng) -> GridWorldState {
        // Construction guarantees at least one open cell, so this terminates.
        loop {
            let state = GridWorldState {
                row: rand_num_between(rng, 0, self.grid.rows() - 1),
                col: rand_num_between(rng, 0, self.grid.cols() - 1),
            };
            if !self.is_terminal_state(&state) {
                return state;
            }
        }
    }

    fn is_terminal_state(&self, state: &GridWorldState) -> bool {
        !self.grid.is_open(*state)
    }

    fn populate_actions(&self, state: &GridWorldState, actions: &mut Vec<GridWorldAction>) {
        if self.grid.is_open(*state) {
            actions.extend(GridWorldAction::ALL);
        }
    }

    fn reward(&self, state: &GridWorldState) -> f32 {
        self.grid.reward(*state)
    }

    fn states(&self) -> impl Iterator<Item = GridWorldState> + '_ {
        self.grid.states()
    }
}

#[derive(Clone, Debug)]
pub struct GridWorldEnvironment {
    mdp: GridWorldMdp,
    current_state: GridWorldState,
}

impl GridWorldEnvironment {
    pub fn new(mdp: GridWorldMdp, rng: &mut impl Rng) -> Self {
        let current_state = mdp.start_state(rng);
        Self { mdp, current_state }
    }

    #[must_use]
    pub const fn mdp(&self) -> &GridWorldMdp {
        &self.mdp
    }
}

impl Environment for GridWorldEnvironment {
    type Action = GridWorldAction;
    type State = GridWorldState;

    fn current_state(&self) -> &GridWorldState {
        &self.current_state
    }

    fn is_terminal_state(&self, state: &GridWorldState) -> bool {
        self.mdp.is_terminal_state(state)
    }

    fn populate_actions(&self, state: &GridWorldState, actions: &mut Vec<GridWorldAction>) {
        self.mdp.populate_actions(state, actions);
    }

    fn do_action(
        &mut self,
        state: &GridWorldState,
        action: GridWorldAction,
    ) -> (GridWorldState, f32) {
        let next = self.mdp.grid().neighbour(*state, action);
        self.current_state = next;
        (next, self.mdp.reward(&next))
    }

    fn reset(&mut self, rng: &mut impl Rng) {
        self.current_state = self.mdp.start_state(rng);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::{
        GridError,
        GridWorld,
        GridWorldAction,
        GridWorldEnvironment,
        GridWorldMdp,
        GridWorldState,
    };
    use crate::{env::Environment, mdp::Mdp};

    const SEED: u64 = 123;

    #[rustfmt::skip]
    const SMALL: [[f32; 3]; 3] = [
        [-100.0, 100.0, -100.0],
        [  -1.0,  -1.0,   -1.0],
        [  -1.0, -100.0,  -1.0],
    ];

    #[test]
    fn reject_malformed_grids() {
        let empty: [[f32; 0]; 0] = [];
        assert_eq!(GridWorld::new(&empty), Err(GridError::Empty));
        assert_eq!(GridWorld::new(&[[0.0f32; 0]]), Err(GridError::EmptyRow));
        assert_eq!(
            GridWorld::new(&[vec![-1.0f32, -1.0], vec![-1.0]]),
            Err(GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            GridWorld::new(&[[100.0f32, -100.0]]),
            Err(GridError::NoOpenCell)
        );
        assert_eq!(
            GridWorld::new(&[[-1.0f32, f32::NAN]]),
            Err(GridError::NonFinite { row: 0, col: 1 })
        );
        assert_eq!(
            GridWorld::new(&[[-1.0f32, -1.0], [f32::INFINITY, -1.0]]),
            Err(GridError::NonFinite { row: 1, col: 0 })
        );
        assert_eq!(
            GridWorld::new(&[[-1.0f32, f32::NEG_INFINITY]]),
            Err(GridError::NonFinite { row: 0, col: 1 })
        );
    }

    #[test]
    fn outside_the_grid_is_terminal() {
        let mdp = GridWorldMdp::new(GridWorld::new(&SMALL).unwrap());
        let outside = GridWorldState::new(3, 0);
        assert!(mdp.is_terminal_state(&outside));
        let mut actions = Vec::new();
        mdp.populate_actions(&outside, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn warehouse_shape() {
        let grid = GridWorld::warehouse();
        assert_eq!((grid.rows(), grid.cols()), (11, 11));
        assert!((grid.reward(GridWorldState::new(0, 5)) - 100.0).abs() < f32::EPSILON);
        assert!(grid.is_open(GridWorldState::new(5, 5)));
        assert!(!grid.is_open(GridWorldState::new(0, 0)));
    }

    #[test]
    fn moves_are_clamped_to_edges() {
        let grid = GridWorld::new(&SMALL).unwrap();
        let corner = GridWorldState::new(2, 0);
        assert_eq!(grid.neighbour(corner, GridWorldAction::Left), corner);
        assert_eq!(grid.neighbour(corner, GridWorldAction::Down), corner);
        assert_eq!(
            grid.neighbour(corner, GridWorldAction::Up),
            GridWorldState::new(1, 0)
        );
        assert_eq!(
            grid.neighbour(corner, GridWorldAction::Right),
            GridWorldState::new(2, 1)
        );
        let top = GridWorldState::new(0, 1);
        assert_eq!(grid.neighbour(top, GridWorldAction::Up), top);
        let right = GridWorldState::new(1, 2);
        assert_eq!(grid.neighbour(right, GridWorldAction::Right), right);
    }

    #[test]
    fn terminal_cells_have_no_actions() {
        let mdp = GridWorldMdp::new(GridWorld::new(&SMALL).unwrap());
        let mut actions = Vec::new();

        mdp.populate_actions(&GridWorldState::new(0, 1), &mut actions);
        assert!(actions.is_empty());
        assert!(mdp.is_terminal_state(&GridWorldState::new(0, 1)));
        assert!(mdp.is_terminal_state(&GridWorldState::new(2, 1)));

        mdp.populate_actions(&GridWorldState::new(1, 1), &mut actions);
        assert_eq!(actions, GridWorldAction::ALL);
        assert!(!mdp.is_terminal_state(&GridWorldState::new(1, 1)));
    }

    #[test]
    fn start_states_are_open() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(SEED);
        let mdp = GridWorldMdp::new(GridWorld::new(&SMALL).unwrap());
        for _ in 0..500 {
            let state = mdp.start_state(&mut rng);
            assert!(!mdp.is_terminal_state(&state));
        }
        assert_eq!(mdp.states().count(), 9);
    }

    #[test]
    fn walking_into_a_wall_is_allowed_and_ends_the_episode() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(SEED);
        let mdp = GridWorldMdp::new(GridWorld::new(&SMALL).unwrap());
        let mut env = GridWorldEnvironment::new(mdp, &mut rng);
        let start = GridWorldState::new(1, 0);
        let (next, reward) = env.do_action(&start, GridWorldAction::Up);
        assert_eq!(next, GridWorldState::new(0, 0));
        assert!((reward + 100.0).abs() < f32::EPSILON);
        assert_eq!(*env.current_state(), next);
        assert!(env.is_terminal_state(&next));
        let mut actions = Vec::new();
        env.populate_actions(&next, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn reset_lands_on_open_cell() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(SEED);
        let mdp = GridWorldMdp::new(GridWorld::warehouse());
        let mut env = GridWorldEnvironment::new(mdp, &mut rng);
        for _ in 0..100 {
            env.reset(&mut rng);
            assert!(!env.is_terminal_state(env.current_state()));
        }
    }

    #[test]
    fn display() {
        assert_eq!(GridWorldAction::Up.to_string(), "UP");
        assert_eq!(GridWorldAction::Left.to_string(), "LEFT");
        assert_eq!(GridWorldState::new(3, 9).to_string(), "(3, 9)");
        let grid = GridWorld::new(&[[-1.0f32, 100.0]]).unwrap();
        assert_eq!(grid.to_string(), "   -1   100\n");
    }

    #[test]
    fn greedy_map_marks_cells() {
        let grid = GridWorld::new(&SMALL).unwrap();
        let map = super::greedy_map(&grid, |state| {
            (state.col == 1).then_some(GridWorldAction::Up)
        });
        assert_eq!(map, "#G#\n?^?\n?#?\n");
    }
}
