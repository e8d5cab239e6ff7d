use std::fmt::{Display, Formatter};

use ndarray::Array2;

use crate::board::{print, Board};
use crate::cell::CellKind;
use crate::error::ArityError;
use crate::location::Location;
use crate::model::Assignment;

/// Whether a [`Solution`] is known to be the best possible.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Optimality {
    /// The search space was exhausted; nothing scores higher.
    Proven,
    /// The search stopped early; something better may exist.
    BestFound,
}

/// The result of [`Board::solve`].
#[derive(Clone, Debug)]
pub enum Outcome {
    /// A placement was found; see [`Solution::optimality`] for whether it is the best one.
    Solved(Solution),
    /// No placement within the budget satisfies the enclosure rules.
    Infeasible,
    /// The search stopped early before finding any valid placement.
    Undecided,
}

impl Outcome {
    /// The solution, if one was found.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Self::Solved(solution) => Some(solution),
            _ => None,
        }
    }
}

/// A board with blockers placed, read back from a winning [`Assignment`].
#[derive(Clone, Debug)]
pub struct Solution {
    grid: Array2<CellKind>,
    reachable: Array2<bool>,
    blockers: usize,
    objective: i64,
    optimality: Optimality,
}

impl Solution {
    /// Overwrite every blocked cell of `board` with [`CellKind::Blocker`] and lay `reachable` out in the same shape.
    ///
    /// Fails if `assignment` does not cover exactly the cells of `board`.
    pub fn extract(board: &Board, assignment: &Assignment, objective: i64, optimality: Optimality) -> Result<Self, ArityError> {
        let found = assignment.arity()?;
        if found != board.cell_count() {
            return Err(ArityError { expected: board.cell_count(), found });
        }

        let grid = Array2::from_shape_fn(board.cells.raw_dim(), |index| {
            let id = board.id_of(Location::from(index));
            if assignment.blocked[id] {
                CellKind::Blocker
            } else {
                board.cells[index]
            }
        });
        let reachable = Array2::from_shape_fn(board.cells.raw_dim(), |index| assignment.reachable[board.id_of(Location::from(index))]);

        Ok(Self {
            grid,
            reachable,
            blockers: assignment.blockers(),
            objective,
            optimality,
        })
    }

    /// The solved grid, indexed `(row, col)`.
    pub fn grid(&self) -> &Array2<CellKind> {
        &self.grid
    }

    /// Reachability of every cell, indexed `(row, col)`.
    pub fn reachable(&self) -> &Array2<bool> {
        &self.reachable
    }

    /// The kind of the cell at `location` after solving, [`CellKind::Blocker`] where one was placed.
    pub fn kind(&self, location: Location) -> Option<CellKind> {
        self.grid.get(location.as_index()).copied()
    }

    /// Whether `location` is reachable from the start. Off-board locations are not.
    pub fn is_reachable(&self, location: Location) -> bool {
        self.reachable.get(location.as_index()).copied().unwrap_or(false)
    }

    /// Number of blockers placed.
    pub fn blockers(&self) -> usize {
        self.blockers
    }

    /// Total score of the reachable cells.
    pub fn objective(&self) -> i64 {
        self.objective
    }

    /// Whether this placement is known to score highest.
    pub fn optimality(&self) -> Optimality {
        self.optimality
    }

    /// Locations of every placed blocker, row-major.
    pub fn blocker_locations(&self) -> Vec<Location> {
        self.grid.indexed_iter()
            .filter(|(_, kind)| kind.is_blocker())
            .map(|(index, _)| Location::from(index))
            .collect()
    }

    /// Reachability as text: `#` for reachable cells, `.` for the rest.
    pub fn render_reachable(&self) -> String {
        print(&self.reachable.map(|reachable| if *reachable { '#' } else { '.' }))
    }
}

impl Display for Solution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", print(&self.grid.map(CellKind::symbol)))
    }
}
