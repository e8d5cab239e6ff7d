//! The solver-agnostic constraint model of a board.
//!
//! Every cell `c` owns three decision variables: `blocked[c]`, `reachable[c]`, and `distance[c]`, an integer in `-1..=max_distance`
//! where `-1` stands for "not reached". A [`Model`] lists the conjunction of [`Constraint`]s over them together with the [`Objective`].
//! [`Model::check`] is the ground truth for what a valid [`Assignment`] is; search engines are free to encode it however they like.

use itertools::Itertools;
use tracing::debug;

use crate::board::Board;
use crate::error::{ArityError, ConstraintViolation};

/// Index of a cell, row-major.
pub type CellId = usize;

/// One clause of the model. All constraints must hold simultaneously.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Constraint {
    /// `reachable[cell] <=> distance[cell] >= 0`
    ReachableIffDistance { cell: CellId },
    /// `blocked[cell] => distance[cell] = -1`
    BlockedExcludes { cell: CellId },
    /// `blocked[cell] = value`
    FixBlocked { cell: CellId, value: bool },
    /// `reachable[cell] = value`
    FixReachable { cell: CellId, value: bool },
    /// `distance[cell] = distance`
    FixDistance { cell: CellId, distance: i64 },
    /// `distance[cell] != 0`
    NonZeroDistance { cell: CellId },
    /// `(!blocked[cell] && reachable[from]) => reachable[cell]`
    Propagate { cell: CellId, from: CellId },
    /// `distance[cell] >= 1 => exists n in neighbors: reachable[n] && distance[n] = distance[cell] - 1`
    ///
    /// With no neighbors at all, `distance[cell] <= 0`.
    Justified { cell: CellId, neighbors: Vec<CellId> },
    /// `sum(blocked) <= limit`
    Budget { limit: usize },
}

/// `maximize sum(weight * reachable[cell])`
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Objective {
    /// Weight of each cell, for every cell that scores when reachable.
    pub terms: Vec<(CellId, i64)>,
}

/// A full assignment to every decision variable, indexed by [`CellId`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Assignment {
    /// Whether each cell holds a blocker.
    pub blocked: Vec<bool>,
    /// Whether each cell is reachable from the start.
    pub reachable: Vec<bool>,
    /// Steps from the start, `-1` where unreached.
    pub distance: Vec<i64>,
}

impl Assignment {
    /// Number of cells this assignment covers, provided all three variable families agree.
    pub fn arity(&self) -> Result<usize, ArityError> {
        let found = self.blocked.len();
        for other in [self.reachable.len(), self.distance.len()] {
            if other != found {
                return Err(ArityError { expected: found, found: other });
            }
        }

        Ok(found)
    }

    /// Number of blocked cells.
    pub fn blockers(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }
}

/// Variables, constraints, and objective of one solve.
#[derive(Clone, Debug)]
pub struct Model {
    /// Number of cells, and so the length of every variable family.
    pub cells: usize,
    /// Largest distance any cell may take.
    pub max_distance: i64,
    /// Most blockers that may be placed.
    pub budget: usize,
    /// Everything an assignment must satisfy.
    pub constraints: Vec<Constraint>,
    /// What the search maximizes.
    pub objective: Objective,
}

impl Model {
    /// Build the full constraint system for placing at most `budget` blockers on `board`.
    ///
    /// # Rules
    /// Water is inert: never blocked, never reached, distance `-1`, and nothing else is said about it.
    ///
    /// Only land may be blocked. The start is reached at distance `0`, and no other cell may claim distance `0`.
    ///
    /// Land and items on the border are never reachable.
    /// A portal on the border is unreachable and so is its exit, wherever that exit lies.
    ///
    /// Reachability spreads along every edge into unblocked cells, and any positive distance is justified by a reachable neighbor one step closer.
    /// The latter is what rules out reachable islands cut off from the start.
    pub fn formulate(board: &Board, budget: usize) -> Self {
        let cells = board.cell_count();
        let max_distance = board.cells.iter().filter(|kind| !kind.is_water()).count() as i64;
        let mut constraints = Vec::with_capacity(cells * 8);
        let mut objective = Objective::default();

        for location in board.locations() {
            let cell = board.id_of(location);
            let kind = board.cells[location.as_index()];
            let neighbors = board.neighbors(location).into_iter()
                .map(|neighbor| board.id_of(neighbor))
                .collect_vec();

            constraints.push(Constraint::ReachableIffDistance { cell });
            constraints.push(Constraint::BlockedExcludes { cell });
            objective.terms.push((cell, kind.weight()));

            if kind.is_water() {
                constraints.push(Constraint::FixBlocked { cell, value: false });
                constraints.push(Constraint::FixReachable { cell, value: false });
                constraints.push(Constraint::FixDistance { cell, distance: -1 });
                continue;
            }

            if !kind.blockable() {
                constraints.push(Constraint::FixBlocked { cell, value: false });
            }

            if kind.is_start() {
                constraints.push(Constraint::FixReachable { cell, value: true });
                constraints.push(Constraint::FixDistance { cell, distance: 0 });
            } else {
                constraints.push(Constraint::NonZeroDistance { cell });
            }

            if board.on_border(location) {
                if kind.sealed_on_border() {
                    constraints.push(Constraint::FixReachable { cell, value: false });
                }

                if kind.is_portal() {
                    constraints.push(Constraint::FixReachable { cell, value: false });
                    if let Some(exit) = board.portal_exit(location) {
                        constraints.push(Constraint::FixReachable { cell: board.id_of(exit), value: false });
                    }
                }
            }

            for from in neighbors.iter() {
                constraints.push(Constraint::Propagate { cell, from: *from });
            }

            constraints.push(Constraint::Justified { cell, neighbors });
        }

        constraints.push(Constraint::Budget { limit: budget });

        debug!(cells, budget, constraints = constraints.len(), "formulated model");

        Self {
            cells,
            max_distance,
            budget,
            constraints,
            objective,
        }
    }

    /// Value of the objective under `assignment`.
    pub fn evaluate(&self, assignment: &Assignment) -> Result<i64, ArityError> {
        self.check_arity(assignment)?;

        Ok(self.objective.terms.iter()
            .filter(|(cell, _)| assignment.reachable[*cell])
            .map(|(_, weight)| weight)
            .sum())
    }

    fn check_arity(&self, assignment: &Assignment) -> Result<(), ArityError> {
        let found = assignment.arity()?;
        if found != self.cells {
            return Err(ArityError { expected: self.cells, found });
        }

        Ok(())
    }

    /// Verify that `assignment` satisfies every constraint and keeps every distance in its domain.
    ///
    /// Returns the first violated constraint.
    pub fn check(&self, assignment: &Assignment) -> Result<(), ConstraintViolation> {
        self.check_arity(assignment).map_err(|err| ConstraintViolation {
            index: 0,
            description: err.to_string(),
        })?;

        let Assignment { blocked, reachable, distance } = assignment;

        if let Some(cell) = (0..self.cells).find(|cell| !(-1..=self.max_distance).contains(&distance[*cell])) {
            return Err(ConstraintViolation {
                index: 0,
                description: format!("distance {} of cell {cell} outside -1..={}", distance[cell], self.max_distance),
            });
        }

        for (index, constraint) in self.constraints.iter().enumerate() {
            let holds = match constraint {
                Constraint::ReachableIffDistance { cell } => reachable[*cell] == (distance[*cell] >= 0),
                Constraint::BlockedExcludes { cell } => !blocked[*cell] || distance[*cell] == -1,
                Constraint::FixBlocked { cell, value } => blocked[*cell] == *value,
                Constraint::FixReachable { cell, value } => reachable[*cell] == *value,
                Constraint::FixDistance { cell, distance: fixed } => distance[*cell] == *fixed,
                Constraint::NonZeroDistance { cell } => distance[*cell] != 0,
                Constraint::Propagate { cell, from } => blocked[*cell] || !reachable[*from] || reachable[*cell],
                Constraint::Justified { cell, neighbors } => distance[*cell] < 1
                    || neighbors.iter().any(|n| reachable[*n] && distance[*n] == distance[*cell] - 1),
                Constraint::Budget { limit } => assignment.blockers() <= *limit,
            };

            if !holds {
                return Err(ConstraintViolation {
                    index,
                    description: format!("{constraint:?}"),
                });
            }
        }

        Ok(())
    }
}
