#![warn(missing_docs)]

//! # `paddock`
//!
//! An optimizer for grid enclosure puzzles: given a map of land, water, portals, and scoring items around a start cell,
//! place at most a budgeted number of blockers so that the cells still reachable from the start score as highly as possible.
//! Nothing reachable may touch the border of the map.
//!
//! Parse a map into a [`Board`] (or build one with a [`BoardBuilder`]), then call [`Board::solve`] with a budget.
//! The result is an [`Outcome`]: a [`Solution`] carrying the blocked grid and its reachability, or a verdict that no placement exists.
//!
//! ```
//! use paddock::{Board, Outcome, SolveOptions};
//!
//! let board: Board = "~~~~~\n~.H.~\n~.C.~\n~~~~~\n".parse().unwrap();
//! let Outcome::Solved(solution) = board.solve(0, &SolveOptions::default()).unwrap() else { panic!() };
//! // six enclosed cells, one of them a bonus worth three more
//! assert_eq!(solution.objective(), 9);
//! ```
//!
//! # Internals
//! A [`Model`](model::Model) is formulated per solve: for every cell, whether it is blocked, whether it is reachable, and its distance from the start,
//! tied together by a conjunction of [`Constraint`](model::Constraint)s and a weighted objective.
//! The model is independent of how it is solved and can [`check`](model::Model::check) any assignment.
//!
//! The [`SatEngine`] expresses the Boolean part of the model as a SAT problem, counts blockers and score with totalizer encodings,
//! and climbs the objective one step at a time until the SAT solver proves no better placement exists.
//! Distances are not encoded; reachable regions cut off from the start are instead excluded lazily as the solver proposes them.

pub use board::{Board, Link};
pub use builder::BoardBuilder;
pub use cell::CellKind;
pub use error::{ArityError, ConstraintViolation, Error, ModelError, ParseError, SolverFailure};
pub use location::Location;
pub use shape::SquareStep;
pub use solution::{Optimality, Outcome, Solution};
pub use solver::{SatEngine, SearchResult, SearchStats, SolveOptions};

pub(crate) mod board;
mod tests;
pub(crate) mod location;
pub(crate) mod logic;
pub(crate) mod shape;
pub(crate) mod cell;
pub(crate) mod error;
pub mod builder;
pub mod model;
pub(crate) mod solution;
pub(crate) mod solver;

/// Parse `map` and solve it with at most `budget` blockers.
pub fn solve_map(map: &str, budget: usize, options: &SolveOptions) -> Result<Outcome, Error> {
    let board: Board = map.parse()?;
    Ok(board.solve(budget, options)?)
}
