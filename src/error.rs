use thiserror::Error;

use crate::location::Location;

/// The textual map could not be read as a rectangular grid of known symbols.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The map has no rows, or its first row is empty.
    #[error("map contains no rows")]
    Empty,

    /// A row differs in length from the first.
    #[error("row {row} has {found} cells but the first row has {expected}")]
    Ragged {
        /// Index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },

    /// A character outside the map alphabet.
    #[error("unknown symbol {symbol:?} at {location}")]
    UnknownSymbol {
        /// The character read.
        symbol: char,
        /// Where it was read.
        location: Location,
    },

    /// A blocker on an input map.
    #[error("blocker marker at {location}; blockers are placed by the solver, not the map")]
    UnexpectedBlocker {
        /// Where the blocker was read.
        location: Location,
    },
}

/// The board is well-formed text but does not describe a valid puzzle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// No cell is the start.
    #[error("board has no start cell")]
    NoStart,

    /// More than one cell is the start.
    #[error("board has {count} start cells, expected exactly one")]
    MultipleStarts {
        /// How many start cells the board has.
        count: usize,
    },

    /// A portal symbol appears more than twice.
    #[error("portal {symbol:?} appears {count} times, at most two are allowed")]
    PortalOverused {
        /// The overused symbol.
        symbol: char,
        /// How many cells carry it.
        count: usize,
    },

    /// A cell was placed off the board.
    #[error("{location} lies outside the board")]
    OutOfBounds {
        /// The offending location.
        location: Location,
    },

    /// A blocker was placed before solving.
    #[error("blocker preset at {location}; blockers are placed by the solver")]
    PresetBlocker {
        /// The offending location.
        location: Location,
    },

    /// A portal pair was given a symbol outside digits and lowercase letters.
    #[error("{symbol:?} is not a portal symbol")]
    BadPortalSymbol {
        /// The rejected symbol.
        symbol: char,
    },
}

/// An assignment does not cover the cells of the model or board it is read against.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("assignment covers {found} cells, expected {expected}")]
pub struct ArityError {
    /// Number of cells expected.
    pub expected: usize,
    /// Number of cells covered.
    pub found: usize,
}

/// An assignment breaks one of the constraints of a [`Model`](crate::model::Model).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("constraint #{index} violated: {description}")]
pub struct ConstraintViolation {
    /// Position of the violated constraint in [`Model::constraints`](crate::model::Model::constraints).
    pub index: usize,
    /// The violated constraint, in words.
    pub description: String,
}

/// Reasons the search engine may fail outright.
///
/// Running out of budget or time is not a failure; see [`Outcome`](crate::Outcome).
#[derive(Debug, Error)]
pub enum SolverFailure {
    /// The SAT backend reported an error instead of an answer.
    #[error("SAT backend failed: {0}")]
    Backend(String),

    /// The SAT backend claimed satisfiability but produced no model.
    #[error("SAT backend produced no model")]
    NoModel,

    /// The engine produced an assignment its own model rejects. This should never happen.
    #[error("engine produced an unsound assignment: {0}")]
    Unsound(#[from] ConstraintViolation),

    /// The winning assignment does not fit the board it was read onto.
    #[error(transparent)]
    Arity(#[from] ArityError),
}

/// Every way a call into this crate can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`ParseError`].
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// See [`ModelError`].
    #[error(transparent)]
    Model(#[from] ModelError),

    /// See [`SolverFailure`].
    #[error(transparent)]
    Solver(#[from] SolverFailure),
}
