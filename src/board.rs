use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::num::NonZero;
use std::str::FromStr;

use itertools::Itertools;
use ndarray::Array2;
use petgraph::graphmap::DiGraphMap;

use crate::builder::BoardBuilder;
use crate::cell::{CellKind, BLOCKER};
use crate::error::{Error, ParseError, SolverFailure};
use crate::location::{Dimension, Location};
use crate::model::Model;
use crate::shape::SquareStep;
use crate::solution::{Optimality, Outcome, Solution};
use crate::solver::{SatEngine, SearchResult, SolveOptions};

/// How one cell leads to another.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Link {
    /// An orthogonal step onto a neighboring cell.
    Step(SquareStep),
    /// A teleport from a portal to the other end of its pair.
    Portal,
}

/// An immutable puzzle board: the kind of every cell, portal pairings, and the adjacency derived from both.
///
/// Build one with a [`BoardBuilder`] or parse it from text with [`str::parse`].
#[derive(Clone, Debug)]
pub struct Board {
    pub(crate) cells: Array2<CellKind>,
    pub(crate) dims: (Dimension, Dimension),
    // outgoing edges of every cell, portals included
    pub(crate) graph: DiGraphMap<Location, Link>,
    pub(crate) exits: HashMap<Location, Location>,
    pub(crate) start: Location,
}

impl Board {
    /// Width and height of this board.
    pub fn dims(&self) -> (usize, usize) {
        (self.dims.0.get(), self.dims.1.get())
    }

    /// Number of cells on this board.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The single start cell.
    pub fn start(&self) -> Location {
        self.start
    }

    /// The kind of the cell at `location`, or [`None`] if it lies off the board.
    pub fn kind(&self, location: Location) -> Option<CellKind> {
        self.cells.get(location.as_index()).copied()
    }

    /// The other end of the portal at `location`.
    ///
    /// [`None`] if `location` is not a portal or its symbol appears only once.
    pub fn portal_exit(&self, location: Location) -> Option<Location> {
        self.exits.get(&location).copied()
    }

    /// Whether `location` lies in the first or last row or column.
    pub fn on_border(&self, location: Location) -> bool {
        location.on_border(self.dims)
    }

    /// Every cell `location` leads to, along with how.
    pub fn links_from(&self, location: Location) -> Vec<(Location, Link)> {
        if !self.graph.contains_node(location) {
            return Vec::new();
        }

        self.graph.edges(location)
            .map(|(_, to, link)| (to, *link))
            .collect_vec()
    }

    /// Every cell `location` leads to: its orthogonal neighbors, plus its exit if it is a paired portal.
    pub fn neighbors(&self, location: Location) -> Vec<Location> {
        self.links_from(location).into_iter()
            .map(|(to, _)| to)
            .collect_vec()
    }

    /// All locations in row-major order, the order cell ids follow.
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.cells.indexed_iter().map(|(index, _)| Location::from(index))
    }

    pub(crate) fn id_of(&self, location: Location) -> usize {
        location.1 * self.dims.0.get() + location.0
    }

    /// Place at most `budget` blockers so as to maximize the score of the cells reachable from the start.
    ///
    /// Formulates the constraint model, hands it to the SAT-backed engine, and reads the winning assignment back onto this board.
    /// Returns according to [`Outcome`]; infeasibility and early stops are outcomes, not errors.
    pub fn solve(&self, budget: usize, options: &SolveOptions) -> Result<Outcome, SolverFailure> {
        let model = Model::formulate(self, budget);
        let result = SatEngine::new(&model).run(options)?;

        Ok(match result {
            SearchResult::Optimal { assignment, objective, .. } => {
                Outcome::Solved(Solution::extract(self, &assignment, objective, Optimality::Proven)?)
            }
            SearchResult::Feasible { assignment, objective, .. } => {
                Outcome::Solved(Solution::extract(self, &assignment, objective, Optimality::BestFound)?)
            }
            SearchResult::Infeasible { .. } => Outcome::Infeasible,
            SearchResult::Undecided { .. } => Outcome::Undecided,
        })
    }
}

impl FromStr for Board {
    type Err = Error;

    /// Parse one row per line. Leading and trailing blank lines are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows = s.trim_matches(|c| c == '\n' || c == '\r')
            .lines()
            .map(|line| line.chars().collect_vec())
            .collect_vec();

        let width = rows.first().map_or(0, Vec::len);
        let dims = (
            NonZero::new(width).ok_or(ParseError::Empty)?,
            NonZero::new(rows.len()).ok_or(ParseError::Empty)?,
        );

        if let Some((row, found)) = rows.iter().map(Vec::len).enumerate().find(|(_, len)| *len != width) {
            return Err(ParseError::Ragged { row, expected: width, found }.into());
        }

        let mut builder = BoardBuilder::with_dims(dims);
        for (y, row) in rows.iter().enumerate() {
            for (x, symbol) in row.iter().enumerate() {
                let location = Location(x, y);
                let kind = match *symbol {
                    BLOCKER => return Err(ParseError::UnexpectedBlocker { location }.into()),
                    other => CellKind::try_from(other)
                        .map_err(|symbol| ParseError::UnknownSymbol { symbol, location })?,
                };
                builder.set(location, kind);
            }
        }

        Ok(builder.build()?)
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", print(&self.cells.map(CellKind::symbol)))
    }
}

/// Dump a character grid one row per line.
pub(crate) fn print(board: &Array2<char>) -> String {
    let mut out = String::with_capacity(board.nrows() * (board.ncols() + 1));

    for row in board.rows() {
        for col in row {
            out.push(*col);
        }
        out.push('\n');
    }

    out
}
