//! Incremental construction of a [`Board`] cell by cell.

use std::collections::HashMap;
use std::ops::IndexMut;

use itertools::Itertools;
use ndarray::{Array2, AssignElem};
use petgraph::graphmap::DiGraphMap;
use unordered_pair::UnorderedPair;

use crate::board::{Board, Link};
use crate::cell::CellKind;
use crate::error::ModelError;
use crate::location::{Dimension, Location};
use crate::shape::SquareStep;

/// A builder for rectangular boards.
///
/// Every cell starts out as [`Land`](CellKind::Land).
/// Mistakes such as out-of-bounds placements do not panic; the builder records them and refuses to [`build`](Self::build).
/// Builders mutate themselves while building but can be [`Clone`]d to save their state at some point.
#[derive(Clone, Debug)]
pub struct BoardBuilder {
    // width, height
    dims: (Dimension, Dimension),
    cells: Array2<CellKind>,
    invalid_reasons: Vec<ModelError>,
}

impl BoardBuilder {
    /// Construct a new [`Self`] with the specified dimensions, specified in `(x, y)` order.
    pub fn with_dims(dims: (Dimension, Dimension)) -> Self {
        Self {
            dims,
            cells: Array2::from_elem((dims.1.get(), dims.0.get()), CellKind::Land),
            invalid_reasons: Default::default(),
        }
    }

    fn check_bounds(&mut self, location: Location) -> bool {
        if location.within(self.dims) {
            return true;
        }

        self.invalid_reasons.push(ModelError::OutOfBounds { location });
        false
    }

    /// Set the kind of the cell at `location`.
    ///
    /// Blockers are decisions of the solver; setting one records [`ModelError::PresetBlocker`].
    /// If the builder is already in an invalid state, this function does nothing.
    pub fn set(&mut self, location: Location, kind: CellKind) -> &mut Self {
        if !self.invalid_reasons.is_empty() || !self.check_bounds(location) {
            return self;
        }

        if kind.is_blocker() {
            self.invalid_reasons.push(ModelError::PresetBlocker { location });
            return self;
        }

        self.cells.index_mut(location.as_index()).assign_elem(kind);
        self
    }

    /// Shorthand for [`Self::set`] with [`CellKind::Start`].
    pub fn add_start(&mut self, location: Location) -> &mut Self {
        self.set(location, CellKind::Start)
    }

    /// Place both ends of a portal. The order in which `locations` are specified does not matter.
    ///
    /// `symbol` must be a digit or lowercase ASCII letter.
    pub fn add_portal_pair(&mut self, symbol: char, locations: UnorderedPair<Location>) -> &mut Self {
        if !self.invalid_reasons.is_empty() {
            return self;
        }

        if !CellKind::is_portal_symbol(symbol) {
            self.invalid_reasons.push(ModelError::BadPortalSymbol { symbol });
            return self;
        }

        let UnorderedPair(first, second) = locations;
        self.set(first, CellKind::Portal { symbol })
            .set(second, CellKind::Portal { symbol })
    }

    /// Check the validity of this builder.
    ///
    /// Returns `None` if the builder is valid, `Some(&Vec<ModelError>)` otherwise.
    /// Whole-board problems such as a missing start are only detected by [`Self::build`].
    pub fn is_valid(&self) -> Option<&Vec<ModelError>> {
        if self.invalid_reasons.is_empty() {
            None
        } else {
            Some(&self.invalid_reasons)
        }
    }

    /// Convert the state of this builder into a [`Board`], resolving portal pairs and adjacency.
    ///
    /// Fails with the first recorded [`ModelError`], or with one found while checking the whole board:
    /// the board needs exactly one start, and no portal symbol may appear more than twice.
    pub fn build(&self) -> Result<Board, ModelError> {
        if let Some(reason) = self.invalid_reasons.first() {
            return Err(reason.clone());
        }

        let starts = self.cells.indexed_iter()
            .filter(|(_, kind)| kind.is_start())
            .map(|(index, _)| Location::from(index))
            .collect_vec();
        let start = match starts.as_slice() {
            [] => return Err(ModelError::NoStart),
            [start] => *start,
            _ => return Err(ModelError::MultipleStarts { count: starts.len() }),
        };

        let portals = self.cells.indexed_iter()
            .filter_map(|(index, kind)| match kind {
                CellKind::Portal { symbol } => Some((*symbol, Location::from(index))),
                _ => None,
            })
            .into_group_map();

        let mut exits = HashMap::with_capacity(portals.len() * 2);
        // iterate symbols in order so the reported overuse does not depend on hashing
        for (symbol, ends) in portals.iter().sorted_by_key(|(symbol, _)| **symbol) {
            match ends.as_slice() {
                // a lone portal has nowhere to lead
                [_] => {}
                [a, b] => {
                    exits.insert(*a, *b);
                    exits.insert(*b, *a);
                }
                _ => return Err(ModelError::PortalOverused { symbol: *symbol, count: ends.len() }),
            }
        }

        let mut graph = DiGraphMap::with_capacity(
            self.cells.len(),
            // every orthogonal adjacency in both directions, plus one edge out of each paired portal
            2 * ((self.dims.0.get() - 1) * self.dims.1.get() + (self.dims.1.get() - 1) * self.dims.0.get()) + exits.len(),
        );

        // row-major insertion keeps node and neighbor iteration order stable
        for (index, _) in self.cells.indexed_iter() {
            graph.add_node(Location::from(index));
        }

        for (index, _) in self.cells.indexed_iter() {
            let location = Location::from(index);
            for (direction, neighbor) in SquareStep::neighbors_of(location, self.dims) {
                graph.add_edge(location, neighbor, Link::Step(direction));
            }
        }

        for (portal, exit) in exits.iter().sorted() {
            // an exit that is also an orthogonal neighbor keeps a single edge
            graph.add_edge(*portal, *exit, Link::Portal);
        }

        Ok(Board {
            cells: self.cells.clone(),
            dims: self.dims,
            graph,
            exits,
            start,
        })
    }
}
