use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use itertools::Itertools;
use tracing::{debug, info, warn};
use varisat::{CnfFormula, Lit, Solver, Var};

use crate::error::SolverFailure;
use crate::logic::{totalizer, VarPool};
use crate::model::{Assignment, CellId, Constraint, Model};

/// Resource limits for a single solve.
///
/// Limits are checked between SAT calls, so a single hard call may overrun the time limit.
#[derive(Clone, Debug, Default)]
pub struct SolveOptions {
    /// Stop once this much wall-clock time has passed.
    pub time_limit: Option<Duration>,
    /// Stop after this many improving assignments.
    pub max_improvements: Option<usize>,
    /// Stop as soon as this flag is raised.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SolveOptions {
    /// Set [`Self::time_limit`].
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Set [`Self::max_improvements`].
    pub fn with_max_improvements(mut self, limit: usize) -> Self {
        self.max_improvements = Some(limit);
        self
    }

    /// Set [`Self::cancel`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Counters describing how a search went.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SearchStats {
    /// Calls into the SAT solver.
    pub sat_calls: usize,
    /// Connectivity cuts added.
    pub cuts: usize,
    /// Assignments accepted, each better than the last.
    pub improvements: usize,
}

/// What a [`SatEngine`] concluded about a [`Model`].
#[allow(missing_docs)]
#[derive(Clone, Debug)]
pub enum SearchResult {
    /// No assignment scores higher than this one.
    Optimal { assignment: Assignment, objective: i64, stats: SearchStats },
    /// The search stopped early; this is the best assignment found so far.
    Feasible { assignment: Assignment, objective: i64, stats: SearchStats },
    /// No assignment satisfies the model.
    Infeasible { stats: SearchStats },
    /// The search stopped early without finding any assignment.
    Undecided { stats: SearchStats },
}

impl SearchResult {
    /// How the search that produced this result went.
    pub fn stats(&self) -> SearchStats {
        match self {
            Self::Optimal { stats, .. }
            | Self::Feasible { stats, .. }
            | Self::Infeasible { stats }
            | Self::Undecided { stats } => *stats,
        }
    }
}

/// The objective as a unary counter: `objective = offset + (number of true outputs)`.
struct ObjectiveCounter {
    offset: i64,
    outputs: Vec<Lit>,
}

impl ObjectiveCounter {
    /// Assumptions demanding an objective of at least `target`, or [`None`] if no assignment can reach it.
    fn at_least(&self, target: i64) -> Option<Vec<Lit>> {
        let needed = target - self.offset;
        if needed <= 0 {
            return Some(Vec::new());
        }

        self.outputs.get(needed as usize - 1).map(|lit| vec![*lit])
    }
}

/// Exact optimizer for a [`Model`], backed by an incremental SAT solver.
///
/// # Encoding
/// `blocked[c]` and `reachable[c]` each get a Boolean variable. Fixed values, propagation, and the exclusion of blocked cells translate directly into clauses.
/// The budget and the objective bound are totalizer counters.
///
/// Distances never appear in the SAT instance. Instead, every non-anchor reachable cell needs some reachable neighbor, and whenever the solver
/// proposes a reachable region that breadth-first search from the anchors cannot reach, we add cuts: some cell on the region's frontier must be reachable,
/// or the region is not. Assignments which survive are labelled with their breadth-first distances, which justify every reachable cell.
///
/// # Optimization
/// Linear search upward: every accepted assignment raises the demanded objective by one through solver assumptions, until the solver proves nothing better exists.
pub struct SatEngine<'a> {
    model: &'a Model,
    anchors: Vec<CellId>,
    // cells which may justify each cell's distance
    neighbors: Vec<Vec<CellId>>,
    // cells each cell may justify
    successors: Vec<Vec<CellId>>,
    fixed_reachable: Vec<Option<bool>>,
    fixed_blocked: Vec<Option<bool>>,
}

impl<'a> SatEngine<'a> {
    /// Prepare an engine for `model`. Nothing is encoded until [`Self::run`].
    pub fn new(model: &'a Model) -> Self {
        let mut anchors = Vec::new();
        let mut neighbors = vec![Vec::new(); model.cells];
        let mut successors = vec![Vec::new(); model.cells];
        let mut fixed_reachable = vec![None; model.cells];
        let mut fixed_blocked = vec![None; model.cells];

        for constraint in model.constraints.iter() {
            match constraint {
                Constraint::FixDistance { cell, distance } => {
                    if *distance == 0 {
                        anchors.push(*cell);
                    }
                    fixed_reachable[*cell] = Some(*distance >= 0);
                }
                Constraint::FixReachable { cell, value } => fixed_reachable[*cell] = Some(*value),
                Constraint::FixBlocked { cell, value } => fixed_blocked[*cell] = Some(*value),
                Constraint::Justified { cell, neighbors: justifiers } => {
                    for n in justifiers {
                        successors[*n].push(*cell);
                    }
                    neighbors[*cell].clone_from(justifiers);
                }
                _ => {}
            }
        }

        Self {
            model,
            anchors,
            neighbors,
            successors,
            fixed_reachable,
            fixed_blocked,
        }
    }

    #[inline]
    fn blocked(&self, cell: CellId) -> Var {
        Var::from_index(cell)
    }

    #[inline]
    fn reachable(&self, cell: CellId) -> Var {
        Var::from_index(self.model.cells + cell)
    }

    fn encode(&self, pool: &mut VarPool) -> Vec<Vec<Lit>> {
        let mut clauses = Vec::with_capacity(self.model.constraints.len());

        for constraint in self.model.constraints.iter() {
            match constraint {
                // both hold by construction of the breadth-first labelling
                Constraint::ReachableIffDistance { .. } | Constraint::NonZeroDistance { .. } => {}
                Constraint::BlockedExcludes { cell } => {
                    clauses.push(vec![self.blocked(*cell).negative(), self.reachable(*cell).negative()]);
                }
                Constraint::FixBlocked { cell, value } => clauses.push(vec![self.blocked(*cell).lit(*value)]),
                Constraint::FixReachable { cell, value } => clauses.push(vec![self.reachable(*cell).lit(*value)]),
                Constraint::FixDistance { cell, distance } => clauses.push(vec![self.reachable(*cell).lit(*distance >= 0)]),
                Constraint::Propagate { cell, from } => {
                    // (!B_c * R_n) => R_c = B_c + !R_n + R_c
                    clauses.push(vec![
                        self.blocked(*cell).positive(),
                        self.reachable(*from).negative(),
                        self.reachable(*cell).positive(),
                    ]);
                }
                Constraint::Justified { cell, neighbors } => {
                    if self.anchors.contains(cell) {
                        continue;
                    }

                    // necessary, not sufficient: a reachable non-anchor has a reachable neighbor; cuts do the rest
                    let mut clause = Vec::with_capacity(neighbors.len() + 1);
                    clause.push(self.reachable(*cell).negative());
                    clause.extend(neighbors.iter().map(|n| self.reachable(*n).positive()));
                    clauses.push(clause);
                }
                Constraint::Budget { limit } => {
                    let candidates = (0..self.model.cells)
                        .filter(|cell| self.fixed_blocked[*cell] != Some(false))
                        .map(|cell| self.blocked(cell).positive())
                        .collect_vec();
                    // counting past every candidate is pointless, and the cap must not overflow
                    let cap = limit.saturating_add(1).min(candidates.len() + 1);
                    let counter = totalizer(pool, &candidates, cap, &mut clauses);
                    if let Some(over) = counter.get(*limit) {
                        clauses.push(vec![!*over]);
                    }
                }
            }
        }

        clauses
    }

    fn encode_objective(&self, pool: &mut VarPool, clauses: &mut Vec<Vec<Lit>>) -> ObjectiveCounter {
        let mut offset = 0;
        let mut inputs = Vec::new();

        for (cell, weight) in self.model.objective.terms.iter() {
            match self.fixed_reachable[*cell] {
                Some(true) => offset += weight,
                Some(false) => {}
                None => {
                    let copies = weight.unsigned_abs() as usize;
                    if *weight < 0 {
                        // w * R = w + |w| * !R
                        offset += weight;
                        inputs.extend(std::iter::repeat(self.reachable(*cell).negative()).take(copies));
                    } else {
                        inputs.extend(std::iter::repeat(self.reachable(*cell).positive()).take(copies));
                    }
                }
            }
        }

        let outputs = totalizer(pool, &inputs, inputs.len(), clauses);
        ObjectiveCounter { offset, outputs }
    }

    /// Breadth-first distances from the anchors through reachable cells; `-1` where no path exists.
    fn label(&self, reachable: &[bool]) -> Vec<i64> {
        let mut distance = vec![-1; self.model.cells];
        let mut queue = VecDeque::with_capacity(self.model.cells);

        for anchor in self.anchors.iter() {
            if reachable[*anchor] {
                distance[*anchor] = 0;
                queue.push_back(*anchor);
            }
        }

        while let Some(cell) = queue.pop_front() {
            for next in self.successors[cell].iter() {
                if reachable[*next] && distance[*next] == -1 {
                    distance[*next] = distance[cell] + 1;
                    queue.push_back(*next);
                }
            }
        }

        distance
    }

    /// Cuts excluding every reachable region the anchors do not reach.
    ///
    /// For such a region C with frontier F (cells outside C that may justify a cell of C), every v in C yields `!R_v + sum(R_u for u in F)`.
    /// Any justified assignment satisfies these: a distance chain from v down to an anchor has to leave C through F.
    fn cuts(&self, reachable: &[bool], distance: &[i64]) -> Vec<Vec<Lit>> {
        let phantom = |cell: CellId| reachable[cell] && distance[cell] == -1;
        let mut seen = vec![false; self.model.cells];
        let mut cuts = Vec::new();

        for root in (0..self.model.cells).filter(|cell| phantom(*cell)) {
            if seen[root] {
                continue;
            }

            seen[root] = true;
            let mut region = vec![root];
            let mut queue = VecDeque::from([root]);
            while let Some(cell) = queue.pop_front() {
                for next in self.neighbors[cell].iter().chain(self.successors[cell].iter()) {
                    if phantom(*next) && !seen[*next] {
                        seen[*next] = true;
                        region.push(*next);
                        queue.push_back(*next);
                    }
                }
            }

            let frontier = region.iter()
                .flat_map(|cell| self.neighbors[*cell].iter().copied())
                .filter(|cell| !region.contains(cell) && self.fixed_reachable[*cell] != Some(false))
                .sorted()
                .dedup()
                .map(|cell| self.reachable(cell).positive())
                .collect_vec();

            cuts.extend(region.iter().map(|cell| {
                let mut clause = Vec::with_capacity(frontier.len() + 1);
                clause.push(self.reachable(*cell).negative());
                clause.extend(frontier.iter().copied());
                clause
            }));
        }

        cuts
    }

    fn out_of_resources(&self, options: &SolveOptions, started: Instant, stats: &SearchStats) -> Option<&'static str> {
        if options.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Some("cancelled");
        }

        if options.time_limit.is_some_and(|limit| started.elapsed() >= limit) {
            return Some("time limit reached");
        }

        if options.max_improvements.is_some_and(|limit| stats.improvements >= limit) {
            return Some("improvement limit reached");
        }

        None
    }

    /// Search for an optimal assignment of the model.
    ///
    /// Returns [`Err`] only if the SAT backend fails or the engine would hand back an assignment its model rejects.
    pub fn run(&self, options: &SolveOptions) -> Result<SearchResult, SolverFailure> {
        let started = Instant::now();
        let mut stats = SearchStats::default();
        let mut pool = VarPool::new(2 * self.model.cells);

        let mut clauses = self.encode(&mut pool);
        let counter = self.encode_objective(&mut pool, &mut clauses);
        debug!(vars = pool.len(), clauses = clauses.len(), "encoded model");

        let mut solver = Solver::new();
        solver.add_formula(&CnfFormula::from(clauses));

        let mut incumbent: Option<(Assignment, i64)> = None;

        loop {
            if let Some(reason) = self.out_of_resources(options, started, &stats) {
                warn!(reason, ?stats, "stopping search early");
                return Ok(match incumbent {
                    Some((assignment, objective)) => SearchResult::Feasible { assignment, objective, stats },
                    None => SearchResult::Undecided { stats },
                });
            }

            let assumptions = match &incumbent {
                None => Vec::new(),
                Some((assignment, best)) => match counter.at_least(best + 1) {
                    Some(assumptions) => assumptions,
                    None => {
                        info!(objective = best, ?stats, "objective at its upper bound");
                        return Ok(SearchResult::Optimal { assignment: assignment.clone(), objective: *best, stats });
                    }
                },
            };

            solver.assume(&assumptions);
            stats.sat_calls += 1;
            let satisfiable = solver.solve().map_err(|err| SolverFailure::Backend(err.to_string()))?;

            if !satisfiable {
                return Ok(match incumbent {
                    Some((assignment, objective)) => {
                        info!(objective, blockers = assignment.blockers(), ?stats, "proved optimal");
                        SearchResult::Optimal { assignment, objective, stats }
                    }
                    None => {
                        info!(?stats, "model is infeasible");
                        SearchResult::Infeasible { stats }
                    }
                });
            }

            let mut values = vec![false; pool.len()];
            for lit in solver.model().ok_or(SolverFailure::NoModel)? {
                if let Some(value) = values.get_mut(lit.var().index()) {
                    *value = lit.is_positive();
                }
            }

            let blocked = values[..self.model.cells].to_vec();
            let reachable = values[self.model.cells..2 * self.model.cells].to_vec();
            let distance = self.label(&reachable);

            let cuts = self.cuts(&reachable, &distance);
            if !cuts.is_empty() {
                stats.cuts += cuts.len();
                debug!(added = cuts.len(), total = stats.cuts, "cut unreachable regions");
                solver.add_formula(&CnfFormula::from(cuts));
                continue;
            }

            let assignment = Assignment { blocked, reachable, distance };
            self.model.check(&assignment)?;
            let value = self.model.evaluate(&assignment)?;
            stats.improvements += 1;
            debug!(objective = value, blockers = assignment.blockers(), elapsed = ?started.elapsed(), "found assignment");

            incumbent = Some((assignment, value));
        }
    }
}
