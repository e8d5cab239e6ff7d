use std::ops::Not;

use varisat::{Lit, Var};

/// Hands out fresh SAT variables past the ones reserved up front.
pub(crate) struct VarPool {
    next: usize,
}

impl VarPool {
    /// Reserve variables `0..reserved`.
    pub(crate) fn new(reserved: usize) -> Self {
        Self { next: reserved }
    }

    pub(crate) fn fresh(&mut self) -> Var {
        let var = Var::from_index(self.next);
        self.next += 1;
        var
    }

    pub(crate) fn len(&self) -> usize {
        self.next
    }
}

/// Totalizer encoding of a unary counter over `inputs`, appending its clauses to `clauses`.
///
/// Returns `outputs` with `outputs[i]` true exactly when at least `i + 1` inputs are true.
/// Outputs are truncated at `cap`; the last output then means "at least `cap`".
/// Asserting `!outputs[k]` bounds the count by `k`, assuming `outputs[k - 1]` demands at least `k`.
pub(crate) fn totalizer(pool: &mut VarPool, inputs: &[Lit], cap: usize, clauses: &mut Vec<Vec<Lit>>) -> Vec<Lit> {
    if cap == 0 {
        return Vec::new();
    }

    if inputs.len() <= 1 {
        return inputs.to_vec();
    }

    let (left, right) = inputs.split_at(inputs.len() / 2);
    let left = totalizer(pool, left, cap, clauses);
    let right = totalizer(pool, right, cap, clauses);

    let outputs = (0..(left.len() + right.len()).min(cap))
        .map(|_| pool.fresh().positive())
        .collect::<Vec<_>>();

    // a_0 and b_0 are constant true, a_{len+1} and b_{len+1} constant false; those literals drop out of their clauses
    for i in 0..=left.len() {
        for j in 0..=right.len() {
            // i of the left and j of the right => at least i + j overall
            if i + j >= 1 {
                let mut clause = Vec::with_capacity(3);
                if i > 0 {
                    clause.push(left[i - 1].not());
                }
                if j > 0 {
                    clause.push(right[j - 1].not());
                }
                clause.push(outputs[(i + j).min(cap) - 1]);
                clauses.push(clause);
            }

            // at most i of the left and at most j of the right => at most i + j overall
            if i + j < outputs.len() {
                let mut clause = Vec::with_capacity(3);
                if i < left.len() {
                    clause.push(left[i]);
                }
                if j < right.len() {
                    clause.push(right[j]);
                }
                clause.push(outputs[i + j].not());
                clauses.push(clause);
            }
        }
    }

    outputs
}
