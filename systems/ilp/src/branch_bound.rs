use std::cmp::Reverse;
use std::collections::VecDeque;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::{Comparison, Model, Sense, Solution, SolveOptions, SolveStatus, Solver};

const OBJECTIVE_TOLERANCE: f64 = 1e-9;

/// Depth-first branch-and-bound over binary variables.
///
/// Every node propagates activity bounds through the linear constraints until
/// a fixpoint, so a complete assignment reached without conflict is feasible.
/// Unfixed variables are branched in order of decreasing constraint degree;
/// equal degrees are ordered by a ChaCha stream seeded from the solve options,
/// which makes repeated solves of the same model explore the same tree. Hinted
/// values are tried first, so the first dive reproduces a warm start whenever
/// it is feasible.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchAndBound;

impl Solver for BranchAndBound {
    fn solve(&self, model: &Model, options: &SolveOptions) -> Solution {
        let started = Instant::now();
        let deadline = options
            .time_limit()
            .and_then(|limit| started.checked_add(limit));
        let mut search = Search::new(model, options.seed(), deadline);

        let termination = if search.prepare_root() {
            search.run()
        } else {
            Termination::Exhausted
        };

        let status = match (termination, search.incumbent.is_some()) {
            (Termination::Exhausted, true) => SolveStatus::Optimal,
            (Termination::Exhausted, false) => SolveStatus::Infeasible,
            (Termination::TimedOut, true) => SolveStatus::Feasible,
            (Termination::TimedOut, false) => SolveStatus::NoIncumbent,
        };

        debug!(
            variables = model.variable_count(),
            constraints = model.constraints().len(),
            nodes = search.nodes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?status,
            "branch-and-bound finished"
        );

        let nodes = search.nodes;
        match search.incumbent {
            Some(incumbent) => Solution::new(
                status,
                Some(incumbent.values),
                Some(incumbent.objective),
                nodes,
            ),
            None => Solution::new(status, None, None, nodes),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Termination {
    Exhausted,
    TimedOut,
}

#[derive(Debug)]
struct Incumbent {
    values: Vec<bool>,
    objective: f64,
}

#[derive(Debug)]
struct Frame {
    mark: usize,
    var: usize,
    alternative: Option<bool>,
}

struct Search<'m> {
    model: &'m Model,
    occurrences: Vec<Vec<usize>>,
    branch_order: Vec<usize>,
    values: Vec<Option<bool>>,
    trail: Vec<usize>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
    deadline: Option<Instant>,
    incumbent: Option<Incumbent>,
    nodes: u64,
}

impl<'m> Search<'m> {
    fn new(model: &'m Model, seed: u64, deadline: Option<Instant>) -> Self {
        let variables = model.variable_count();
        let mut occurrences = vec![Vec::new(); variables];
        for (position, constraint) in model.constraints().iter().enumerate() {
            for (var, _) in constraint.expr().terms() {
                if let Some(list) = occurrences.get_mut(var.index()) {
                    list.push(position);
                }
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut rank: Vec<usize> = (0..variables).collect();
        rank.shuffle(&mut rng);
        let mut branch_order: Vec<usize> = (0..variables).collect();
        branch_order.sort_by_key(|var| (Reverse(occurrences[*var].len()), rank[*var]));

        Self {
            model,
            occurrences,
            branch_order,
            values: vec![None; variables],
            trail: Vec::with_capacity(variables),
            queue: VecDeque::new(),
            queued: vec![false; model.constraints().len()],
            deadline,
            incumbent: None,
            nodes: 0,
        }
    }

    fn prepare_root(&mut self) -> bool {
        let model = self.model;
        for var in 0..model.variable_count() {
            if let Some(value) = model.fixed_value(crate::Var(var)) {
                self.assign(var, value);
            }
        }
        for position in 0..model.constraints().len() {
            self.enqueue(position);
        }
        self.propagate()
    }

    fn run(&mut self) -> Termination {
        let mut stack: Vec<Frame> = Vec::new();
        let mut consistent = true;

        loop {
            if consistent {
                self.nodes += 1;
                if self.out_of_time() {
                    return Termination::TimedOut;
                }

                if self.can_improve() {
                    match self.next_branch_var() {
                        Some(var) => {
                            let first = self.preferred_value(var);
                            stack.push(Frame {
                                mark: self.trail.len(),
                                var,
                                alternative: Some(!first),
                            });
                            self.assign(var, first);
                            consistent = self.propagate();
                            continue;
                        }
                        None => self.record_incumbent(),
                    }
                }
            }

            loop {
                let Some(frame) = stack.pop() else {
                    return Termination::Exhausted;
                };
                self.undo_to(frame.mark);
                if let Some(value) = frame.alternative {
                    stack.push(Frame {
                        mark: frame.mark,
                        var: frame.var,
                        alternative: None,
                    });
                    self.assign(frame.var, value);
                    if self.propagate() {
                        consistent = true;
                        break;
                    }
                }
            }
        }
    }

    fn out_of_time(&self) -> bool {
        self.deadline
            .map_or(false, |deadline| Instant::now() >= deadline)
    }

    fn can_improve(&self) -> bool {
        let Some(incumbent) = &self.incumbent else {
            return true;
        };
        let bound = self.objective_bound();
        match self.model.sense() {
            Sense::Maximize => bound > incumbent.objective + OBJECTIVE_TOLERANCE,
            Sense::Minimize => bound < incumbent.objective - OBJECTIVE_TOLERANCE,
        }
    }

    fn objective_bound(&self) -> f64 {
        let sense = self.model.sense();
        self.values
            .iter()
            .enumerate()
            .map(|(var, value)| {
                let coefficient = self.model.objective_coefficient(crate::Var(var));
                match (value, sense) {
                    (Some(true), _) => coefficient,
                    (Some(false), _) => 0.0,
                    (None, Sense::Maximize) => coefficient.max(0.0),
                    (None, Sense::Minimize) => coefficient.min(0.0),
                }
            })
            .sum()
    }

    fn next_branch_var(&self) -> Option<usize> {
        self.branch_order
            .iter()
            .copied()
            .find(|var| self.values[*var].is_none())
    }

    fn preferred_value(&self, var: usize) -> bool {
        if let Some(hint) = self.model.initial_value(crate::Var(var)) {
            return hint;
        }
        let coefficient = self.model.objective_coefficient(crate::Var(var));
        match self.model.sense() {
            Sense::Maximize => coefficient > 0.0,
            Sense::Minimize => coefficient < 0.0,
        }
    }

    fn record_incumbent(&mut self) {
        let values: Vec<bool> = self
            .values
            .iter()
            .map(|value| value.unwrap_or(false))
            .collect();
        let objective = self.model.objective_value(&values);
        debug!(objective, nodes = self.nodes, "new incumbent");
        self.incumbent = Some(Incumbent { values, objective });
    }

    fn assign(&mut self, var: usize, value: bool) {
        self.values[var] = Some(value);
        self.trail.push(var);
        for position in 0..self.occurrences[var].len() {
            let constraint = self.occurrences[var][position];
            self.enqueue(constraint);
        }
    }

    fn enqueue(&mut self, constraint: usize) {
        if !self.queued[constraint] {
            self.queued[constraint] = true;
            self.queue.push_back(constraint);
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                self.values[var] = None;
            }
        }
    }

    fn propagate(&mut self) -> bool {
        while let Some(position) = self.queue.pop_front() {
            self.queued[position] = false;
            if !self.revise(position) {
                for constraint in self.queue.drain(..) {
                    self.queued[constraint] = false;
                }
                return false;
            }
        }
        true
    }

    fn revise(&mut self, position: usize) -> bool {
        let model = self.model;
        let constraint = &model.constraints()[position];
        let terms = constraint.expr().terms();
        let rhs = constraint.rhs();
        match constraint.comparison() {
            Comparison::LessEq => self.revise_upper(terms, rhs),
            Comparison::GreaterEq => self.revise_lower(terms, rhs),
            Comparison::Equal => self.revise_upper(terms, rhs) && self.revise_lower(terms, rhs),
        }
    }

    /// Enforces `activity <= rhs` from the smallest reachable activity.
    fn revise_upper(&mut self, terms: &[(crate::Var, i64)], rhs: i64) -> bool {
        let min_activity: i64 = terms
            .iter()
            .map(|(var, coefficient)| match self.values[var.index()] {
                Some(true) => *coefficient,
                Some(false) => 0,
                None => (*coefficient).min(0),
            })
            .sum();
        if min_activity > rhs {
            return false;
        }

        for (var, coefficient) in terms {
            if self.values[var.index()].is_some() {
                continue;
            }
            if *coefficient > 0 && min_activity + coefficient > rhs {
                self.assign(var.index(), false);
            } else if *coefficient < 0 && min_activity - coefficient > rhs {
                self.assign(var.index(), true);
            }
        }
        true
    }

    /// Enforces `activity >= rhs` from the largest reachable activity.
    fn revise_lower(&mut self, terms: &[(crate::Var, i64)], rhs: i64) -> bool {
        let max_activity: i64 = terms
            .iter()
            .map(|(var, coefficient)| match self.values[var.index()] {
                Some(true) => *coefficient,
                Some(false) => 0,
                None => (*coefficient).max(0),
            })
            .sum();
        if max_activity < rhs {
            return false;
        }

        for (var, coefficient) in terms {
            if self.values[var.index()].is_some() {
                continue;
            }
            if *coefficient > 0 && max_activity - coefficient < rhs {
                self.assign(var.index(), true);
            } else if *coefficient < 0 && max_activity + coefficient < rhs {
                self.assign(var.index(), false);
            }
        }
        true
    }
}
