#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Backend-agnostic description of pure binary integer programs.
//!
//! Formulations build a [`Model`] through a narrow surface: create a binary
//! variable, add a linear constraint, set the objective, fix a variable or
//! hint its initial value. Any [`Solver`] can then solve the model under a
//! wall-clock limit and a seed, answering with a [`Solution`] that exposes the
//! status and the variable values.
//!
//! [`HighsSolver`] is the production backend. [`BranchAndBound`] is a small
//! pure-Rust search, useful as a second opinion on small models.

mod branch_bound;
mod highs_solver;

use std::time::Duration;

pub use branch_bound::BranchAndBound;
pub use highs_solver::HighsSolver;

/// Handle to a binary decision variable of a [`Model`].
///
/// Handles are dense indices assigned in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    /// Position of the variable in creation order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Direction of optimisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    /// Seek the smallest objective value.
    Minimize,
    /// Seek the largest objective value.
    Maximize,
}

/// Relation between a constraint's activity and its right-hand side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Activity must not exceed the right-hand side.
    LessEq,
    /// Activity must reach at least the right-hand side.
    GreaterEq,
    /// Activity must equal the right-hand side.
    Equal,
}

/// Integer-weighted sum of binary variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearExpr {
    terms: Vec<(Var, i64)>,
}

impl LinearExpr {
    /// Creates an expression without terms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of the provided variables, each with weight one.
    #[must_use]
    pub fn sum<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = Var>,
    {
        Self {
            terms: vars.into_iter().map(|var| (var, 1)).collect(),
        }
    }

    /// Adds `coefficient * var` to the expression.
    #[must_use]
    pub fn with(mut self, var: Var, coefficient: i64) -> Self {
        self.push(var, coefficient);
        self
    }

    /// Adds `coefficient * var` to the expression in place.
    pub fn push(&mut self, var: Var, coefficient: i64) {
        self.terms.push((var, coefficient));
    }

    /// Terms of the expression in insertion order.
    #[must_use]
    pub fn terms(&self) -> &[(Var, i64)] {
        &self.terms
    }

    /// Reports whether the expression has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Linear constraint `expr (<=|>=|==) rhs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    expr: LinearExpr,
    comparison: Comparison,
    rhs: i64,
}

impl Constraint {
    /// Left-hand side of the constraint.
    #[must_use]
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    /// Relation enforced by the constraint.
    #[must_use]
    pub const fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// Right-hand side of the constraint.
    #[must_use]
    pub const fn rhs(&self) -> i64 {
        self.rhs
    }

    fn is_satisfied(&self, values: &[bool]) -> bool {
        let activity: i64 = self
            .expr
            .terms()
            .iter()
            .filter(|(var, _)| values.get(var.index()).copied().unwrap_or(false))
            .map(|(_, coefficient)| *coefficient)
            .sum();
        match self.comparison {
            Comparison::LessEq => activity <= self.rhs,
            Comparison::GreaterEq => activity >= self.rhs,
            Comparison::Equal => activity == self.rhs,
        }
    }
}

/// Pure binary integer program.
#[derive(Clone, Debug)]
pub struct Model {
    sense: Sense,
    objective: Vec<f64>,
    constraints: Vec<Constraint>,
    fixed: Vec<Option<bool>>,
    initial: Vec<Option<bool>>,
}

impl Model {
    /// Creates an empty model optimising in the given direction.
    #[must_use]
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            objective: Vec::new(),
            constraints: Vec::new(),
            fixed: Vec::new(),
            initial: Vec::new(),
        }
    }

    /// Creates a new binary variable with a zero objective coefficient.
    pub fn add_binary(&mut self) -> Var {
        let var = Var(self.objective.len());
        self.objective.push(0.0);
        self.fixed.push(None);
        self.initial.push(None);
        var
    }

    /// Adds the constraint `expr comparison rhs`.
    pub fn add_constraint(&mut self, expr: LinearExpr, comparison: Comparison, rhs: i64) {
        self.constraints.push(Constraint {
            expr,
            comparison,
            rhs,
        });
    }

    /// Sets the objective coefficient of `var`.
    pub fn set_objective(&mut self, var: Var, coefficient: f64) {
        if let Some(slot) = self.objective.get_mut(var.index()) {
            *slot = coefficient;
        }
    }

    /// Bounds `var` to a single value.
    pub fn fix(&mut self, var: Var, value: bool) {
        if let Some(slot) = self.fixed.get_mut(var.index()) {
            *slot = Some(value);
        }
    }

    /// Hints the value `var` takes in a known solution.
    pub fn set_initial(&mut self, var: Var, value: bool) {
        if let Some(slot) = self.initial.get_mut(var.index()) {
            *slot = Some(value);
        }
    }

    /// Direction of optimisation.
    #[must_use]
    pub const fn sense(&self) -> Sense {
        self.sense
    }

    /// Number of variables created so far.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }

    /// Constraints in insertion order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective coefficient of `var`.
    #[must_use]
    pub fn objective_coefficient(&self, var: Var) -> f64 {
        self.objective.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Fixed value of `var`, if any.
    #[must_use]
    pub fn fixed_value(&self, var: Var) -> Option<bool> {
        self.fixed.get(var.index()).copied().flatten()
    }

    /// Hinted value of `var`, if any.
    #[must_use]
    pub fn initial_value(&self, var: Var) -> Option<bool> {
        self.initial.get(var.index()).copied().flatten()
    }

    /// Objective value of a complete assignment.
    #[must_use]
    pub fn objective_value(&self, values: &[bool]) -> f64 {
        self.objective
            .iter()
            .zip(values)
            .filter(|(_, value)| **value)
            .map(|(coefficient, _)| *coefficient)
            .sum()
    }

    /// Reports whether a complete assignment satisfies every bound and
    /// constraint.
    #[must_use]
    pub fn is_feasible(&self, values: &[bool]) -> bool {
        values.len() == self.variable_count()
            && self
                .fixed
                .iter()
                .zip(values)
                .all(|(fixed, value)| fixed.map_or(true, |fixed| fixed == *value))
            && self
                .constraints
                .iter()
                .all(|constraint| constraint.is_satisfied(values))
    }
}

/// Limits applied to a single solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolveOptions {
    time_limit: Option<Duration>,
    seed: u64,
}

impl SolveOptions {
    /// Creates options with the provided wall-clock limit and seed.
    ///
    /// `None` leaves the solve unbounded.
    #[must_use]
    pub const fn new(time_limit: Option<Duration>, seed: u64) -> Self {
        Self { time_limit, seed }
    }

    /// Wall-clock limit for the solve.
    #[must_use]
    pub const fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    /// Seed for the backend's tie-breaking.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

/// Termination status reported by a [`Solver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// The search completed and the incumbent is optimal.
    Optimal,
    /// The time limit expired with an incumbent that is not proven optimal.
    Feasible,
    /// The search completed without finding any feasible assignment.
    Infeasible,
    /// The time limit expired before any feasible assignment was found.
    NoIncumbent,
}

/// Answer of a [`Solver`].
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    status: SolveStatus,
    values: Option<Vec<bool>>,
    objective: Option<f64>,
    nodes: u64,
}

impl Solution {
    /// Assembles a solution. `values` must be present exactly when the
    /// status is [`SolveStatus::Optimal`] or [`SolveStatus::Feasible`].
    #[must_use]
    pub fn new(
        status: SolveStatus,
        values: Option<Vec<bool>>,
        objective: Option<f64>,
        nodes: u64,
    ) -> Self {
        Self {
            status,
            values,
            objective,
            nodes,
        }
    }

    /// Termination status.
    #[must_use]
    pub const fn status(&self) -> SolveStatus {
        self.status
    }

    /// Reports whether the solution carries variable values.
    #[must_use]
    pub fn has_incumbent(&self) -> bool {
        self.values.is_some()
    }

    /// Value of `var` in the incumbent.
    #[must_use]
    pub fn value(&self, var: Var) -> Option<bool> {
        self.values
            .as_ref()
            .and_then(|values| values.get(var.index()).copied())
    }

    /// Objective value of the incumbent.
    #[must_use]
    pub const fn objective(&self) -> Option<f64> {
        self.objective
    }

    /// Number of search nodes explored.
    #[must_use]
    pub const fn nodes(&self) -> u64 {
        self.nodes
    }
}

/// Backend able to solve a [`Model`].
pub trait Solver {
    /// Solves `model` under the provided limits.
    fn solve(&self, model: &Model, options: &SolveOptions) -> Solution;
}
