use std::time::Instant;

use highs::{HighsModelStatus, RowProblem};
use tracing::{debug, warn};

use crate::{Comparison, Model, Sense, Solution, SolveOptions, SolveStatus, Solver, Var};

/// Largest value HiGHS accepts for its `random_seed` option.
const MAX_RANDOM_SEED: u64 = i32::MAX as u64;

/// Solver backed by the HiGHS mixed-integer solver.
///
/// Every variable becomes an integer column bounded to `0..=1`, or to its
/// single value when fixed. A complete set of initial values is handed to
/// HiGHS as a MIP start. The time limit and the seed map onto the
/// `time_limit` and `random_seed` options.
///
/// A solve that stops early keeps the better of the HiGHS columns and the MIP
/// start, provided either satisfies the model. A zero time limit returns
/// [`SolveStatus::NoIncumbent`] without starting HiGHS.
#[derive(Clone, Copy, Debug, Default)]
pub struct HighsSolver;

impl Solver for HighsSolver {
    fn solve(&self, model: &Model, options: &SolveOptions) -> Solution {
        if options.time_limit().map_or(false, |limit| limit.is_zero()) {
            return Solution::new(SolveStatus::NoIncumbent, None, None, 0);
        }
        if model.variable_count() == 0 {
            let status = if model.is_feasible(&[]) {
                SolveStatus::Optimal
            } else {
                SolveStatus::Infeasible
            };
            let values = (status == SolveStatus::Optimal).then(Vec::new);
            let objective = values.as_ref().map(|_| 0.0);
            return Solution::new(status, values, objective, 0);
        }

        let started = Instant::now();
        let start = mip_start(model);

        let mut problem = RowProblem::default();
        let columns: Vec<_> = (0..model.variable_count())
            .map(|position| {
                let var = Var(position);
                let coefficient = model.objective_coefficient(var);
                match model.fixed_value(var) {
                    Some(value) => {
                        let bound = if value { 1.0 } else { 0.0 };
                        problem.add_integer_column(coefficient, bound..=bound)
                    }
                    None => problem.add_integer_column(coefficient, 0.0..=1.0),
                }
            })
            .collect();

        for constraint in model.constraints() {
            let row: Vec<_> = constraint
                .expr()
                .terms()
                .iter()
                .map(|(var, coefficient)| (columns[var.index()], *coefficient as f64))
                .collect();
            let rhs = constraint.rhs() as f64;
            let _ = match constraint.comparison() {
                Comparison::LessEq => problem.add_row(..=rhs, &row),
                Comparison::GreaterEq => problem.add_row(rhs.., &row),
                Comparison::Equal => problem.add_row(rhs..=rhs, &row),
            };
        }

        let sense = match model.sense() {
            Sense::Maximize => highs::Sense::Maximise,
            Sense::Minimize => highs::Sense::Minimise,
        };
        let mut highs = problem.optimise(sense);
        highs.set_option("output_flag", false);
        highs.set_option("random_seed", (options.seed() % (MAX_RANDOM_SEED + 1)) as i32);
        if let Some(limit) = options.time_limit() {
            highs.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(start) = &start {
            let hint: Vec<f64> = start.iter().map(|value| f64::from(u8::from(*value))).collect();
            if let Err(status) = highs.try_set_solution(Some(&hint), None, None, None) {
                warn!(?status, "HiGHS rejected the MIP start");
            }
        }

        let solved = highs.solve();
        let highs_status = solved.status();
        let columns: Vec<bool> = solved
            .get_solution()
            .columns()
            .iter()
            .map(|value| *value > 0.5)
            .collect();

        let (status, incumbent) = match highs_status {
            HighsModelStatus::Optimal => (SolveStatus::Optimal, Some(columns)),
            HighsModelStatus::Infeasible => (SolveStatus::Infeasible, None),
            _ => {
                let incumbent = better_assignment(model, Some(columns), start);
                let status = if incumbent.is_some() {
                    SolveStatus::Feasible
                } else {
                    SolveStatus::NoIncumbent
                };
                (status, incumbent)
            }
        };

        debug!(
            variables = model.variable_count(),
            constraints = model.constraints().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?highs_status,
            ?status,
            "HiGHS finished"
        );

        match incumbent {
            Some(values) => {
                let objective = model.objective_value(&values);
                Solution::new(status, Some(values), Some(objective), 0)
            }
            None => Solution::new(status, None, None, 0),
        }
    }
}

/// Initial values for every variable, or `None` when any variable is unhinted.
fn mip_start(model: &Model) -> Option<Vec<bool>> {
    (0..model.variable_count())
        .map(|position| model.initial_value(Var(position)))
        .collect()
}

/// Picks the feasible assignment with the better objective.
fn better_assignment(
    model: &Model,
    first: Option<Vec<bool>>,
    second: Option<Vec<bool>>,
) -> Option<Vec<bool>> {
    let feasible = |values: &Vec<bool>| model.is_feasible(values);
    match (first.filter(feasible), second.filter(feasible)) {
        (Some(first), Some(second)) => {
            let first_value = model.objective_value(&first);
            let second_value = model.objective_value(&second);
            let second_wins = match model.sense() {
                Sense::Maximize => second_value > first_value,
                Sense::Minimize => second_value < first_value,
            };
            Some(if second_wins { second } else { first })
        }
        (first, second) => first.or(second),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::LinearExpr;

    fn options() -> SolveOptions {
        SolveOptions::new(None, 123)
    }

    #[test]
    fn solves_small_knapsack_exactly() {
        let mut model = Model::new(Sense::Maximize);
        let vars: Vec<Var> = (0..3).map(|_| model.add_binary()).collect();
        let mut capacity = LinearExpr::new();
        for (var, (weight, profit)) in vars.iter().zip([(3, 4.0), (4, 5.0), (5, 6.0)]) {
            capacity.push(*var, weight);
            model.set_objective(*var, profit);
        }
        model.add_constraint(capacity, Comparison::LessEq, 7);

        let solution = HighsSolver.solve(&model, &options());
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert_eq!(solution.objective(), Some(9.0));
        assert_eq!(solution.value(vars[0]), Some(true));
        assert_eq!(solution.value(vars[1]), Some(true));
        assert_eq!(solution.value(vars[2]), Some(false));
    }

    #[test]
    fn fixed_values_become_column_bounds() {
        let mut model = Model::new(Sense::Maximize);
        let a = model.add_binary();
        let b = model.add_binary();
        model.set_objective(a, 1.0);
        model.set_objective(b, 2.0);
        model.add_constraint(LinearExpr::sum([a, b]), Comparison::LessEq, 1);
        model.fix(b, false);

        let solution = HighsSolver.solve(&model, &options());
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert_eq!(solution.value(a), Some(true));
        assert_eq!(solution.value(b), Some(false));
    }

    #[test]
    fn conflicting_fixes_are_infeasible() {
        let mut model = Model::new(Sense::Maximize);
        let a = model.add_binary();
        let b = model.add_binary();
        model.add_constraint(LinearExpr::new().with(a, 1).with(b, -1), Comparison::Equal, 0);
        model.fix(a, true);
        model.fix(b, false);

        let solution = HighsSolver.solve(&model, &options());
        assert_eq!(solution.status(), SolveStatus::Infeasible);
        assert!(!solution.has_incumbent());
    }

    #[test]
    fn zero_time_limit_reports_missing_incumbent() {
        let mut model = Model::new(Sense::Maximize);
        let a = model.add_binary();
        model.set_objective(a, 1.0);
        model.set_initial(a, true);

        let solution = HighsSolver.solve(&model, &SolveOptions::new(Some(Duration::ZERO), 3));
        assert_eq!(solution.status(), SolveStatus::NoIncumbent);
        assert_eq!(solution.value(a), None);
    }

    #[test]
    fn covers_a_path_with_the_fewest_vertices() {
        let mut model = Model::new(Sense::Minimize);
        let vars: Vec<Var> = (0..6).map(|_| model.add_binary()).collect();
        for var in &vars {
            model.set_objective(*var, 1.0);
            model.set_initial(*var, true);
        }
        for pair in vars.windows(2) {
            model.add_constraint(LinearExpr::sum([pair[0], pair[1]]), Comparison::GreaterEq, 1);
        }

        let solution = HighsSolver.solve(&model, &SolveOptions::new(Some(Duration::from_secs(30)), 9));
        let values: Vec<bool> = vars
            .iter()
            .map(|var| solution.value(*var).unwrap_or(false))
            .collect();
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert!(model.is_feasible(&values));
        assert_eq!(solution.objective(), Some(3.0));
    }

    #[test]
    fn keeps_the_better_feasible_assignment() {
        let mut model = Model::new(Sense::Maximize);
        let a = model.add_binary();
        let b = model.add_binary();
        model.set_objective(a, 1.0);
        model.set_objective(b, 3.0);
        model.add_constraint(LinearExpr::sum([a, b]), Comparison::LessEq, 1);

        let chosen = better_assignment(&model, Some(vec![true, false]), Some(vec![false, true]));
        assert_eq!(chosen, Some(vec![false, true]));

        let infeasible_start = better_assignment(&model, Some(vec![true, false]), Some(vec![true, true]));
        assert_eq!(infeasible_start, Some(vec![true, false]));

        assert_eq!(better_assignment(&model, Some(vec![true, true]), None), None);
    }

    #[test]
    fn partial_hints_do_not_form_a_start() {
        let mut model = Model::new(Sense::Minimize);
        let a = model.add_binary();
        let _ = model.add_binary();
        model.set_initial(a, true);
        assert_eq!(mip_start(&model), None);
    }

    #[test]
    fn empty_model_is_trivially_optimal() {
        let model = Model::new(Sense::Minimize);
        let solution = HighsSolver.solve(&model, &options());
        assert_eq!(solution.status(), SolveStatus::Optimal);
        assert_eq!(solution.objective(), Some(0.0));
    }
}
