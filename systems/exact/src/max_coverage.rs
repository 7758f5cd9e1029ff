use std::collections::BTreeSet;

use tracing::{debug, warn};
use wave_planner_core::{
    CoverageIndex, DeviceId, Outcome, PlanError, Selection, SoftwareId, SoftwareLimit,
};
use wave_planner_ilp::{Comparison, LinearExpr, Model, Sense, SolveOptions, SolveStatus, Solver};

use crate::linking::{closes, hint_warm_start, link_device, software_vars, DeviceLink};
use crate::ExactSettings;

/// Arguments of an exact max-coverage solve.
#[derive(Clone, Copy, Debug)]
pub struct MaxCoverageInput<'a> {
    /// Index the problem is built from.
    pub index: &'a CoverageIndex,
    /// Maximum number of software items to select.
    pub limit: SoftwareLimit,
    /// Software already validated; never selected again.
    pub tested: &'a BTreeSet<SoftwareId>,
    /// Devices that have not migrated yet.
    pub remaining: &'a BTreeSet<DeviceId>,
    /// Known feasible selection used to seed the solver.
    pub warm_start: Option<&'a BTreeSet<SoftwareId>>,
}

/// Selects at most `limit` software items maximising the number of remaining
/// devices whose residual requirement is fully selected.
///
/// The objective adds `epsilon` per selected item so that, among equally
/// covering selections, the one spending the whole budget wins. Returns an
/// error only when the warm start itself exceeds the limit.
pub fn max_coverage<S: Solver>(
    solver: &S,
    input: MaxCoverageInput<'_>,
    settings: &ExactSettings,
) -> Result<Selection, PlanError> {
    let MaxCoverageInput {
        index,
        limit,
        tested,
        remaining,
        warm_start,
    } = input;

    if let Some(warm) = warm_start {
        if warm.len() > limit.get() {
            return Err(PlanError::OversizedWarmStart {
                size: warm.len(),
                limit: limit.get(),
            });
        }
    }

    let available = index.available_software(tested);
    if available.is_empty() || remaining.is_empty() {
        return Ok(Selection::empty(Outcome::EmptyInput));
    }

    let mut model = Model::new(Sense::Maximize);
    let selection = software_vars(&mut model, &available);
    let links: Vec<DeviceLink> = remaining
        .iter()
        .map(|device| link_device(&mut model, index, *device, &selection))
        .collect();

    let bonus = settings.epsilon().get();
    for var in selection.values() {
        model.set_objective(*var, bonus);
    }
    for link in &links {
        model.set_objective(link.covered, 1.0);
    }
    model.add_constraint(
        LinearExpr::sum(selection.values().copied()),
        Comparison::LessEq,
        limit.get() as i64,
    );

    if let Some(warm) = warm_start {
        hint_warm_start(&mut model, &selection, &links, warm);
    }

    let solution = solver.solve(
        &model,
        &SolveOptions::new(settings.time_limit(), settings.seed()),
    );
    debug!(
        software = selection.len(),
        devices = links.len(),
        status = ?solution.status(),
        objective = solution.objective(),
        "exact max-coverage solved"
    );

    let outcome = match solution.status() {
        SolveStatus::Optimal => Outcome::Optimal,
        SolveStatus::Feasible => Outcome::TimeLimited,
        SolveStatus::Infeasible | SolveStatus::NoIncumbent => {
            return Ok(fallback(index, tested, &available, remaining, warm_start));
        }
    };

    let software = selection
        .iter()
        .filter(|(_, var)| solution.value(**var) == Some(true))
        .map(|(software, _)| *software)
        .collect();
    let devices = links
        .iter()
        .filter(|link| solution.value(link.covered) == Some(true))
        .map(|link| link.device)
        .collect();

    Ok(Selection::new(software, devices, outcome))
}

fn fallback(
    index: &CoverageIndex,
    tested: &BTreeSet<SoftwareId>,
    available: &BTreeSet<SoftwareId>,
    remaining: &BTreeSet<DeviceId>,
    warm_start: Option<&BTreeSet<SoftwareId>>,
) -> Selection {
    let Some(warm) = warm_start else {
        warn!("exact max-coverage produced no incumbent and no warm start was supplied");
        return Selection::empty(Outcome::Unsolved);
    };

    let software: BTreeSet<SoftwareId> = warm.intersection(available).copied().collect();
    let devices = remaining
        .iter()
        .copied()
        .filter(|device| closes(index, *device, tested, &software))
        .collect();
    warn!(
        software = software.len(),
        "exact max-coverage produced no incumbent; returning the warm start"
    );
    Selection::new(software, devices, Outcome::WarmStartFallback)
}
