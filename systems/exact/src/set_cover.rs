use std::collections::BTreeSet;

use tracing::{debug, warn};
use wave_planner_core::{
    CoverageIndex, DeviceId, Outcome, Selection, SoftwareId, TargetCount,
};
use wave_planner_ilp::{Comparison, LinearExpr, Model, Sense, SolveOptions, SolveStatus, Solver};

use crate::linking::{hint_warm_start, link_device, software_vars, DeviceLink};
use crate::ExactSettings;

/// Arguments of an exact set-cover solve.
#[derive(Clone, Copy, Debug)]
pub struct SetCoverInput<'a> {
    /// Index the problem is built from.
    pub index: &'a CoverageIndex,
    /// Number of devices that must end up covered.
    pub target: TargetCount,
    /// Software already validated; never selected again.
    pub tested: &'a BTreeSet<SoftwareId>,
    /// Known selection, usually greedy, whose size bounds the search.
    pub warm_start: Option<&'a BTreeSet<SoftwareId>>,
}

/// Selects the fewest software items that, together with `tested`, fully
/// cover at least `target` devices.
///
/// Devices already covered by `tested` count toward the target. A non-empty
/// warm start of size `U` prunes every device needing more than `U` items and
/// caps the selection at `U`. When the target exceeds what the pruned
/// universe can reach, the largest reachable count is solved for instead and
/// the caller sees the shortfall through [`Selection::shortfall`].
#[must_use]
pub fn set_cover<S: Solver>(
    solver: &S,
    input: SetCoverInput<'_>,
    settings: &ExactSettings,
) -> Selection {
    let SetCoverInput {
        index,
        target,
        tested,
        warm_start,
    } = input;
    let warm_start = warm_start.filter(|warm| !warm.is_empty());

    let available = index.available_software(tested);
    if available.is_empty() || index.device_count() == 0 {
        return Selection::empty(Outcome::EmptyInput);
    }

    let already_covered = index.covered_devices(tested);
    if already_covered.len() >= target.get() {
        return Selection::new(BTreeSet::new(), already_covered, Outcome::Optimal);
    }

    let upper_bound = warm_start.map(BTreeSet::len);
    let universe: Vec<DeviceId> = index
        .devices()
        .filter(|device| {
            let need = index.residual_count(*device, tested);
            need > 0 && upper_bound.map_or(true, |bound| need <= bound)
        })
        .collect();

    let wanted = target.get() - already_covered.len();
    let required = if wanted > universe.len() {
        warn!(
            target = target.get(),
            reachable = already_covered.len() + universe.len(),
            "coverage target exceeds the reachable devices; solving for the reachable maximum"
        );
        universe.len()
    } else {
        wanted
    };

    let mut model = Model::new(Sense::Minimize);
    let selection = software_vars(&mut model, &available);
    let links: Vec<DeviceLink> = universe
        .iter()
        .map(|device| link_device(&mut model, index, *device, &selection))
        .collect();

    for var in selection.values() {
        model.set_objective(*var, 1.0);
    }
    model.add_constraint(
        LinearExpr::sum(links.iter().map(|link| link.covered)),
        Comparison::GreaterEq,
        required as i64,
    );

    if let (Some(warm), Some(bound)) = (warm_start, upper_bound) {
        model.add_constraint(
            LinearExpr::sum(selection.values().copied()),
            Comparison::LessEq,
            bound as i64,
        );
        hint_warm_start(&mut model, &selection, &links, warm);
    }

    let solution = solver.solve(
        &model,
        &SolveOptions::new(settings.time_limit(), settings.seed()),
    );
    debug!(
        software = selection.len(),
        devices = links.len(),
        required,
        status = ?solution.status(),
        objective = solution.objective(),
        "exact set-cover solved"
    );

    if solution.status() != SolveStatus::Optimal {
        if let Some(warm) = warm_start {
            let fallback = warm_start_selection(index, tested, &available, warm);
            if fallback.covered_count() >= target.get() {
                warn!(
                    status = ?solution.status(),
                    software = fallback.software().len(),
                    "exact set-cover not proven optimal; keeping the warm start"
                );
                return fallback;
            }
            if !solution.has_incumbent() {
                warn!("exact set-cover produced no incumbent; returning the warm start");
                return fallback;
            }
        } else if !solution.has_incumbent() {
            warn!("exact set-cover produced no incumbent and no warm start was supplied");
            return Selection::empty(Outcome::Unsolved);
        }
    }

    let outcome = if solution.status() == SolveStatus::Optimal {
        Outcome::Optimal
    } else {
        Outcome::TimeLimited
    };
    let software = selection
        .iter()
        .filter(|(_, var)| solution.value(**var) == Some(true))
        .map(|(software, _)| *software)
        .collect();
    let mut devices = already_covered;
    devices.extend(
        links
            .iter()
            .filter(|link| solution.value(link.covered) == Some(true))
            .map(|link| link.device),
    );

    Selection::new(software, devices, outcome)
}

/// The warm start restricted to available software, with coverage recomputed
/// from the index instead of trusted from whoever produced it.
fn warm_start_selection(
    index: &CoverageIndex,
    tested: &BTreeSet<SoftwareId>,
    available: &BTreeSet<SoftwareId>,
    warm: &BTreeSet<SoftwareId>,
) -> Selection {
    let software: BTreeSet<SoftwareId> = warm.intersection(available).copied().collect();
    let unlocked: BTreeSet<SoftwareId> = tested.union(&software).copied().collect();
    let devices = index.covered_devices(&unlocked);
    Selection::new(software, devices, Outcome::WarmStartFallback)
}
