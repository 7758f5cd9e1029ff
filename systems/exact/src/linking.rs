use std::collections::{BTreeMap, BTreeSet};

use wave_planner_core::{CoverageIndex, DeviceId, SoftwareId};
use wave_planner_ilp::{Comparison, LinearExpr, Model, Var};

/// Coverage indicator of one device and the selection variables it depends on.
#[derive(Debug)]
pub(crate) struct DeviceLink {
    pub(crate) device: DeviceId,
    pub(crate) covered: Var,
    pub(crate) needs: Vec<Var>,
}

/// Creates one selection variable per available software item, in id order.
pub(crate) fn software_vars(
    model: &mut Model,
    available: &BTreeSet<SoftwareId>,
) -> BTreeMap<SoftwareId, Var> {
    available
        .iter()
        .map(|software| (*software, model.add_binary()))
        .collect()
}

/// Creates the coverage indicator of `device` and ties it to its residual
/// requirement: the indicator is one exactly when every needed item is
/// selected. Devices with no residual need are unreachable and pinned to zero.
pub(crate) fn link_device(
    model: &mut Model,
    index: &CoverageIndex,
    device: DeviceId,
    selection: &BTreeMap<SoftwareId, Var>,
) -> DeviceLink {
    let covered = model.add_binary();
    let needs: Vec<Var> = index
        .required(device)
        .iter()
        .filter_map(|software| selection.get(software).copied())
        .collect();

    if needs.is_empty() {
        model.fix(covered, false);
    } else {
        for need in &needs {
            model.add_constraint(
                LinearExpr::new().with(covered, 1).with(*need, -1),
                Comparison::LessEq,
                0,
            );
        }
        let mut all_selected = LinearExpr::new().with(covered, 1);
        for need in &needs {
            all_selected.push(*need, -1);
        }
        model.add_constraint(all_selected, Comparison::GreaterEq, 1 - needs.len() as i64);
    }

    DeviceLink {
        device,
        covered,
        needs,
    }
}

/// Seeds every variable with its value in the warm-start selection.
pub(crate) fn hint_warm_start(
    model: &mut Model,
    selection: &BTreeMap<SoftwareId, Var>,
    links: &[DeviceLink],
    warm_start: &BTreeSet<SoftwareId>,
) {
    let mut chosen = BTreeSet::new();
    for (software, var) in selection {
        let picked = warm_start.contains(software);
        model.set_initial(*var, picked);
        if picked {
            let _ = chosen.insert(*var);
        }
    }
    for link in links {
        let closed = !link.needs.is_empty() && link.needs.iter().all(|need| chosen.contains(need));
        model.set_initial(link.covered, closed);
    }
}

/// Reports whether `chosen` completes the residual requirement of `device`.
pub(crate) fn closes(
    index: &CoverageIndex,
    device: DeviceId,
    tested: &BTreeSet<SoftwareId>,
    chosen: &BTreeSet<SoftwareId>,
) -> bool {
    let mut residual = index
        .required(device)
        .iter()
        .filter(|software| !tested.contains(*software))
        .peekable();
    residual.peek().is_some() && residual.all(|software| chosen.contains(software))
}
