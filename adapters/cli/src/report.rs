use std::collections::BTreeSet;

use serde::Serialize;
use wave_planner_core::{
    CoverageIndex, DeviceId, Outcome, ProfileStatistics, Selection, SoftwareId, TargetCount,
};
use wave_planner_system_waves::{Recommendation, WavePlan};

/// Number of entries listed in each ranking.
const RANKING_LEN: usize = 10;

/// Document printed by the command-line adapter.
#[derive(Debug, Default, Serialize)]
pub(crate) struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    inventory: Option<Inventory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<CoverReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<PlanReport>,
}

impl Report {
    /// Report of a wave plan.
    pub(crate) fn plan(index: &CoverageIndex, plan: &WavePlan) -> Self {
        Self {
            plan: Some(PlanReport::new(index, plan)),
            ..Self::default()
        }
    }

    /// Report of a minimum-cover run.
    pub(crate) fn cover(index: &CoverageIndex, target: TargetCount, selection: &Selection) -> Self {
        Self {
            cover: Some(CoverReport::new(index, target, selection)),
            ..Self::default()
        }
    }

    /// Report of an automatic recommendation.
    pub(crate) fn recommendation(index: &CoverageIndex, recommendation: &Recommendation) -> Self {
        Self {
            cover: Some(CoverReport::new(
                index,
                recommendation.cover_target,
                &recommendation.minimal_cover,
            )),
            plan: Some(PlanReport::new(index, &recommendation.waves)),
            ..Self::default()
        }
    }

    /// Attaches inventory statistics of `index`.
    pub(crate) fn with_inventory(mut self, index: &CoverageIndex) -> Self {
        self.inventory = Some(Inventory::new(index));
        self
    }
}

#[derive(Debug, Serialize)]
struct Inventory {
    devices: usize,
    software: usize,
    profiles: ProfileStatistics,
    most_required: Vec<(String, usize)>,
    most_demanding: Vec<(String, usize)>,
}

impl Inventory {
    fn new(index: &CoverageIndex) -> Self {
        let most_required = ranked(index.software_popularity(), |software| {
            index.software_name(software)
        });
        let most_demanding = ranked(index.requirement_counts(), |device| {
            index.device_name(device)
        });

        Self {
            devices: index.device_count(),
            software: index.software_count(),
            profiles: index.profile_statistics(),
            most_required,
            most_demanding,
        }
    }
}

/// Largest counts first, ties by id, resolved to external names.
fn ranked<'a, Id, F>(mut counts: Vec<(Id, usize)>, name: F) -> Vec<(String, usize)>
where
    Id: Ord + Copy,
    F: Fn(Id) -> Option<&'a str>,
{
    counts.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));
    counts
        .into_iter()
        .take(RANKING_LEN)
        .filter_map(|(id, count)| name(id).map(|name| (name.to_owned(), count)))
        .collect()
}

#[derive(Debug, Serialize)]
struct CoverReport {
    target: usize,
    software: Vec<String>,
    covered_devices: usize,
    shortfall: usize,
    outcome: Outcome,
}

impl CoverReport {
    fn new(index: &CoverageIndex, target: TargetCount, selection: &Selection) -> Self {
        Self {
            target: target.get(),
            software: software_names(index, selection.software()),
            covered_devices: selection.covered_count(),
            shortfall: selection.shortfall(target),
            outcome: selection.outcome(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlanReport {
    total_devices: usize,
    migrated_devices: usize,
    tested_software: usize,
    waves: Vec<WaveReport>,
}

impl PlanReport {
    fn new(index: &CoverageIndex, plan: &WavePlan) -> Self {
        let waves = plan
            .waves()
            .iter()
            .map(|result| WaveReport {
                wave: result.wave().get(),
                software: software_names(index, result.software()),
                devices: device_names(index, result.devices()),
                outcome: result.outcome(),
            })
            .collect();

        Self {
            total_devices: index.device_count(),
            migrated_devices: plan.cumulative().devices().len(),
            tested_software: plan.cumulative().software().len(),
            waves,
        }
    }
}

#[derive(Debug, Serialize)]
struct WaveReport {
    wave: u32,
    software: Vec<String>,
    devices: Vec<String>,
    outcome: Outcome,
}

fn software_names(index: &CoverageIndex, software: &BTreeSet<SoftwareId>) -> Vec<String> {
    software
        .iter()
        .filter_map(|id| index.software_name(*id))
        .map(str::to_owned)
        .collect()
}

fn device_names(index: &CoverageIndex, devices: &BTreeSet<DeviceId>) -> Vec<String> {
    devices
        .iter()
        .filter_map(|id| index.device_name(*id))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_planner_core::SoftwareLimit;
    use wave_planner_system_waves::{Strategy, WavePlanner};

    fn sample() -> CoverageIndex {
        CoverageIndex::from_requirements([
            ("alpha", vec!["office"]),
            ("beta", vec!["office", "vpn"]),
            ("gamma", vec!["cad"]),
        ])
    }

    #[test]
    fn plan_report_uses_external_names() {
        let index = sample();
        let limit = SoftwareLimit::new(1).expect("positive limit");
        let plan = WavePlanner::new(&index, Strategy::Greedy)
            .plan(&[limit])
            .expect("valid plan");

        let json = serde_json::to_value(Report::plan(&index, &plan)).expect("serializable");
        assert_eq!(json["plan"]["total_devices"], 3);
        // cad and office each close one device; the tie goes to the smaller name.
        assert_eq!(json["plan"]["waves"][0]["software"][0], "cad");
        assert_eq!(json["plan"]["waves"][0]["devices"][0], "gamma");
        assert_eq!(json["plan"]["waves"][0]["outcome"], "Heuristic");
        assert!(json.get("cover").is_none(), "plan runs carry no cover section");
    }

    #[test]
    fn cover_report_states_shortfall() {
        let index = sample();
        let target = TargetCount::new(5).expect("positive target");
        let selection = WavePlanner::new(&index, Strategy::Greedy)
            .minimum_cover(target, &BTreeSet::new());

        let json = serde_json::to_value(Report::cover(&index, target, &selection))
            .expect("serializable");
        assert_eq!(json["cover"]["covered_devices"], 3);
        assert_eq!(json["cover"]["shortfall"], 2);
    }

    #[test]
    fn inventory_ranks_software_by_popularity() {
        let index = sample();
        let json =
            serde_json::to_value(Report::default().with_inventory(&index)).expect("serializable");

        assert_eq!(json["inventory"]["devices"], 3);
        assert_eq!(json["inventory"]["most_required"][0][0], "office");
        assert_eq!(json["inventory"]["most_required"][0][1], 2);
        assert_eq!(json["inventory"]["profiles"]["unique_profiles"], 3);
        assert_eq!(json["inventory"]["most_demanding"][0][0], "beta");
        assert_eq!(json["inventory"]["most_demanding"][0][1], 2);
        // alpha and gamma both need one item; alpha has the smaller id.
        assert_eq!(json["inventory"]["most_demanding"][1][0], "alpha");
    }
}
