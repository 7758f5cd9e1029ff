use std::collections::BTreeSet;
use std::time::Duration;

use wave_planner_core::{
    CoverageIndex, CumulativeState, Outcome, SoftwareLimit, TargetCount, WaveNumber,
};
use wave_planner_system_waves::{ExactConfig, Strategy, WavePlan, WavePlanner};

fn limits(values: &[usize]) -> Vec<SoftwareLimit> {
    values
        .iter()
        .map(|value| SoftwareLimit::new(*value).expect("positive limit"))
        .collect()
}

fn fleet() -> CoverageIndex {
    CoverageIndex::from_requirements([
        ("ws-01", vec!["office"]),
        ("ws-02", vec!["office"]),
        ("ws-03", vec!["office", "vpn"]),
        ("ws-04", vec!["office", "vpn", "cad"]),
        ("ws-05", vec!["browser"]),
        ("ws-06", vec!["browser", "vpn"]),
        ("ws-07", vec!["cad", "plm"]),
        ("ws-08", vec!["erp", "office"]),
        ("ws-09", vec!["erp"]),
        ("ws-10", vec!["plm"]),
    ])
}

fn assert_plan_is_consistent(index: &CoverageIndex, plan: &WavePlan, caps: &[usize]) {
    let mut tested_before = BTreeSet::new();
    let mut migrated_before = BTreeSet::new();

    for (result, cap) in plan.waves().iter().zip(caps) {
        assert!(result.software().len() <= *cap, "wave {:?} over its limit", result.wave());
        assert!(result.software().is_disjoint(&tested_before));
        assert!(result.devices().is_disjoint(&migrated_before));

        for device in result.devices() {
            let residual = index.residual(*device, &tested_before);
            assert!(
                residual.is_subset(result.software()),
                "device {device:?} migrated without its software"
            );
        }

        tested_before.extend(result.software().iter().copied());
        migrated_before.extend(result.devices().iter().copied());
    }

    assert_eq!(plan.cumulative().software(), &tested_before);
    assert_eq!(plan.cumulative().devices(), &migrated_before);
}

#[test]
fn greedy_waves_carry_state_forward() {
    let index = fleet();
    let planner = WavePlanner::new(&index, Strategy::Greedy);
    let caps = [2, 2, 2];
    let plan = planner.plan(&limits(&caps)).expect("valid plan");

    assert_eq!(plan.waves().len(), 3);
    assert_plan_is_consistent(&index, &plan, &caps);
    for (position, result) in plan.waves().iter().enumerate() {
        assert_eq!(result.wave(), WaveNumber::new(position as u32 + 1));
        assert_eq!(result.outcome(), Outcome::Heuristic);
    }

    let office = index.software_id("office").expect("office");
    assert_eq!(plan.software_wave(office), Some(WaveNumber::new(1)));
    let first_wave = &plan.waves()[0];
    for device in first_wave.devices() {
        assert_eq!(plan.device_wave(*device), Some(WaveNumber::new(1)));
    }
}

#[test]
fn exact_waves_cover_at_least_as_much_as_greedy_in_the_first_wave() {
    let index = fleet();
    let caps = [3, 3];
    let greedy = WavePlanner::new(&index, Strategy::Greedy)
        .plan(&limits(&caps))
        .expect("valid plan");
    let exact = WavePlanner::new(&index, Strategy::Exact(ExactConfig::default()))
        .plan(&limits(&caps))
        .expect("valid plan");

    assert_plan_is_consistent(&index, &exact, &caps);
    assert!(exact.waves()[0].devices().len() >= greedy.waves()[0].devices().len());
    assert_eq!(exact.waves()[0].outcome(), Outcome::Optimal);
}

#[test]
fn exact_waves_without_warm_start_reach_the_same_first_wave_coverage() {
    let index = fleet();
    let seeded = WavePlanner::new(&index, Strategy::Exact(ExactConfig::default()))
        .plan(&limits(&[2]))
        .expect("valid plan");
    let cold = WavePlanner::new(
        &index,
        Strategy::Exact(ExactConfig {
            warm_start: false,
            ..ExactConfig::default()
        }),
    )
    .plan(&limits(&[2]))
    .expect("valid plan");

    assert_eq!(seeded.waves()[0].devices().len(), cold.waves()[0].devices().len());
}

#[test]
fn expired_budget_falls_back_to_greedy_warm_start() {
    let index = fleet();
    let planner = WavePlanner::new(
        &index,
        Strategy::Exact(ExactConfig {
            time_limit: Some(Duration::ZERO),
            ..ExactConfig::default()
        }),
    );
    let plan = planner.plan(&limits(&[2, 2])).expect("valid plan");
    let greedy = WavePlanner::new(&index, Strategy::Greedy)
        .plan(&limits(&[2, 2]))
        .expect("valid plan");

    for (fallback, heuristic) in plan.waves().iter().zip(greedy.waves()) {
        assert_eq!(fallback.outcome(), Outcome::WarmStartFallback);
        assert_eq!(fallback.software(), heuristic.software());
        assert_eq!(fallback.devices(), heuristic.devices());
    }
}

#[test]
fn planning_resumes_from_previously_tested_software() {
    let index = fleet();
    let office = index.software_id("office").expect("office");
    let state = CumulativeState::with_tested(BTreeSet::from([office]));
    let plan = WavePlanner::new(&index, Strategy::Greedy)
        .plan_from(&limits(&[1]), state)
        .expect("valid plan");

    let wave = &plan.waves()[0];
    assert!(!wave.software().contains(&office));
    // With office already tested, erp alone closes ws-08 and ws-09.
    let erp = index.software_id("erp").expect("erp");
    assert_eq!(wave.software(), &BTreeSet::from([erp]));
    assert_eq!(wave.devices().len(), 2);
    assert!(plan.cumulative().software().contains(&office));
    assert_eq!(plan.software_wave(office), None);
}

#[test]
fn exhausted_universe_yields_empty_waves() {
    let index = CoverageIndex::from_requirements([("ws-01", vec!["a"]), ("ws-02", vec!["b"])]);
    let plan = WavePlanner::new(&index, Strategy::Greedy)
        .plan(&limits(&[5, 5]))
        .expect("valid plan");

    assert_eq!(plan.waves()[0].devices().len(), 2);
    assert!(plan.waves()[1].software().is_empty());
    assert_eq!(plan.waves()[1].outcome(), Outcome::EmptyInput);
}

#[test]
fn minimum_cover_reports_shortfall_for_unreachable_targets() {
    let index = fleet();
    let target = TargetCount::new(25).expect("positive target");
    for strategy in [Strategy::Greedy, Strategy::Exact(ExactConfig::default())] {
        let cover = WavePlanner::new(&index, strategy).minimum_cover(target, &BTreeSet::new());
        assert_eq!(cover.covered_count(), index.device_count());
        assert_eq!(cover.shortfall(target), 25 - index.device_count());
    }
}

#[test]
fn exact_minimum_cover_is_no_larger_than_greedy() {
    let index = fleet();
    let target = TargetCount::new(6).expect("positive target");
    let greedy = WavePlanner::new(&index, Strategy::Greedy).minimum_cover(target, &BTreeSet::new());
    let exact = WavePlanner::new(&index, Strategy::Exact(ExactConfig::default()))
        .minimum_cover(target, &BTreeSet::new());

    assert!(greedy.covered_count() >= 6);
    assert!(exact.covered_count() >= 6);
    assert!(exact.software().len() <= greedy.software().len());
}

#[test]
fn recommendation_covers_a_fifth_then_plans_two_waves() {
    let index = fleet();
    let recommendation = WavePlanner::new(&index, Strategy::Greedy)
        .recommend()
        .expect("valid recommendation");

    assert_eq!(recommendation.cover_target.get(), 2);
    assert!(recommendation.minimal_cover.covered_count() >= 2);
    assert_eq!(recommendation.waves.waves().len(), 2);
    assert_eq!(
        recommendation.waves.cumulative().devices().len(),
        index.device_count(),
        "a limit above the catalogue size migrates everything"
    );
}

#[test]
fn recommended_waves_are_greedy_under_the_exact_strategy() {
    let index = fleet();
    let recommendation = WavePlanner::new(&index, Strategy::Exact(ExactConfig::default()))
        .recommend()
        .expect("valid recommendation");

    assert_eq!(recommendation.minimal_cover.outcome(), Outcome::Optimal);
    assert_eq!(recommendation.waves.waves()[0].outcome(), Outcome::Heuristic);
}
