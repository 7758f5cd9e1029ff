use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use wave_planner_core::{
    CoverageIndex, DeviceId, Outcome, SoftwareId, SoftwareLimit, TargetCount,
};
use wave_planner_system_greedy::{max_coverage, set_cover};

fn limit(value: usize) -> SoftwareLimit {
    SoftwareLimit::new(value).expect("positive limit")
}

fn target(value: usize) -> TargetCount {
    TargetCount::new(value).expect("positive target")
}

fn all_devices(index: &CoverageIndex) -> BTreeSet<DeviceId> {
    index.devices().collect()
}

fn names(index: &CoverageIndex, software: &BTreeSet<SoftwareId>) -> Vec<String> {
    software
        .iter()
        .filter_map(|id| index.software_name(*id))
        .map(str::to_owned)
        .collect()
}

fn random_index(seed: u64, devices: usize, catalogue: usize) -> CoverageIndex {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let requirements: Vec<(String, Vec<String>)> = (0..devices)
        .map(|device| {
            let wanted = rng.gen_range(1..=3);
            let software = (0..wanted)
                .map(|_| format!("sw-{:02}", rng.gen_range(0..catalogue)))
                .collect();
            (format!("dev-{device:03}"), software)
        })
        .collect();
    CoverageIndex::from_requirements(requirements)
}

#[test]
fn prefers_items_that_close_devices() {
    // "shared" touches three devices but closes none; "solo" closes one.
    let index = CoverageIndex::from_requirements([
        ("d1", vec!["shared", "x"]),
        ("d2", vec!["shared", "y"]),
        ("d3", vec!["shared", "z"]),
        ("d4", vec!["solo"]),
    ]);
    let selection = max_coverage(&index, limit(1), &BTreeSet::new(), &all_devices(&index));

    assert_eq!(names(&index, selection.software()), vec!["solo"]);
    assert_eq!(selection.covered_count(), 1);
    assert_eq!(selection.outcome(), Outcome::Heuristic);
}

#[test]
fn falls_back_to_popularity_when_nothing_closes() {
    let index = CoverageIndex::from_requirements([
        ("d1", vec!["a", "b"]),
        ("d2", vec!["a", "c"]),
        ("d3", vec!["b", "c", "d"]),
    ]);
    let selection = max_coverage(&index, limit(2), &BTreeSet::new(), &all_devices(&index));

    // Popularity ties between a, b and c resolve to "a"; "b" then closes d1.
    assert_eq!(names(&index, selection.software()), vec!["a", "b"]);
    let covered: Vec<_> = selection
        .devices()
        .iter()
        .filter_map(|device| index.device_name(*device))
        .collect();
    assert_eq!(covered, vec!["d1"]);
}

#[test]
fn respects_already_tested_software() {
    let index = CoverageIndex::from_requirements([
        ("d1", vec!["a", "b"]),
        ("d2", vec!["c", "d"]),
    ]);
    let tested: BTreeSet<_> = [index.software_id("a").expect("a")].into_iter().collect();
    let selection = max_coverage(&index, limit(1), &tested, &all_devices(&index));

    assert_eq!(names(&index, selection.software()), vec!["b"]);
    assert_eq!(selection.covered_count(), 1);
    assert!(!selection.software().contains(&index.software_id("a").expect("a")));
}

#[test]
fn stops_when_no_software_remains() {
    let index = CoverageIndex::from_requirements([("d1", vec!["a"]), ("d2", vec!["b"])]);
    let selection = max_coverage(&index, limit(10), &BTreeSet::new(), &all_devices(&index));

    assert_eq!(selection.software().len(), 2);
    assert_eq!(selection.covered_count(), 2);
}

#[test]
fn empty_remaining_devices_yield_empty_selection() {
    let index = CoverageIndex::from_requirements([("d1", vec!["a"])]);
    let selection = max_coverage(&index, limit(3), &BTreeSet::new(), &BTreeSet::new());

    assert!(selection.software().is_empty());
    assert!(selection.devices().is_empty());
    assert_eq!(selection.outcome(), Outcome::EmptyInput);
}

#[test]
fn single_item_requirement_is_covered_by_both_selectors() {
    let index = CoverageIndex::from_requirements(
        (1..=5).map(|device| (format!("D{device}"), vec!["x"])),
    );

    let cover = set_cover(&index, target(5), &BTreeSet::new());
    assert_eq!(names(&index, cover.software()), vec!["x"]);
    assert_eq!(cover.covered_count(), 5);

    let best = max_coverage(&index, limit(1), &BTreeSet::new(), &all_devices(&index));
    assert_eq!(names(&index, best.software()), vec!["x"]);
    assert_eq!(best.covered_count(), 5);
}

#[test]
fn set_cover_counts_devices_already_covered() {
    let index = CoverageIndex::from_requirements([
        ("d1", vec!["a"]),
        ("d2", vec!["b"]),
        ("d3", vec!["c", "d"]),
    ]);
    let tested: BTreeSet<_> = [index.software_id("a").expect("a")].into_iter().collect();
    let selection = set_cover(&index, target(2), &tested);

    assert_eq!(names(&index, selection.software()), vec!["b"]);
    assert_eq!(selection.covered_count(), 2);
}

#[test]
fn set_cover_recomputes_exact_coverage() {
    // "hub" touches every device but closes none of them on its own.
    let index = CoverageIndex::from_requirements([
        ("d1", vec!["hub", "p"]),
        ("d2", vec!["hub", "q"]),
        ("d3", vec!["hub", "r"]),
    ]);
    let selection = set_cover(&index, target(1), &BTreeSet::new());

    assert_eq!(names(&index, selection.software()), vec!["hub", "p"]);
    assert_eq!(selection.covered_count(), 1);
}

#[test]
fn set_cover_exhausts_candidates_on_unreachable_target() {
    let index = CoverageIndex::from_requirements([("d1", vec!["a"]), ("d2", vec!["a", "b"])]);
    let wanted = target(10);
    let selection = set_cover(&index, wanted, &BTreeSet::new());

    assert_eq!(selection.covered_count(), 2);
    assert_eq!(selection.shortfall(wanted), 8);
}

#[test]
fn set_cover_is_deterministic() {
    let index = random_index(0x5eed_0001, 60, 25);
    let first = set_cover(&index, target(30), &BTreeSet::new());
    let second = set_cover(&index, target(30), &BTreeSet::new());
    assert_eq!(first, second, "greedy set cover diverged between runs");
}

#[test]
fn greedy_results_have_no_false_positives_or_negatives() {
    for seed in 0..8_u64 {
        let index = random_index(seed, 40, 15);
        let tested: BTreeSet<_> = index.software().filter(|id| id.get() % 5 == 0).collect();
        let remaining = all_devices(&index);

        let selection = max_coverage(&index, limit(6), &tested, &remaining);
        assert!(selection.software().len() <= 6);
        assert!(selection.software().is_disjoint(&tested));
        for device in &remaining {
            let residual = index.residual(*device, &tested);
            let closed = !residual.is_empty() && residual.is_subset(selection.software());
            assert_eq!(
                selection.devices().contains(device),
                closed,
                "seed {seed}: device {device:?} misreported"
            );
        }

        let cover = set_cover(&index, target(20), &tested);
        let unlocked: BTreeSet<_> = tested.union(cover.software()).copied().collect();
        assert_eq!(cover.devices(), &index.covered_devices(&unlocked));
        let stalled = index
            .software()
            .filter(|id| !unlocked.contains(id))
            .all(|id| index.requiring(id).is_subset(cover.devices()));
        assert!(
            cover.covered_count() >= 20 || stalled,
            "seed {seed}: set cover stopped while a candidate could still help"
        );
    }
}
