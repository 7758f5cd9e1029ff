use std::collections::BTreeSet;

use tracing::debug;
use wave_planner_core::{CoverageIndex, Outcome, Selection, SoftwareId, TargetCount};

/// Adds software until at least `target` devices are fully covered by
/// `tested` plus the selection, or until no candidate touches an uncovered
/// device.
///
/// Candidates are scored by how many uncovered devices require them and are
/// visited in ascending id order, so ties go to the earliest candidate and
/// repeated runs return identical selections. Coverage is recomputed from the
/// index after every pick because requiring an item does not mean the device
/// is closed by it. Devices covered by `tested` alone count toward the target.
#[must_use]
pub fn set_cover(
    index: &CoverageIndex,
    target: TargetCount,
    tested: &BTreeSet<SoftwareId>,
) -> Selection {
    let mut candidates: Vec<SoftwareId> = index.available_software(tested).into_iter().collect();
    if candidates.is_empty() || index.device_count() == 0 {
        return Selection::empty(Outcome::EmptyInput);
    }

    let mut selected = BTreeSet::new();
    let mut unlocked = tested.clone();
    let mut covered = index.covered_devices(&unlocked);

    while covered.len() < target.get() && !candidates.is_empty() {
        let mut best: Option<(usize, usize)> = None;
        for (position, software) in candidates.iter().enumerate() {
            let score = index
                .requiring(*software)
                .iter()
                .filter(|device| !covered.contains(*device))
                .count();
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((position, score));
            }
        }

        let Some((position, score)) = best.filter(|(_, score)| *score > 0) else {
            debug!(covered = covered.len(), "no candidate touches an uncovered device");
            break;
        };

        let software = candidates.remove(position);
        let _ = selected.insert(software);
        let _ = unlocked.insert(software);
        covered = index.covered_devices(&unlocked);
        debug!(
            software = software.get(),
            score,
            covered = covered.len(),
            "greedy set-cover pick"
        );
    }

    Selection::new(selected, covered, Outcome::Heuristic)
}
