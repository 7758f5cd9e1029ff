use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use wave_planner_core::{
    CoverageIndex, DeviceId, Outcome, Selection, SoftwareId, SoftwareLimit,
};

/// Picks at most `limit` software items so that as many `remaining` devices
/// as possible have their whole residual requirement selected.
///
/// Each round prefers the item that closes the most devices needing exactly
/// one more item; when no device is one item away, the item required by the
/// most remaining devices is taken instead. Ties go to the smallest id.
/// Devices whose requirement is already tested are unreachable and never
/// reported.
#[must_use]
pub fn max_coverage(
    index: &CoverageIndex,
    limit: SoftwareLimit,
    tested: &BTreeSet<SoftwareId>,
    remaining: &BTreeSet<DeviceId>,
) -> Selection {
    let mut available = index.available_software(tested);
    if available.is_empty() || remaining.is_empty() {
        return Selection::empty(Outcome::EmptyInput);
    }

    let mut needs: BTreeMap<DeviceId, usize> = remaining
        .iter()
        .map(|device| (*device, index.residual_count(*device, tested)))
        .filter(|(_, need)| *need > 0)
        .collect();

    let popularity: BTreeMap<SoftwareId, usize> = available
        .iter()
        .map(|software| {
            let touched = index
                .requiring(*software)
                .iter()
                .filter(|device| remaining.contains(*device))
                .count();
            (*software, touched)
        })
        .collect();

    let mut selected = BTreeSet::new();
    let mut migrated = BTreeSet::new();

    for _ in 0..limit.get() {
        if available.is_empty() {
            break;
        }

        let closers = tally_closers(index, &needs, tested, &selected, &available);
        let pick = if closers.is_empty() {
            best_by_score(
                available
                    .iter()
                    .map(|software| (*software, popularity.get(software).copied().unwrap_or(0))),
            )
        } else {
            best_by_score(closers.iter().map(|(software, closed)| (*software, *closed)))
        };

        let Some((software, score)) = pick else {
            break;
        };
        debug!(
            software = software.get(),
            score,
            closing = !closers.is_empty(),
            "greedy max-coverage pick"
        );

        let _ = selected.insert(software);
        let _ = available.remove(&software);

        for device in index.requiring(software) {
            let Some(need) = needs.get_mut(device) else {
                continue;
            };
            *need -= 1;
            if *need == 0 {
                let _ = needs.remove(device);
                let _ = migrated.insert(*device);
            }
        }
    }

    Selection::new(selected, migrated, Outcome::Heuristic)
}

/// Counts, per software item, the devices it would close on its own.
fn tally_closers(
    index: &CoverageIndex,
    needs: &BTreeMap<DeviceId, usize>,
    tested: &BTreeSet<SoftwareId>,
    selected: &BTreeSet<SoftwareId>,
    available: &BTreeSet<SoftwareId>,
) -> BTreeMap<SoftwareId, usize> {
    let mut closers = BTreeMap::new();
    for (device, need) in needs {
        if *need != 1 {
            continue;
        }
        let missing = index
            .required(*device)
            .iter()
            .find(|software| !tested.contains(*software) && !selected.contains(*software));
        if let Some(software) = missing.filter(|software| available.contains(*software)) {
            *closers.entry(*software).or_insert(0) += 1;
        }
    }
    closers
}

/// Highest score wins; equal scores go to the smallest id.
fn best_by_score<I>(scores: I) -> Option<(SoftwareId, usize)>
where
    I: IntoIterator<Item = (SoftwareId, usize)>,
{
    scores
        .into_iter()
        .max_by_key(|(software, score)| (*score, Reverse(*software)))
}
