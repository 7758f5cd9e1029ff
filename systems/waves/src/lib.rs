#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave orchestration for migration planning.
//!
//! The [`WavePlanner`] owns the [`CumulativeState`] of a run. For every wave it
//! derives the devices that have not migrated yet, lends the tested software
//! to the configured selector, and folds the answer back into the state before
//! the next wave starts. Waves therefore run strictly in sequence.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{info, warn};
use wave_planner_core::{
    CoverageIndex, CumulativeState, DeviceId, Epsilon, PlanError, Selection, SoftwareId,
    SoftwareLimit, TargetCount, WaveNumber, WaveResult, DEFAULT_SOLVER_SEED,
};
use wave_planner_ilp::{HighsSolver, Solver};
use wave_planner_system_exact::{self as exact, ExactSettings, MaxCoverageInput, SetCoverInput};
use wave_planner_system_greedy as greedy;

/// Share of the device universe the automatic recommendation covers first.
const RECOMMENDED_COVER_SHARE: f64 = 0.2;
/// Per-wave software limit used by the automatic recommendation.
const RECOMMENDED_WAVE_LIMIT: usize = 100;

/// Selector family used for every wave of a plan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Polynomial-time greedy selectors.
    Greedy,
    /// Integer-programming selectors.
    Exact(ExactConfig),
}

/// Configuration of the exact selectors for a whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExactConfig {
    /// Wall-clock budget for the whole run; `None` is unbounded.
    pub time_limit: Option<Duration>,
    /// Seed forwarded to the solver.
    pub seed: u64,
    /// Weight of the max-coverage per-software bonus.
    pub epsilon: Epsilon,
    /// Seed each exact solve with the greedy answer to the same problem.
    pub warm_start: bool,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            seed: DEFAULT_SOLVER_SEED,
            epsilon: Epsilon::default(),
            warm_start: true,
        }
    }
}

impl ExactConfig {
    fn settings(&self, time_limit: Option<Duration>) -> ExactSettings {
        ExactSettings::new(time_limit, self.seed, self.epsilon)
    }
}

/// Splits a run-wide time budget evenly across `waves`.
///
/// Later waves usually have fewer devices left, yet receive the same share.
#[must_use]
pub fn split_time_budget(total: Option<Duration>, waves: usize) -> Option<Duration> {
    let total = total?;
    match u32::try_from(waves) {
        Ok(0) => Some(total),
        Ok(count) => Some(total / count),
        Err(_) => Some(Duration::ZERO),
    }
}

/// Outcome of a multi-wave planning run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WavePlan {
    waves: Vec<WaveResult>,
    cumulative: CumulativeState,
    software_waves: BTreeMap<SoftwareId, WaveNumber>,
    device_waves: BTreeMap<DeviceId, WaveNumber>,
}

impl WavePlan {
    /// Per-wave results in wave order.
    #[must_use]
    pub fn waves(&self) -> &[WaveResult] {
        &self.waves
    }

    /// Software tested and devices migrated across every wave.
    #[must_use]
    pub fn cumulative(&self) -> &CumulativeState {
        &self.cumulative
    }

    /// Wave in which `software` is tested, if any.
    #[must_use]
    pub fn software_wave(&self, software: SoftwareId) -> Option<WaveNumber> {
        self.software_waves.get(&software).copied()
    }

    /// Wave in which `device` migrates, if any.
    #[must_use]
    pub fn device_wave(&self, device: DeviceId) -> Option<WaveNumber> {
        self.device_waves.get(&device).copied()
    }

    /// Wave assignment of every software item selected by the plan.
    #[must_use]
    pub fn software_waves(&self) -> &BTreeMap<SoftwareId, WaveNumber> {
        &self.software_waves
    }

    /// Wave assignment of every device migrated by the plan.
    #[must_use]
    pub fn device_waves(&self) -> &BTreeMap<DeviceId, WaveNumber> {
        &self.device_waves
    }
}

/// Automatic starting point for a migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recommendation {
    /// Target used for the minimal cover.
    pub cover_target: TargetCount,
    /// Smallest software set found for the cover target.
    pub minimal_cover: Selection,
    /// Two consecutive waves with the recommended software limit.
    pub waves: WavePlan,
}

/// Sequences selector calls across waves over one immutable index.
#[derive(Debug)]
pub struct WavePlanner<'a, S = HighsSolver> {
    index: &'a CoverageIndex,
    strategy: Strategy,
    solver: S,
}

impl<'a> WavePlanner<'a, HighsSolver> {
    /// Creates a planner that solves exact waves with [`HighsSolver`].
    #[must_use]
    pub fn new(index: &'a CoverageIndex, strategy: Strategy) -> Self {
        Self::with_solver(index, strategy, HighsSolver)
    }
}

impl<'a, S: Solver> WavePlanner<'a, S> {
    /// Creates a planner that solves exact waves with `solver`.
    #[must_use]
    pub fn with_solver(index: &'a CoverageIndex, strategy: Strategy, solver: S) -> Self {
        Self {
            index,
            strategy,
            solver,
        }
    }

    /// Strategy used for every wave.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Plans one wave per limit, starting with nothing tested.
    pub fn plan(&self, limits: &[SoftwareLimit]) -> Result<WavePlan, PlanError> {
        self.plan_from(limits, CumulativeState::new())
    }

    /// Plans one wave per limit, continuing from `state`.
    ///
    /// Software in `state` is treated as tested in earlier waves and devices
    /// in `state` are not planned again.
    pub fn plan_from(
        &self,
        limits: &[SoftwareLimit],
        state: CumulativeState,
    ) -> Result<WavePlan, PlanError> {
        self.run_waves(self.strategy, limits, state)
    }

    fn run_waves(
        &self,
        strategy: Strategy,
        limits: &[SoftwareLimit],
        state: CumulativeState,
    ) -> Result<WavePlan, PlanError> {
        if limits.is_empty() {
            return Err(PlanError::EmptyWavePlan);
        }

        let wave_time = match strategy {
            Strategy::Greedy => None,
            Strategy::Exact(config) => split_time_budget(config.time_limit, limits.len()),
        };

        let mut cumulative = state;
        let mut waves = Vec::with_capacity(limits.len());
        let mut software_waves = BTreeMap::new();
        let mut device_waves = BTreeMap::new();

        for (position, limit) in limits.iter().enumerate() {
            let wave = WaveNumber::new(position as u32 + 1);
            let remaining = cumulative.remaining_devices(self.index);
            let selection =
                self.select_wave(strategy, *limit, &cumulative, &remaining, wave_time)?;

            info!(
                wave = wave.get(),
                limit = limit.get(),
                software = selection.software().len(),
                devices = selection.covered_count(),
                remaining = remaining.len().saturating_sub(selection.covered_count()),
                outcome = ?selection.outcome(),
                "wave planned"
            );
            let is_exact = matches!(strategy, Strategy::Exact(_));
            if is_exact && selection.outcome().is_potentially_suboptimal() {
                warn!(
                    wave = wave.get(),
                    outcome = ?selection.outcome(),
                    "wave selection is not proven optimal"
                );
            }

            cumulative.absorb(&selection);
            for software in selection.software() {
                let _ = software_waves.insert(*software, wave);
            }
            for device in selection.devices() {
                let _ = device_waves.insert(*device, wave);
            }
            waves.push(WaveResult::new(wave, selection));
        }

        Ok(WavePlan {
            waves,
            cumulative,
            software_waves,
            device_waves,
        })
    }

    fn select_wave(
        &self,
        strategy: Strategy,
        limit: SoftwareLimit,
        cumulative: &CumulativeState,
        remaining: &BTreeSet<DeviceId>,
        time_limit: Option<Duration>,
    ) -> Result<Selection, PlanError> {
        let tested = cumulative.software();
        match strategy {
            Strategy::Greedy => Ok(greedy::max_coverage(self.index, limit, tested, remaining)),
            Strategy::Exact(config) => {
                let warm = config
                    .warm_start
                    .then(|| greedy::max_coverage(self.index, limit, tested, remaining));
                exact::max_coverage(
                    &self.solver,
                    MaxCoverageInput {
                        index: self.index,
                        limit,
                        tested,
                        remaining,
                        warm_start: warm.as_ref().map(Selection::software),
                    },
                    &config.settings(time_limit),
                )
            }
        }
    }

    /// Finds a small software set that, with `tested`, covers at least
    /// `target` devices.
    ///
    /// In exact mode the greedy cover seeds the solver only when it reaches
    /// the target itself.
    #[must_use]
    pub fn minimum_cover(
        &self,
        target: TargetCount,
        tested: &BTreeSet<SoftwareId>,
    ) -> Selection {
        let selection = match self.strategy {
            Strategy::Greedy => greedy::set_cover(self.index, target, tested),
            Strategy::Exact(config) => {
                let heuristic = config
                    .warm_start
                    .then(|| greedy::set_cover(self.index, target, tested))
                    .filter(|heuristic| {
                        let feasible = heuristic.covered_count() >= target.get();
                        if !feasible {
                            info!("greedy cover misses the target; solving without warm start");
                        }
                        feasible
                    });
                exact::set_cover(
                    &self.solver,
                    SetCoverInput {
                        index: self.index,
                        target,
                        tested,
                        warm_start: heuristic.as_ref().map(Selection::software),
                    },
                    &config.settings(config.time_limit),
                )
            }
        };

        let shortfall = selection.shortfall(target);
        if shortfall > 0 {
            warn!(
                target = target.get(),
                covered = selection.covered_count(),
                shortfall,
                "coverage target not reached"
            );
        }
        selection
    }

    /// Minimal cover for a fifth of the devices followed by two greedy waves
    /// of up to one hundred software items each.
    ///
    /// The cover follows the planner's strategy; the waves are always greedy.
    pub fn recommend(&self) -> Result<Recommendation, PlanError> {
        let share = (self.index.device_count() as f64 * RECOMMENDED_COVER_SHARE) as usize;
        let cover_target = TargetCount::new(share.max(1))?;
        let minimal_cover = self.minimum_cover(cover_target, &BTreeSet::new());

        let limit = SoftwareLimit::new(
            RECOMMENDED_WAVE_LIMIT
                .min(self.index.software_count())
                .max(1),
        )?;
        let waves = self.run_waves(Strategy::Greedy, &[limit, limit], CumulativeState::new())?;

        Ok(Recommendation {
            cover_target,
            minimal_cover,
            waves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_time_budget_evenly() {
        let total = Some(Duration::from_secs(90));
        assert_eq!(split_time_budget(total, 3), Some(Duration::from_secs(30)));
        assert_eq!(split_time_budget(total, 0), total);
        assert_eq!(split_time_budget(None, 3), None);
    }

    #[test]
    fn rejects_empty_wave_plan() {
        let index = CoverageIndex::from_requirements([("d1", vec!["a"])]);
        let planner = WavePlanner::new(&index, Strategy::Greedy);
        assert_eq!(planner.plan(&[]), Err(PlanError::EmptyWavePlan));
    }
}
