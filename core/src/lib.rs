#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the migration wave planner.
//!
//! This crate defines the vocabulary that connects the selector systems, the
//! wave orchestrator and the adapters. Adapters build a [`CoverageIndex`] once
//! from deduplicated device requirements, selectors read it immutably and
//! answer with [`Selection`] values, and the orchestrator folds those
//! selections into a [`CumulativeState`] that it threads from wave to wave.

mod index;

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

pub use index::{CoverageIndex, ProfileStatistics, RequirementProfile};

/// Tie-break weight applied to every selected software item by the exact
/// max-coverage objective.
pub const DEFAULT_EPSILON: f64 = 1e-3;

/// Seed used by the exact solvers when the caller does not provide one.
pub const DEFAULT_SOLVER_SEED: u64 = 123;

/// Unique identifier assigned to a device by the [`CoverageIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Creates a new device identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a software item by the [`CoverageIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoftwareId(u32);

impl SoftwareId {
    /// Creates a new software identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// One-based number of a migration wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaveNumber(u32);

impl WaveNumber {
    /// Creates a new wave number.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the wave number.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Maximum number of software items that may be selected in a single wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoftwareLimit(NonZeroUsize);

impl SoftwareLimit {
    /// Validates and wraps a per-wave software limit.
    pub fn new(value: usize) -> Result<Self, PlanError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(PlanError::ZeroLimit)
    }

    /// Retrieves the limit as a plain count.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0.get()
    }
}

/// Number of devices a set-cover selection should reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetCount(NonZeroUsize);

impl TargetCount {
    /// Validates and wraps a device coverage target.
    pub fn new(value: usize) -> Result<Self, PlanError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(PlanError::ZeroTarget)
    }

    /// Retrieves the target as a plain count.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0.get()
    }
}

/// Weight of the per-software bonus that breaks ties between equally
/// covering max-coverage solutions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Epsilon(f64);

impl Epsilon {
    /// Validates that the weight is finite and strictly inside `(0, 1)`.
    ///
    /// A weight of one or more would let software count compete with device
    /// coverage instead of only breaking ties.
    pub fn new(value: f64) -> Result<Self, PlanError> {
        if value.is_finite() && value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(PlanError::InvalidEpsilon(value))
        }
    }

    /// Retrieves the raw weight.
    #[must_use]
    pub const fn get(&self) -> f64 {
        self.0
    }
}

impl Default for Epsilon {
    fn default() -> Self {
        Self(DEFAULT_EPSILON)
    }
}

/// Describes how a [`Selection`] was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Produced by a greedy heuristic; not guaranteed optimal.
    Heuristic,
    /// Produced by the exact solver with a proof of optimality.
    Optimal,
    /// Best incumbent found before the time limit expired; potentially
    /// suboptimal.
    TimeLimited,
    /// The solver produced nothing usable and the warm start was returned
    /// with its coverage recomputed.
    WarmStartFallback,
    /// The solver produced nothing usable and no warm start was available.
    Unsolved,
    /// No software or no devices were available, so no solver ran.
    EmptyInput,
}

impl Outcome {
    /// Reports whether the selection may be worse than the true optimum.
    #[must_use]
    pub const fn is_potentially_suboptimal(&self) -> bool {
        !matches!(self, Outcome::Optimal | Outcome::EmptyInput)
    }
}

/// Software chosen by a selector together with the devices it fully covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    software: BTreeSet<SoftwareId>,
    devices: BTreeSet<DeviceId>,
    outcome: Outcome,
}

impl Selection {
    /// Assembles a selection from its parts.
    #[must_use]
    pub fn new(
        software: BTreeSet<SoftwareId>,
        devices: BTreeSet<DeviceId>,
        outcome: Outcome,
    ) -> Self {
        Self {
            software,
            devices,
            outcome,
        }
    }

    /// Creates a selection that contains neither software nor devices.
    #[must_use]
    pub fn empty(outcome: Outcome) -> Self {
        Self::new(BTreeSet::new(), BTreeSet::new(), outcome)
    }

    /// Software selected for testing.
    #[must_use]
    pub fn software(&self) -> &BTreeSet<SoftwareId> {
        &self.software
    }

    /// Devices whose residual requirement is covered by the selection.
    #[must_use]
    pub fn devices(&self) -> &BTreeSet<DeviceId> {
        &self.devices
    }

    /// How the selection was produced.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Number of covered devices.
    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of devices missing to reach `target`; zero when it was reached.
    #[must_use]
    pub fn shortfall(&self, target: TargetCount) -> usize {
        target.get().saturating_sub(self.devices.len())
    }

    /// Splits the selection into its software and device sets.
    #[must_use]
    pub fn into_parts(self) -> (BTreeSet<SoftwareId>, BTreeSet<DeviceId>) {
        (self.software, self.devices)
    }
}

/// Result of a single planned wave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveResult {
    wave: WaveNumber,
    selection: Selection,
}

impl WaveResult {
    /// Records the selection produced for `wave`.
    #[must_use]
    pub fn new(wave: WaveNumber, selection: Selection) -> Self {
        Self { wave, selection }
    }

    /// Wave the result belongs to.
    #[must_use]
    pub const fn wave(&self) -> WaveNumber {
        self.wave
    }

    /// Software selected for testing in this wave.
    #[must_use]
    pub fn software(&self) -> &BTreeSet<SoftwareId> {
        self.selection.software()
    }

    /// Devices that migrate in this wave.
    #[must_use]
    pub fn devices(&self) -> &BTreeSet<DeviceId> {
        self.selection.devices()
    }

    /// How the wave's selection was produced.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.selection.outcome()
    }
}

/// Software tested and devices migrated across all waves planned so far.
///
/// Both sets only ever grow. The orchestrator owns the state and lends it to
/// selectors by shared reference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeState {
    software: BTreeSet<SoftwareId>,
    devices: BTreeSet<DeviceId>,
}

impl CumulativeState {
    /// Creates the empty state that precedes the first wave.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state that starts from software validated elsewhere.
    #[must_use]
    pub fn with_tested(software: BTreeSet<SoftwareId>) -> Self {
        Self {
            software,
            devices: BTreeSet::new(),
        }
    }

    /// Software tested so far.
    #[must_use]
    pub fn software(&self) -> &BTreeSet<SoftwareId> {
        &self.software
    }

    /// Devices migrated so far.
    #[must_use]
    pub fn devices(&self) -> &BTreeSet<DeviceId> {
        &self.devices
    }

    /// Devices of the index that have not migrated yet.
    #[must_use]
    pub fn remaining_devices(&self, index: &CoverageIndex) -> BTreeSet<DeviceId> {
        index
            .devices()
            .filter(|device| !self.devices.contains(device))
            .collect()
    }

    /// Folds a wave's selection into the running totals.
    pub fn absorb(&mut self, selection: &Selection) {
        self.software.extend(selection.software().iter().copied());
        self.devices.extend(selection.devices().iter().copied());
    }
}

/// Programmer errors rejected before any selector runs.
///
/// Degenerate or infeasible inputs are not errors; they are reported through
/// [`Outcome`] and the size of the returned sets.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// A per-wave software limit of zero was requested.
    #[error("per-wave software limit must be positive")]
    ZeroLimit,
    /// A coverage target of zero devices was requested.
    #[error("device coverage target must be positive")]
    ZeroTarget,
    /// A wave plan without any waves was requested.
    #[error("wave plan must contain at least one wave")]
    EmptyWavePlan,
    /// The max-coverage tie-break weight is outside `(0, 1)`.
    #[error("tie-break epsilon {0} must be finite and within (0, 1)")]
    InvalidEpsilon(f64),
    /// A max-coverage warm start selects more software than the limit allows.
    #[error("warm start holds {size} software items but the wave limit is {limit}")]
    OversizedWarmStart {
        /// Number of software items in the warm start.
        size: usize,
        /// Limit of the wave the warm start was supplied for.
        limit: usize,
    },
}
