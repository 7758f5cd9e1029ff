#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Exact integer-programming selectors for wave planning.
//!
//! Each selector translates its problem into a [`wave_planner_ilp::Model`]
//! with one binary variable per available software item and one per device,
//! hands it to any [`wave_planner_ilp::Solver`], and maps the answer back.
//! Variables are indexed in ascending id order on every build, so identical
//! inputs always produce identical models.
//!
//! When the solver returns nothing usable, a supplied warm start is returned
//! with its coverage recomputed from the index; without one the selection is
//! empty. The [`Outcome`] of every selection says which path produced it.
//!
//! [`Outcome`]: wave_planner_core::Outcome

mod linking;
mod max_coverage;
mod set_cover;

use std::time::Duration;

use wave_planner_core::{Epsilon, DEFAULT_SOLVER_SEED};

pub use max_coverage::{max_coverage, MaxCoverageInput};
pub use set_cover::{set_cover, SetCoverInput};

/// Solver limits and tie-breaking knobs shared by the exact selectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExactSettings {
    time_limit: Option<Duration>,
    seed: u64,
    epsilon: Epsilon,
}

impl ExactSettings {
    /// Creates settings with an optional wall-clock limit per solve.
    #[must_use]
    pub const fn new(time_limit: Option<Duration>, seed: u64, epsilon: Epsilon) -> Self {
        Self {
            time_limit,
            seed,
            epsilon,
        }
    }

    /// Returns a copy with a different time limit.
    #[must_use]
    pub fn with_time_limit(mut self, time_limit: Option<Duration>) -> Self {
        self.time_limit = time_limit;
        self
    }

    /// Wall-clock limit per solve; `None` is unbounded.
    #[must_use]
    pub const fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    /// Seed forwarded to the solver.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Weight of the max-coverage per-software bonus.
    #[must_use]
    pub const fn epsilon(&self) -> Epsilon {
        self.epsilon
    }
}

impl Default for ExactSettings {
    fn default() -> Self {
        Self::new(None, DEFAULT_SOLVER_SEED, Epsilon::default())
    }
}
