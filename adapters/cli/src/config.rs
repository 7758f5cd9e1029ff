use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use wave_planner_core::{Epsilon, SoftwareLimit, TargetCount, DEFAULT_SOLVER_SEED};
use wave_planner_system_waves::{ExactConfig, Strategy};

/// Selector family named in a plan file or on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StrategyKind {
    /// Greedy selectors.
    #[default]
    Greedy,
    /// Integer-programming selectors.
    Exact,
}

/// Plan file contents. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PlanConfig {
    /// Software limit of each wave, in wave order.
    pub(crate) waves: Vec<usize>,
    /// Selector family.
    pub(crate) strategy: StrategyKind,
    /// Wall-clock budget of the exact selectors for the whole run.
    pub(crate) time_limit_secs: Option<f64>,
    /// Per-software bonus of the exact max-coverage objective.
    pub(crate) epsilon: Option<f64>,
    /// Solver seed.
    pub(crate) seed: Option<u64>,
    /// Seed exact solves with greedy answers.
    pub(crate) warm_start: Option<bool>,
    /// Device count for a minimum-cover run instead of a wave plan.
    pub(crate) target: Option<usize>,
    /// Software names validated before the first wave.
    pub(crate) tested: Vec<String>,
}

impl PlanConfig {
    /// Reads and parses a TOML plan file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan config {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse plan config {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid plan config toml")
    }

    /// Strategy described by this configuration.
    pub(crate) fn strategy(&self) -> Result<Strategy> {
        match self.strategy {
            StrategyKind::Greedy => Ok(Strategy::Greedy),
            StrategyKind::Exact => {
                let epsilon = match self.epsilon {
                    Some(value) => Epsilon::new(value)?,
                    None => Epsilon::default(),
                };
                Ok(Strategy::Exact(ExactConfig {
                    time_limit: self.time_limit()?,
                    seed: self.seed.unwrap_or(DEFAULT_SOLVER_SEED),
                    epsilon,
                    warm_start: self.warm_start.unwrap_or(true),
                }))
            }
        }
    }

    /// Validated per-wave software limits.
    pub(crate) fn limits(&self) -> Result<Vec<SoftwareLimit>> {
        self.waves
            .iter()
            .enumerate()
            .map(|(position, limit)| {
                SoftwareLimit::new(*limit)
                    .with_context(|| format!("wave {} has an invalid limit", position + 1))
            })
            .collect()
    }

    /// Validated minimum-cover target, if one was requested.
    pub(crate) fn target(&self) -> Result<Option<TargetCount>> {
        self.target
            .map(TargetCount::new)
            .transpose()
            .context("invalid coverage target")
    }

    fn time_limit(&self) -> Result<Option<Duration>> {
        let Some(seconds) = self.time_limit_secs else {
            return Ok(None);
        };
        match Duration::try_from_secs_f64(seconds) {
            Ok(limit) => Ok(Some(limit)),
            Err(_) => bail!("time limit must be a non-negative number of seconds, got {seconds}"),
        }
    }
}
