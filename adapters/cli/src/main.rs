#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plans migration waves for a device fleet.

mod config;
mod report;

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};
use wave_planner_core::{CoverageIndex, CumulativeState, SoftwareId};
use wave_planner_system_waves::WavePlanner;

use crate::{
    config::{PlanConfig, StrategyKind},
    report::Report,
};

/// Command-line arguments; flags override the plan file.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Plans software validation waves that unlock device migrations"
)]
struct Cli {
    /// Requirement document: {"devices": {"<device>": ["<software>", ...]}}
    #[arg(long, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// TOML plan file
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Software limit of each wave, comma separated
    #[arg(long, value_delimiter = ',')]
    waves: Option<Vec<usize>>,

    /// Selector family
    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Wall-clock budget of the exact selectors for the whole run
    #[arg(long)]
    time_limit_secs: Option<f64>,

    /// Per-software bonus of the exact max-coverage objective
    #[arg(long)]
    epsilon: Option<f64>,

    /// Solver seed
    #[arg(long)]
    seed: Option<u64>,

    /// Solve exact problems without greedy warm starts
    #[arg(long)]
    no_warm_start: bool,

    /// Find the fewest software items covering this many devices instead of planning waves
    #[arg(long)]
    target: Option<usize>,

    /// Software validated before the first wave, comma separated
    #[arg(long, value_delimiter = ',')]
    tested: Option<Vec<String>>,

    /// Print the automatic recommendation instead of the configured run
    #[arg(long)]
    recommend: bool,

    /// Attach inventory statistics to the report
    #[arg(long)]
    stats: bool,

    /// Destination for the JSON report; stdout when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut PlanConfig) {
        if let Some(waves) = &self.waves {
            config.waves = waves.clone();
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if self.time_limit_secs.is_some() {
            config.time_limit_secs = self.time_limit_secs;
        }
        if self.epsilon.is_some() {
            config.epsilon = self.epsilon;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.no_warm_start {
            config.warm_start = Some(false);
        }
        if self.target.is_some() {
            config.target = self.target;
        }
        if let Some(tested) = &self.tested {
            config.tested = tested.clone();
        }
    }
}

#[derive(Debug, Deserialize)]
struct RequirementDocument {
    devices: BTreeMap<String, Vec<String>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match &cli.config {
        Some(path) => PlanConfig::load(path)?,
        None => PlanConfig::default(),
    };
    cli.apply_overrides(&mut config);

    let index = load_index(&cli.input)?;
    info!(
        devices = index.device_count(),
        software = index.software_count(),
        "requirement document loaded"
    );

    let planner = WavePlanner::new(&index, config.strategy()?);
    let tested = resolve_tested(&index, &config.tested);

    let report = if cli.recommend {
        let recommendation = planner.recommend()?;
        Report::recommendation(&index, &recommendation)
    } else if let Some(target) = config.target()? {
        let selection = planner.minimum_cover(target, &tested);
        Report::cover(&index, target, &selection)
    } else {
        let limits = config.limits()?;
        let plan = planner
            .plan_from(&limits, CumulativeState::with_tested(tested))
            .context("no waves configured; pass --waves or set `waves` in the plan file")?;
        Report::plan(&index, &plan)
    };
    let report = if cli.stats {
        report.with_inventory(&index)
    } else {
        report
    };

    write_report(cli.output.as_deref(), &report)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(true).with_writer(io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn load_index(path: &Path) -> Result<CoverageIndex> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read requirement document {}", path.display()))?;
    let document: RequirementDocument = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse requirement document {}", path.display()))?;
    Ok(CoverageIndex::from_requirements(document.devices))
}

fn resolve_tested(index: &CoverageIndex, names: &[String]) -> BTreeSet<SoftwareId> {
    names
        .iter()
        .filter_map(|name| {
            let id = index.software_id(name);
            if id.is_none() {
                warn!(software = %name, "tested software is not required by any device");
            }
            id
        })
        .collect()
}

fn write_report(output: Option<&Path>, report: &Report) -> Result<()> {
    match output {
        Some(path) => {
            let json = serde_json::to_vec_pretty(report).context("failed to encode report")?;
            fs::write(path, json)
                .with_context(|| format!("failed to write report {}", path.display()))
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, report).context("failed to encode report")?;
            writeln!(handle).context("failed to write report")
        }
    }
}
