//! Command-line parsing for the `uci` sensitivity tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{QuantileKind, VarianceKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "uci",
    version,
    about = "Union-of-confidence-intervals sensitivity bounds for IV regressions"
)]
pub struct Cli {
    /// Log filter (e.g. `info`, `iv_uci=debug`). Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute UCI bounds for a CSV dataset.
    Run(RunArgs),
    /// Write a synthetic IV dataset to CSV.
    Simulate(SimulateArgs),
}

/// Options for `uci run`.
///
/// Model options may come from `--config`; any flag given here overrides the
/// corresponding file value.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Input CSV (header row, numeric columns).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// JSON run configuration (model, instruments, bounds, options).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Dependent variable.
    #[arg(short = 'y', long)]
    pub dependent: Option<String>,

    /// Exogenous regressors (repeatable or comma-separated).
    #[arg(long = "exog", value_delimiter = ',')]
    pub exogenous: Vec<String>,

    /// Endogenous regressors (repeatable or comma-separated).
    #[arg(long = "endog", value_delimiter = ',')]
    pub endogenous: Vec<String>,

    /// Excluded instruments (repeatable or comma-separated).
    #[arg(long = "instrument", value_delimiter = ',')]
    pub instruments: Vec<String>,

    /// Drop the constant term.
    #[arg(long)]
    pub no_intercept: bool,

    /// Lower support bound per instrument.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub gmin: Vec<f64>,

    /// Upper support bound per instrument.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub gmax: Vec<f64>,

    /// Grid points per instrument.
    #[arg(long)]
    pub grid_size: Option<usize>,

    /// Reject grids with more than this many points.
    #[arg(long)]
    pub max_grid_points: Option<usize>,

    /// Confidence level of each candidate interval.
    #[arg(long)]
    pub level: Option<f64>,

    /// Covariance estimator.
    #[arg(long, value_enum)]
    pub variance: Option<VarianceKind>,

    /// Reference distribution for critical values.
    #[arg(long, value_enum)]
    pub quantile: Option<QuantileKind>,

    /// Skip failed candidates instead of aborting (weakens the coverage guarantee).
    #[arg(long)]
    pub skip_failures: bool,

    /// Estimate candidates on a single thread.
    #[arg(long)]
    pub sequential: bool,

    /// Print every candidate's interval for the endogenous regressors.
    #[arg(long)]
    pub candidates: bool,

    /// Export bounds to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,

    /// Export bounds and run settings to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for `uci simulate`.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of observations.
    #[arg(short = 'n', long, default_value_t = 500)]
    pub n_obs: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// True effect of the endogenous regressor `d`.
    #[arg(long, default_value_t = 2.0)]
    pub beta: f64,

    /// First-stage strength of each instrument.
    #[arg(long, default_value_t = 1.0)]
    pub first_stage: f64,

    /// Correlation between first-stage and structural errors.
    #[arg(long, default_value_t = 0.5)]
    pub endogeneity: f64,

    /// True direct effect per instrument; the count sets the number of instruments.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0.0")]
    pub gamma: Vec<f64>,
}
