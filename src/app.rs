//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves the run configuration (JSON file + flag overrides)
//! - loads the dataset and runs the UCI pipeline
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, RunArgs, SimulateArgs};
use crate::data::{SimulationConfig, simulate_iv};
use crate::domain::{
    FailurePolicy, InstrumentSpecification, ModelSpecification, RunConfig, SupportBounds,
    UciOptions,
};
use crate::error::AppError;
use crate::fit::TwoStageLeastSquares;

pub mod pipeline;

/// Entry point for the `uci` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` is optional; it only feeds `RUST_LOG` and friends.
    let _ = dotenvy::dotenv();
    let cli = crate::cli::Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    // Ignore the error if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let base = match &args.config {
        Some(path) => Some(crate::io::read_run_config(path)?),
        None => None,
    };
    let config = run_config_from_args(&args, base)?;

    let columns = referenced_columns(&config);
    let data = crate::io::load_csv(&args.data, Some(columns.as_slice()))?;

    let run = pipeline::uci_detailed(
        &config.model,
        &config.instruments,
        &config.bounds,
        &data,
        &config.options,
        &TwoStageLeastSquares,
        None,
    )?;

    println!("{}", crate::report::format_run_summary(&run, &config));
    if args.candidates {
        println!(
            "{}",
            crate::report::format_candidates(&run, &config.model.endogenous)
        );
    }

    // Optional exports.
    if let Some(path) = &args.export_csv {
        crate::io::write_bounds_csv(path, &run.bounds)?;
    }
    if let Some(path) = &args.export_json {
        crate::io::write_bounds_json(path, &run, &config)?;
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = SimulationConfig {
        n_obs: args.n_obs,
        seed: args.seed,
        beta_endog: args.beta,
        first_stage: args.first_stage,
        endogeneity: args.endogeneity,
        gamma: args.gamma.clone(),
        ..SimulationConfig::default()
    };
    let frame = simulate_iv(&config)?;
    crate::io::write_csv(&args.out, &frame)?;
    eprintln!(
        "Wrote {} rows to {} (instruments: {}).",
        config.n_obs,
        args.out.display(),
        config.instrument_names().join(", ")
    );
    Ok(())
}

/// Merge a JSON config (if any) with CLI flags; flags win.
pub fn run_config_from_args(args: &RunArgs, base: Option<RunConfig>) -> Result<RunConfig, AppError> {
    let (mut model, mut instruments, mut bounds, mut options) = match base {
        Some(cfg) => (Some(cfg.model), Some(cfg.instruments), Some(cfg.bounds), cfg.options),
        None => (None, None, None, UciOptions::default()),
    };

    if let Some(dep) = &args.dependent {
        let m = model.get_or_insert_with(|| ModelSpecification::new(dep.clone(), Vec::<String>::new(), Vec::<String>::new()));
        m.dependent = dep.clone();
    }
    let mut model = model.ok_or_else(|| {
        AppError::new(2, "No model given: pass --dependent (and --exog/--endog) or --config.")
    })?;
    if !args.exogenous.is_empty() {
        model.exogenous = args.exogenous.clone();
    }
    if !args.endogenous.is_empty() {
        model.endogenous = args.endogenous.clone();
    }
    if args.no_intercept {
        model.intercept = false;
    }

    if !args.instruments.is_empty() || !args.endogenous.is_empty() {
        let inst = instruments.get_or_insert_with(|| {
            InstrumentSpecification::new(Vec::<String>::new(), Vec::<String>::new())
        });
        inst.endogenous = model.endogenous.clone();
        if !args.instruments.is_empty() {
            inst.instruments = args.instruments.clone();
        }
    }
    let instruments = instruments.ok_or_else(|| {
        AppError::new(2, "No instruments given: pass --instrument or --config.")
    })?;

    if !args.gmin.is_empty() || !args.gmax.is_empty() {
        let b = bounds.get_or_insert_with(|| SupportBounds::new(Vec::new(), Vec::new()));
        if !args.gmin.is_empty() {
            b.gmin = args.gmin.clone();
        }
        if !args.gmax.is_empty() {
            b.gmax = args.gmax.clone();
        }
    }
    let bounds = bounds.ok_or_else(|| {
        AppError::new(2, "No support bounds given: pass --gmin/--gmax or --config.")
    })?;

    if let Some(n) = args.grid_size {
        options.grid_size = n;
    }
    if let Some(max) = args.max_grid_points {
        options.max_grid_points = max;
    }
    if let Some(level) = args.level {
        options.estimator.confidence_level = level;
    }
    if let Some(v) = args.variance {
        options.estimator.variance = v;
    }
    if let Some(q) = args.quantile {
        options.estimator.quantile = q;
    }
    if args.skip_failures {
        options.failure_policy = FailurePolicy::SkipAndWarn;
    }
    if args.sequential {
        options.parallel = false;
    }

    Ok(RunConfig {
        model,
        instruments,
        bounds,
        options,
    })
}

fn referenced_columns(config: &RunConfig) -> Vec<String> {
    std::iter::once(&config.model.dependent)
        .chain(config.model.exogenous.iter())
        .chain(config.model.endogenous.iter())
        .chain(config.instruments.instruments.iter())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["uci", "run", "--data", "in.csv"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Run(args) => args,
            Command::Simulate(_) => unreachable!(),
        }
    }

    #[test]
    fn config_from_flags_only() {
        let args = run_args(&[
            "-y", "y", "--exog", "w", "--endog", "d", "--instrument", "z1", "--gmin", "-1",
            "--gmax", "1", "--skip-failures",
        ]);
        let cfg = run_config_from_args(&args, None).unwrap();
        assert_eq!(cfg.model, ModelSpecification::new("y", ["w"], ["d"]));
        assert_eq!(cfg.instruments, InstrumentSpecification::new(["d"], ["z1"]));
        assert_eq!(cfg.bounds, SupportBounds::new(vec![-1.0], vec![1.0]));
        assert_eq!(cfg.options.failure_policy, FailurePolicy::SkipAndWarn);
        assert_eq!(cfg.options.grid_size, 2);
    }

    #[test]
    fn flags_override_file_values() {
        let base = RunConfig {
            model: ModelSpecification::new("y", ["w"], ["d"]),
            instruments: InstrumentSpecification::new(["d"], ["z1"]),
            bounds: SupportBounds::new(vec![-1.0], vec![1.0]),
            options: UciOptions::default(),
        };
        let args = run_args(&[
            "--gmax", "0.5", "--grid-size", "7", "--no-intercept", "--max-grid-points", "500",
        ]);
        let cfg = run_config_from_args(&args, Some(base)).unwrap();
        assert_eq!(cfg.bounds.gmin, vec![-1.0]);
        assert_eq!(cfg.bounds.gmax, vec![0.5]);
        assert_eq!(cfg.options.grid_size, 7);
        assert_eq!(cfg.options.max_grid_points, 500);
        assert!(!cfg.model.intercept);
    }

    #[test]
    fn missing_pieces_are_reported() {
        let err = run_config_from_args(&run_args(&[]), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = run_config_from_args(&run_args(&["-y", "y", "--endog", "d"]), None).unwrap_err();
        assert!(err.to_string().contains("support bounds"), "{err}");
    }
}
