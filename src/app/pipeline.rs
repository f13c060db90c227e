//! The end-to-end UCI procedure, shared by the library API and the CLI.
//!
//! validate inputs -> gamma grid -> candidate regressions -> 2SLS per candidate
//! -> union of confidence intervals
//!
//! All configuration checks run before the first regression, so a bad call
//! never performs partial work.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::data::Dataset;
use crate::domain::{
    CandidateRegression, EstimationResult, FailurePolicy, GammaVector, InstrumentSpecification,
    ModelSpecification, SupportBounds, UciOptions, UnionBounds, validate_specifications,
};
use crate::error::{EstimationError, UciError, UciResult};
use crate::fit::{IvEstimator, TwoStageLeastSquares, gamma_grid, grid_point_count, union_bounds};
use crate::models::{candidate_regressions, check_identification};

/// Cooperative cancellation flag, checked before each candidate estimation.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Estimation output for one grid point.
#[derive(Debug, Clone)]
pub struct CandidateOutcome {
    pub index: usize,
    pub gamma: GammaVector,
    pub result: EstimationResult,
}

/// A grid point dropped under [`FailurePolicy::SkipAndWarn`].
#[derive(Debug, Clone)]
pub struct SkippedCandidate {
    pub index: usize,
    pub gamma: GammaVector,
    pub error: EstimationError,
}

/// All computed outputs of a single UCI run.
#[derive(Debug, Clone)]
pub struct UciRun {
    pub bounds: UnionBounds,
    pub grid_len: usize,
    pub candidates: Vec<CandidateOutcome>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Union-of-confidence-intervals bounds with default options and 2SLS.
pub fn uci(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
    gmin: &[f64],
    gmax: &[f64],
    grid_size: usize,
    data: &dyn Dataset,
) -> UciResult<UnionBounds> {
    let bounds = SupportBounds::new(gmin.to_vec(), gmax.to_vec());
    let opts = UciOptions {
        grid_size,
        ..UciOptions::default()
    };
    uci_with(model, instruments, &bounds, data, &opts, &TwoStageLeastSquares, None)
}

/// Full entry point: explicit options, estimator, and cancellation.
pub fn uci_with(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
    bounds: &SupportBounds,
    data: &dyn Dataset,
    opts: &UciOptions,
    estimator: &dyn IvEstimator,
    cancel: Option<&CancelToken>,
) -> UciResult<UnionBounds> {
    uci_detailed(model, instruments, bounds, data, opts, estimator, cancel).map(|run| run.bounds)
}

/// Like [`uci_with`], additionally returning per-candidate results.
pub fn uci_detailed(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
    bounds: &SupportBounds,
    data: &dyn Dataset,
    opts: &UciOptions,
    estimator: &dyn IvEstimator,
    cancel: Option<&CancelToken>,
) -> UciResult<UciRun> {
    // 1) Validate everything up front.
    validate_inputs(model, instruments, bounds, data, opts)?;

    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(UciError::Cancelled { completed: 0 });
    }

    // 2) Grid and candidates.
    let grid = gamma_grid(bounds, opts.grid_size, opts.max_grid_points)?;
    let candidates = candidate_regressions(model, instruments, &grid)?;
    tracing::info!(
        dims = bounds.dims(),
        grid_size = opts.grid_size,
        candidates = candidates.len(),
        n_obs = data.n_rows(),
        "starting UCI run"
    );

    // 3) Estimate each candidate independently.
    let outcomes = estimate_all(&candidates, data, opts, estimator, cancel)?;

    // 4) Apply the failure policy in grid order.
    let mut kept = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for (candidate, outcome) in candidates.into_iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                tracing::debug!(index = candidate.index, gamma = ?candidate.gamma, "candidate estimated");
                kept.push(CandidateOutcome {
                    index: candidate.index,
                    gamma: candidate.gamma,
                    result,
                });
            }
            Err(error) => match opts.failure_policy {
                FailurePolicy::Abort => {
                    return Err(UciError::Estimation {
                        index: candidate.index,
                        gamma: candidate.gamma,
                        source: error,
                    });
                }
                FailurePolicy::SkipAndWarn => {
                    tracing::warn!(
                        index = candidate.index,
                        gamma = ?candidate.gamma,
                        %error,
                        "skipping candidate; union no longer covers the full grid"
                    );
                    skipped.push(SkippedCandidate {
                        index: candidate.index,
                        gamma: candidate.gamma,
                        error,
                    });
                }
            },
        }
    }

    // 5) Union.
    let bounds_out = union_bounds(kept.iter().map(|c| &c.result))?;
    for b in bounds_out.iter() {
        tracing::info!(coefficient = %b.name, lower = b.lower, upper = b.upper, "union bounds");
    }

    Ok(UciRun {
        bounds: bounds_out,
        grid_len: grid.len(),
        candidates: kept,
        skipped,
    })
}

/// Configuration checks; runs before any regression.
pub fn validate_inputs(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
    bounds: &SupportBounds,
    data: &dyn Dataset,
    opts: &UciOptions,
) -> UciResult<()> {
    bounds.validate()?;
    if opts.grid_size < 1 {
        return Err(UciError::config("Grid size must be >= 1."));
    }
    grid_point_count(bounds.dims(), opts.grid_size, opts.max_grid_points)?;
    opts.estimator.validate()?;
    validate_specifications(model, instruments)?;
    check_identification(model, instruments)?;

    if bounds.dims() != instruments.instruments.len() {
        return Err(UciError::config(format!(
            "Support bounds have {} dimension(s) but there are {} instrument(s); one (gmin, gmax) pair per instrument is required.",
            bounds.dims(),
            instruments.instruments.len()
        )));
    }

    if data.n_rows() == 0 {
        return Err(UciError::config("Dataset has no rows."));
    }
    let referenced = std::iter::once(&model.dependent)
        .chain(model.exogenous.iter())
        .chain(model.endogenous.iter())
        .chain(instruments.instruments.iter());
    for name in referenced {
        let Some(column) = data.column(name) else {
            return Err(UciError::config(format!(
                "Dataset has no column named `{name}`."
            )));
        };
        if column.len() != data.n_rows() {
            return Err(UciError::config(format!(
                "Column `{name}` has {} values but the dataset has {} rows.",
                column.len(),
                data.n_rows()
            )));
        }
    }
    Ok(())
}

type Outcome = Result<EstimationResult, EstimationError>;

/// Estimate every candidate in grid order.
///
/// Under [`FailurePolicy::Abort`] the first failure stops the run: candidates
/// after the lowest failing index are not estimated, while earlier ones still
/// are, so the reported failure is the same for parallel and sequential runs.
fn estimate_all(
    candidates: &[CandidateRegression],
    data: &dyn Dataset,
    opts: &UciOptions,
    estimator: &dyn IvEstimator,
    cancel: Option<&CancelToken>,
) -> UciResult<Vec<Outcome>> {
    let abort_on_failure = opts.failure_policy == FailurePolicy::Abort;
    let completed = AtomicUsize::new(0);
    let first_failure = AtomicUsize::new(usize::MAX);
    let estimate_one = |(pos, candidate): (usize, &CandidateRegression)| -> Option<Outcome> {
        if pos > first_failure.load(Ordering::SeqCst) {
            return None;
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return None;
        }
        let out = estimator.estimate(candidate, data, &opts.estimator);
        completed.fetch_add(1, Ordering::Relaxed);
        if abort_on_failure && out.is_err() {
            first_failure.fetch_min(pos, Ordering::SeqCst);
        }
        Some(out)
    };

    // Collect in grid order either way, so results match the sequential path.
    let mut outcomes: Vec<Option<Outcome>> = if opts.parallel {
        candidates.par_iter().enumerate().map(&estimate_one).collect()
    } else {
        candidates.iter().enumerate().map(&estimate_one).collect()
    };

    let failed_at = first_failure.load(Ordering::SeqCst);
    if let (Some(candidate), Some(Some(Err(source)))) = (
        candidates.get(failed_at),
        outcomes.get_mut(failed_at).map(Option::take),
    ) {
        return Err(UciError::Estimation {
            index: candidate.index,
            gamma: candidate.gamma.clone(),
            source,
        });
    }

    let outcomes: Option<Vec<Outcome>> = outcomes.into_iter().collect();
    outcomes.ok_or_else(|| UciError::Cancelled {
        completed: completed.load(Ordering::Relaxed),
    })
}
