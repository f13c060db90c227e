//! Error types.
//!
//! The library surfaces [`UciError`] (and the per-candidate [`EstimationError`]
//! it wraps). The `uci` binary converts everything into [`AppError`], which
//! carries a process exit code:
//!
//! - `2`: configuration / input errors
//! - `3`: data or identification problems
//! - `4`: estimation or aggregation failures

use thiserror::Error;

/// Failure while estimating a single candidate regression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("{stage} design matrix is rank-deficient (rank {rank} < {cols} columns)")]
    SingularMatrix {
        stage: String,
        rank: usize,
        cols: usize,
    },

    #[error("insufficient observations: {rows} rows for {params} parameters")]
    InsufficientObservations { rows: usize, params: usize },

    #[error("column `{0}` not found in dataset")]
    MissingColumn(String),

    #[error("column `{name}` has {len} values but the dataset has {rows} rows")]
    ColumnLength { name: String, len: usize, rows: usize },

    #[error("column `{name}` holds a non-finite value at row {row}")]
    NonFiniteData { name: String, row: usize },

    #[error("regression has no regressors")]
    EmptyDesign,

    #[error("critical value unavailable: {0}")]
    Distribution(String),
}

/// Errors returned by the UCI procedure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UciError {
    /// Malformed, missing, or mismatched call arguments.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(
        "model is under-identified: {instruments} instrument(s) for {endogenous} endogenous regressor(s)"
    )]
    UnderidentifiedModel { instruments: usize, endogenous: usize },

    /// A candidate regression failed; `index` is its position in the grid.
    #[error("estimation failed at grid point {index} (gamma = {gamma:?}): {source}")]
    Estimation {
        index: usize,
        gamma: Vec<f64>,
        source: EstimationError,
    },

    #[error("candidate {index} has a coefficient set that differs from candidate 0")]
    InconsistentCoefficientSet { index: usize },

    #[error("no candidate confidence intervals to aggregate")]
    EmptyGrid,

    #[error("run cancelled after {completed} candidate estimation(s)")]
    Cancelled { completed: usize },
}

pub type UciResult<T> = Result<T, UciError>;

impl UciError {
    pub fn config(message: impl Into<String>) -> Self {
        UciError::Config(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<UciError> for AppError {
    fn from(err: UciError) -> Self {
        let exit_code = match &err {
            UciError::Config(_) => 2,
            UciError::UnderidentifiedModel { .. } => 3,
            UciError::Estimation { source, .. } => match source {
                EstimationError::MissingColumn(_)
                | EstimationError::ColumnLength { .. }
                | EstimationError::NonFiniteData { .. } => 3,
                _ => 4,
            },
            UciError::InconsistentCoefficientSet { .. } | UciError::EmptyGrid => 4,
            UciError::Cancelled { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
