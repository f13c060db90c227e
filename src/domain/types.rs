//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - built programmatically by library callers
//! - loaded from a JSON run configuration
//! - exported alongside the computed bounds

use std::collections::HashSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{UciError, UciResult};

/// Name given to the constant regressor when a model carries an intercept.
pub const INTERCEPT: &str = "(Intercept)";

/// One candidate vector of direct effects, one entry per instrument.
pub type GammaVector = Vec<f64>;

/// Structural equation: `dependent ~ exogenous + endogenous`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpecification {
    pub dependent: String,
    #[serde(default)]
    pub exogenous: Vec<String>,
    #[serde(default)]
    pub endogenous: Vec<String>,
    /// Include a constant term as the first exogenous regressor.
    #[serde(default = "default_true")]
    pub intercept: bool,
}

fn default_true() -> bool {
    true
}

impl ModelSpecification {
    pub fn new(
        dependent: impl Into<String>,
        exogenous: impl IntoIterator<Item = impl Into<String>>,
        endogenous: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            dependent: dependent.into(),
            exogenous: exogenous.into_iter().map(Into::into).collect(),
            endogenous: endogenous.into_iter().map(Into::into).collect(),
            intercept: true,
        }
    }

    pub fn without_intercept(mut self) -> Self {
        self.intercept = false;
        self
    }

    /// Exogenous terms as they enter the design matrix (intercept first).
    pub fn exogenous_terms(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.exogenous.len() + 1);
        if self.intercept {
            out.push(INTERCEPT.to_string());
        }
        out.extend(self.exogenous.iter().cloned());
        out
    }

    /// Coefficient names in estimation order: exogenous terms then endogenous.
    pub fn coefficient_names(&self) -> Vec<String> {
        let mut out = self.exogenous_terms();
        out.extend(self.endogenous.iter().cloned());
        out
    }
}

/// Endogenous regressors paired with their excluded instruments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpecification {
    pub endogenous: Vec<String>,
    pub instruments: Vec<String>,
}

impl InstrumentSpecification {
    pub fn new(
        endogenous: impl IntoIterator<Item = impl Into<String>>,
        instruments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            endogenous: endogenous.into_iter().map(Into::into).collect(),
            instruments: instruments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_identified(&self) -> bool {
        self.instruments.len() >= self.endogenous.len()
    }
}

/// Check the naming invariants of a model / instrument pair.
///
/// Identification is *not* checked here; see
/// [`crate::models::check_identification`].
pub fn validate_specifications(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
) -> UciResult<()> {
    if model.dependent.trim().is_empty() {
        return Err(UciError::config("Dependent variable name is empty."));
    }

    let mut seen = HashSet::new();
    let referenced = std::iter::once(&model.dependent)
        .chain(model.exogenous.iter())
        .chain(model.endogenous.iter())
        .chain(instruments.instruments.iter());
    for name in referenced {
        if name.trim().is_empty() {
            return Err(UciError::config("Variable names must be non-empty."));
        }
        // Reserved even without an intercept: the estimator maps it to ones.
        if name == INTERCEPT {
            return Err(UciError::config(format!(
                "`{INTERCEPT}` is reserved for the constant term and cannot name a variable."
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(UciError::config(format!(
                "Variable `{name}` is referenced more than once; names must be distinct."
            )));
        }
    }

    let model_endog: HashSet<&str> = model.endogenous.iter().map(String::as_str).collect();
    let inst_endog: HashSet<&str> = instruments.endogenous.iter().map(String::as_str).collect();
    if model_endog != inst_endog || instruments.endogenous.len() != model.endogenous.len() {
        return Err(UciError::config(format!(
            "Instrument specification endogenous set {:?} does not match model endogenous set {:?}.",
            instruments.endogenous, model.endogenous
        )));
    }

    if model.exogenous_terms().is_empty() && model.endogenous.is_empty() {
        return Err(UciError::config("Model has no regressors."));
    }

    Ok(())
}

/// Support of the direct effects: `gamma[i] ∈ [gmin[i], gmax[i]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportBounds {
    pub gmin: Vec<f64>,
    pub gmax: Vec<f64>,
}

impl SupportBounds {
    pub fn new(gmin: Vec<f64>, gmax: Vec<f64>) -> Self {
        Self { gmin, gmax }
    }

    pub fn dims(&self) -> usize {
        self.gmin.len()
    }

    pub fn validate(&self) -> UciResult<()> {
        if self.gmin.len() != self.gmax.len() {
            return Err(UciError::config(format!(
                "gmin has {} entries but gmax has {}; they must have equal length.",
                self.gmin.len(),
                self.gmax.len()
            )));
        }
        for (i, (&lo, &hi)) in self.gmin.iter().zip(self.gmax.iter()).enumerate() {
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(UciError::config(format!(
                    "Support bounds for dimension {i} must be finite (gmin={lo}, gmax={hi})."
                )));
            }
            if lo > hi {
                return Err(UciError::config(format!(
                    "Support bounds for dimension {i} are reversed (gmin={lo} > gmax={hi})."
                )));
            }
        }
        Ok(())
    }
}

/// A concrete regression problem for one grid point.
///
/// The dependent variable is `dependent - Σ gamma_i * instrument_i`; the
/// regressors are the structural ones unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegression {
    /// Position of the gamma vector in the grid.
    pub index: usize,
    pub gamma: GammaVector,
    pub dependent: String,
    /// `(instrument, gamma_i)` terms subtracted from the dependent variable.
    pub offsets: Vec<(String, f64)>,
    /// Exogenous terms (intercept first when present).
    pub exogenous: Vec<String>,
    pub endogenous: Vec<String>,
    /// 2SLS instrument set: exogenous terms then excluded instruments.
    pub instruments: Vec<String>,
}

impl CandidateRegression {
    pub fn coefficient_names(&self) -> Vec<String> {
        self.exogenous
            .iter()
            .chain(self.endogenous.iter())
            .cloned()
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.exogenous.len() + self.endogenous.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// 2SLS output for a single candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationResult {
    pub names: Vec<String>,
    pub estimates: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub intervals: Vec<ConfidenceInterval>,
    pub n_obs: usize,
    /// Residual degrees of freedom (`n - k`).
    pub dof: usize,
    pub sigma2: f64,
}

impl EstimationResult {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn estimate(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.estimates[i])
    }

    pub fn interval(&self, name: &str) -> Option<ConfidenceInterval> {
        self.position(name).map(|i| self.intervals[i])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientBounds {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

/// Union of confidence intervals, ordered as exogenous then endogenous terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionBounds {
    pub entries: Vec<CoefficientBounds>,
}

impl UnionBounds {
    pub fn from_result(result: &EstimationResult) -> Self {
        let entries = result
            .names
            .iter()
            .zip(result.intervals.iter())
            .map(|(name, ci)| CoefficientBounds {
                name: name.clone(),
                lower: ci.lower,
                upper: ci.upper,
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&CoefficientBounds> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoefficientBounds> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Covariance estimator used for every candidate of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum VarianceKind {
    /// Homoskedastic 2SLS covariance `σ² (X̂'X̂)⁻¹`.
    #[default]
    Classical,
    /// Heteroskedasticity-robust sandwich with the `n / (n - k)` correction.
    Hc1,
}

/// Reference distribution for the interval half-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuantileKind {
    /// Student-t with `n - k` degrees of freedom.
    #[default]
    StudentT,
    Normal,
}

/// What to do when a single candidate fails to estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failed candidate.
    #[default]
    Abort,
    /// Log and drop failed candidates.
    ///
    /// The union then covers only the surviving grid points, so it is no longer
    /// guaranteed to be at least as wide as the union over the full grid.
    SkipAndWarn,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorOptions {
    /// Two-sided coverage, `1 - α`.
    pub confidence_level: f64,
    pub variance: VarianceKind,
    pub quantile: QuantileKind,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            variance: VarianceKind::Classical,
            quantile: QuantileKind::StudentT,
        }
    }
}

impl EstimatorOptions {
    pub fn validate(&self) -> UciResult<()> {
        let level = self.confidence_level;
        if !(level.is_finite() && level > 0.0 && level < 1.0) {
            return Err(UciError::config(format!(
                "Confidence level must lie strictly between 0 and 1 (got {level})."
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UciOptions {
    /// Points per dimension of the gamma grid.
    pub grid_size: usize,
    pub estimator: EstimatorOptions,
    pub failure_policy: FailurePolicy,
    /// Estimate candidates on the rayon pool.
    pub parallel: bool,
    /// Upper limit on `grid_size^dims`; larger grids are rejected.
    pub max_grid_points: usize,
}

impl Default for UciOptions {
    fn default() -> Self {
        Self {
            grid_size: 2,
            estimator: EstimatorOptions::default(),
            failure_policy: FailurePolicy::Abort,
            parallel: true,
            max_grid_points: crate::fit::DEFAULT_MAX_GRID_POINTS,
        }
    }
}

/// Full run configuration, as loaded from `--config` JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: ModelSpecification,
    pub instruments: InstrumentSpecification,
    pub bounds: SupportBounds,
    #[serde(default)]
    pub options: UciOptions,
}
