//! Synthetic IV datasets with a known direct effect of the instruments.
//!
//! The data-generating process is:
//!
//! ```text
//! z_j, w, v, e ~ N(0, 1)                       (independent)
//! u   = ρ v + sqrt(1 - ρ²) e                   (structural error)
//! d   = π Σ z_j + 0.5 w + v                    (endogenous through v)
//! y   = β0 + β_w w + β_d d + Σ γ_j z_j + u
//! ```
//!
//! With `γ = 0` the exclusion restriction holds and plain 2SLS is consistent
//! for `β_d`; non-zero `γ` is the violation the UCI bounds are meant to cover.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::DataFrame;
use crate::error::{UciError, UciResult};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub n_obs: usize,
    pub seed: u64,
    pub intercept: f64,
    pub beta_exog: f64,
    pub beta_endog: f64,
    /// First-stage coefficient on each instrument.
    pub first_stage: f64,
    /// Correlation between the first-stage and structural errors.
    pub endogeneity: f64,
    /// True direct effect of each instrument; its length sets the instrument count.
    pub gamma: Vec<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_obs: 500,
            seed: 42,
            intercept: 1.0,
            beta_exog: 0.5,
            beta_endog: 2.0,
            first_stage: 1.0,
            endogeneity: 0.5,
            gamma: vec![0.0],
        }
    }
}

impl SimulationConfig {
    pub fn instrument_names(&self) -> Vec<String> {
        (1..=self.gamma.len()).map(|j| format!("z{j}")).collect()
    }
}

/// Generate columns `y`, `w`, `d`, `z1..zm`.
pub fn simulate_iv(config: &SimulationConfig) -> UciResult<DataFrame> {
    if config.n_obs == 0 {
        return Err(UciError::config("Sample size must be > 0."));
    }
    if config.gamma.is_empty() {
        return Err(UciError::config("At least one instrument is required."));
    }
    let rho = config.endogeneity;
    if !(rho.is_finite() && (-1.0..=1.0).contains(&rho)) {
        return Err(UciError::config(format!(
            "Endogeneity must be a correlation in [-1, 1] (got {rho})."
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| UciError::config(format!("Noise distribution error: {e}")))?;

    let m = config.gamma.len();
    let n = config.n_obs;
    let mut z: Vec<Vec<f64>> = vec![Vec::with_capacity(n); m];
    let mut w = Vec::with_capacity(n);
    let mut d = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let resid_scale = (1.0 - rho * rho).max(0.0).sqrt();

    for _ in 0..n {
        let zi: Vec<f64> = (0..m).map(|_| normal.sample(&mut rng)).collect();
        let wi = normal.sample(&mut rng);
        let vi = normal.sample(&mut rng);
        let ei = normal.sample(&mut rng);
        let ui = rho * vi + resid_scale * ei;

        let di = config.first_stage * zi.iter().sum::<f64>() + 0.5 * wi + vi;
        let direct: f64 = zi.iter().zip(config.gamma.iter()).map(|(a, g)| a * g).sum();
        let yi = config.intercept + config.beta_exog * wi + config.beta_endog * di + direct + ui;

        for (col, v) in z.iter_mut().zip(zi) {
            col.push(v);
        }
        w.push(wi);
        d.push(di);
        y.push(yi);
    }

    let mut frame = DataFrame::from_columns([("y", y), ("w", w), ("d", d)])?;
    for (name, col) in config.instrument_names().into_iter().zip(z) {
        frame.push_column(name, col)?;
    }
    Ok(frame)
}
