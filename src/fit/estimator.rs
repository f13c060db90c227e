//! Two-stage least squares for a single candidate regression.
//!
//! Given a candidate (adjusted dependent variable, exogenous terms `W`,
//! endogenous regressors `D`, instrument set `Z = [W | excluded]`):
//!
//! 1. first stage: regress each column of `D` on `Z`, keep fitted values `D̂`
//! 2. second stage: regress `y_adj` on `X̂ = [W | D̂]`, giving `β̂`
//! 3. residuals `u = y_adj - X β̂` use the *original* `X = [W | D]`
//! 4. covariance from `X̂` and `u`:
//!    - classical: `σ̂² (X̂'X̂)⁻¹`, `σ̂² = u'u / (n - k)`
//!    - HC1: `(X̂'X̂)⁻¹ X̂' diag(u²) X̂ (X̂'X̂)⁻¹ · n / (n - k)`
//!
//! The second-stage OLS residuals (computed against `D̂`) would understate the
//! variance and are never used.

use nalgebra::{DMatrix, DVector};

use crate::data::Dataset;
use crate::domain::{
    CandidateRegression, ConfidenceInterval, EstimationResult, EstimatorOptions, INTERCEPT,
    VarianceKind,
};
use crate::error::EstimationError;
use crate::math::{critical_value, gram_inverse, hstack, numerical_rank, solve_least_squares};

/// Regression capability handed to the orchestrator.
///
/// Implementations must be pure: the same candidate, data and options always
/// give the same result.
pub trait IvEstimator: Sync {
    fn estimate(
        &self,
        candidate: &CandidateRegression,
        data: &dyn Dataset,
        opts: &EstimatorOptions,
    ) -> Result<EstimationResult, EstimationError>;
}

/// Textbook 2SLS on nalgebra matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoStageLeastSquares;

impl IvEstimator for TwoStageLeastSquares {
    fn estimate(
        &self,
        candidate: &CandidateRegression,
        data: &dyn Dataset,
        opts: &EstimatorOptions,
    ) -> Result<EstimationResult, EstimationError> {
        two_stage_least_squares(candidate, data, opts)
    }
}

pub fn two_stage_least_squares(
    candidate: &CandidateRegression,
    data: &dyn Dataset,
    opts: &EstimatorOptions,
) -> Result<EstimationResult, EstimationError> {
    let n = data.n_rows();
    let k_exog = candidate.exogenous.len();
    let k_endog = candidate.endogenous.len();
    let k = k_exog + k_endog;
    if k == 0 {
        return Err(EstimationError::EmptyDesign);
    }

    // Adjusted dependent variable: y - Σ γ_j z_j.
    let mut y = column_vector(data, &candidate.dependent, n)?;
    for (name, gamma) in &candidate.offsets {
        if *gamma != 0.0 {
            let z = column_vector(data, name, n)?;
            y.axpy(-*gamma, &z, 1.0);
        }
    }

    let w = design_matrix(data, &candidate.exogenous, n)?;
    let d = design_matrix(data, &candidate.endogenous, n)?;

    // ---- First stage: D̂ = Z (Z'Z)⁻¹ Z'D, column by column ----
    let d_hat = if k_endog == 0 {
        d.clone()
    } else {
        let z = design_matrix(data, &candidate.instruments, n)?;
        let kz = z.ncols();
        if n <= kz {
            return Err(EstimationError::InsufficientObservations {
                rows: n,
                params: kz,
            });
        }
        ensure_full_rank(&z, "first-stage")?;

        let mut fitted = DMatrix::<f64>::zeros(n, k_endog);
        for j in 0..k_endog {
            let dj: DVector<f64> = d.column(j).into_owned();
            let pi = solve_least_squares(&z, &dj).ok_or_else(|| singular(&z, "first-stage"))?;
            fitted.set_column(j, &(&z * pi));
        }
        fitted
    };

    // ---- Second stage: y_adj on X̂ = [W | D̂] ----
    if n <= k {
        return Err(EstimationError::InsufficientObservations { rows: n, params: k });
    }
    let x_hat = hstack(&w, &d_hat);
    ensure_full_rank(&x_hat, "second-stage")?;
    let beta = solve_least_squares(&x_hat, &y).ok_or_else(|| singular(&x_hat, "second-stage"))?;

    // Structural residuals against the original regressors.
    let x = hstack(&w, &d);
    let resid = &y - &x * &beta;
    let rss = resid.norm_squared();

    let bread = gram_inverse(&x_hat).ok_or_else(|| singular(&x_hat, "second-stage"))?;
    let dof = n - k;
    let sigma2 = rss / dof as f64;

    let cov = match opts.variance {
        VarianceKind::Classical => &bread * sigma2,
        VarianceKind::Hc1 => {
            let mut meat = DMatrix::<f64>::zeros(k, k);
            for i in 0..n {
                let xi = x_hat.row(i).transpose();
                meat += &xi * xi.transpose() * (resid[i] * resid[i]);
            }
            (&bread * meat * &bread) * (n as f64 / dof as f64)
        }
    };

    let q = critical_value(opts.confidence_level, opts.quantile, dof).ok_or_else(|| {
        EstimationError::Distribution(format!(
            "level={} quantile={:?} dof={dof}",
            opts.confidence_level, opts.quantile
        ))
    })?;

    let estimates: Vec<f64> = beta.iter().copied().collect();
    let std_errors: Vec<f64> = (0..k).map(|j| cov[(j, j)].max(0.0).sqrt()).collect();
    let intervals = estimates
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| ConfidenceInterval {
            lower: b - q * se,
            upper: b + q * se,
        })
        .collect();

    Ok(EstimationResult {
        names: candidate.coefficient_names(),
        estimates,
        std_errors,
        intervals,
        n_obs: n,
        dof,
        sigma2,
    })
}

fn singular(x: &DMatrix<f64>, stage: &str) -> EstimationError {
    EstimationError::SingularMatrix {
        stage: stage.to_string(),
        rank: numerical_rank(x),
        cols: x.ncols(),
    }
}

fn ensure_full_rank(x: &DMatrix<f64>, stage: &str) -> Result<(), EstimationError> {
    let rank = numerical_rank(x);
    if rank < x.ncols() {
        return Err(EstimationError::SingularMatrix {
            stage: stage.to_string(),
            rank,
            cols: x.ncols(),
        });
    }
    Ok(())
}

/// Resolve a term to a column; the intercept is a column of ones.
fn column_vector(data: &dyn Dataset, name: &str, n: usize) -> Result<DVector<f64>, EstimationError> {
    if name == INTERCEPT {
        return Ok(DVector::from_element(n, 1.0));
    }
    let values = data
        .column(name)
        .ok_or_else(|| EstimationError::MissingColumn(name.to_string()))?;
    if values.len() != n {
        return Err(EstimationError::ColumnLength {
            name: name.to_string(),
            len: values.len(),
            rows: n,
        });
    }
    if let Some(row) = values.iter().position(|v| !v.is_finite()) {
        return Err(EstimationError::NonFiniteData {
            name: name.to_string(),
            row,
        });
    }
    Ok(DVector::from_column_slice(values))
}

fn design_matrix(
    data: &dyn Dataset,
    names: &[String],
    n: usize,
) -> Result<DMatrix<f64>, EstimationError> {
    let mut out = DMatrix::<f64>::zeros(n, names.len());
    for (j, name) in names.iter().enumerate() {
        out.set_column(j, &column_vector(data, name, n)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataFrame, SimulationConfig, simulate_iv};
    use crate::domain::{InstrumentSpecification, ModelSpecification, QuantileKind};
    use crate::models::candidate_regression;

    fn candidate(gamma: f64) -> CandidateRegression {
        let model = ModelSpecification::new("y", ["w"], ["d"]);
        let inst = InstrumentSpecification::new(["d"], ["z1"]);
        candidate_regression(0, &model, &inst, &[gamma]).unwrap()
    }

    fn sample() -> DataFrame {
        simulate_iv(&SimulationConfig {
            n_obs: 400,
            ..SimulationConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn recovers_coefficients_without_noise() {
        // y = 1 + 0.5 w + 2 d exactly; d depends on z and w.
        let n = 40;
        let z: Vec<f64> = (0..n).map(|i| i as f64 / 10.0).collect();
        let w: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
        let d: Vec<f64> = z.iter().zip(&w).map(|(z, w)| 0.5 * z + 0.1 * w * w).collect();
        let y: Vec<f64> = w.iter().zip(&d).map(|(w, d)| 1.0 + 0.5 * w + 2.0 * d).collect();
        let df = DataFrame::from_columns([("y", y), ("w", w), ("d", d), ("z1", z)]).unwrap();

        let res = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap();
        assert_eq!(res.names, vec![INTERCEPT, "w", "d"]);
        assert!((res.estimates[0] - 1.0).abs() < 1e-8, "{:?}", res.estimates);
        assert!((res.estimates[1] - 0.5).abs() < 1e-8, "{:?}", res.estimates);
        assert!((res.estimates[2] - 2.0).abs() < 1e-8, "{:?}", res.estimates);
        assert_eq!(res.n_obs, n);
        assert_eq!(res.dof, n - 3);
    }

    #[test]
    fn consistent_on_simulated_endogeneity() {
        let res = two_stage_least_squares(&candidate(0.0), &sample(), &EstimatorOptions::default())
            .unwrap();
        let beta_d = res.estimate("d").unwrap();
        assert!((beta_d - 2.0).abs() < 0.3, "beta_d={beta_d}");
        let ci = res.interval("d").unwrap();
        assert!(ci.contains(beta_d));
        assert!(ci.width() < 0.5);
    }

    #[test]
    fn gamma_shifts_endogenous_coefficient() {
        let df = sample();
        let opts = EstimatorOptions::default();
        let base = two_stage_least_squares(&candidate(0.0), &df, &opts).unwrap();
        let shifted = two_stage_least_squares(&candidate(0.3), &df, &opts).unwrap();
        // Subtracting γ z lowers the reduced-form effect, hence β̂_d.
        assert!(shifted.estimate("d").unwrap() < base.estimate("d").unwrap());
    }

    #[test]
    fn variance_uses_structural_residuals() {
        let df = sample();
        let res = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap();

        // Naive second-stage OLS on fitted values gives a different σ².
        let n = df.n_rows();
        let z = DMatrix::from_fn(n, 3, |i, j| match j {
            0 => 1.0,
            1 => df.column("w").unwrap()[i],
            _ => df.column("z1").unwrap()[i],
        });
        let d = DVector::from_column_slice(df.column("d").unwrap());
        let d_hat = &z * solve_least_squares(&z, &d).unwrap();
        let x_hat = DMatrix::from_fn(n, 3, |i, j| match j {
            0 => 1.0,
            1 => df.column("w").unwrap()[i],
            _ => d_hat[i],
        });
        let y = DVector::from_column_slice(df.column("y").unwrap());
        let b = solve_least_squares(&x_hat, &y).unwrap();
        let naive_sigma2 = (&y - &x_hat * &b).norm_squared() / (n - 3) as f64;

        let x = DMatrix::from_fn(n, 3, |i, j| match j {
            0 => 1.0,
            1 => df.column("w").unwrap()[i],
            _ => d[i],
        });
        let proper_sigma2 = (&y - &x * &b).norm_squared() / (n - 3) as f64;

        assert!((res.sigma2 - proper_sigma2).abs() < 1e-9);
        assert!((res.sigma2 - naive_sigma2).abs() > 1e-3);
    }

    #[test]
    fn normal_quantile_gives_narrower_interval() {
        let df = sample();
        let t = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap();
        let z = two_stage_least_squares(
            &candidate(0.0),
            &df,
            &EstimatorOptions {
                quantile: QuantileKind::Normal,
                ..EstimatorOptions::default()
            },
        )
        .unwrap();
        assert!(z.interval("d").unwrap().width() < t.interval("d").unwrap().width());
        assert_eq!(z.estimates, t.estimates);
    }

    #[test]
    fn hc1_matches_sandwich_formula() {
        let w = vec![0.0, 1.0, 0.0, 1.0, 2.0, 1.0];
        let z = vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0];
        let d = vec![1.2, 1.9, 3.4, 3.8, 5.1, 6.9];
        let y = vec![2.0, 3.1, 4.5, 5.2, 7.9, 9.6];
        let n = y.len();

        // (X̂'X̂)⁻¹ X̂' diag(u²) X̂ (X̂'X̂)⁻¹ · n/(n−k) via the normal equations.
        let zm = DMatrix::from_fn(n, 3, |i, j| [1.0, w[i], z[i]][j]);
        let pi = (zm.transpose() * &zm).try_inverse().unwrap()
            * zm.transpose()
            * DVector::from_column_slice(&d);
        let d_hat = &zm * pi;
        let x_hat = DMatrix::from_fn(n, 3, |i, j| [1.0, w[i], d_hat[i]][j]);
        let x = DMatrix::from_fn(n, 3, |i, j| [1.0, w[i], d[i]][j]);
        let yv = DVector::from_column_slice(&y);
        let bread = (x_hat.transpose() * &x_hat).try_inverse().unwrap();
        let beta = &bread * x_hat.transpose() * &yv;
        let u = &yv - &x * &beta;
        let meat = x_hat.transpose() * DMatrix::from_diagonal(&u.component_mul(&u)) * &x_hat;
        let cov = &bread * meat * &bread * (n as f64 / (n - 3) as f64);

        let df = DataFrame::from_columns([("y", y), ("w", w), ("d", d), ("z1", z)]).unwrap();
        let res = two_stage_least_squares(
            &candidate(0.0),
            &df,
            &EstimatorOptions {
                variance: VarianceKind::Hc1,
                ..EstimatorOptions::default()
            },
        )
        .unwrap();

        for j in 0..3 {
            let se = cov[(j, j)].sqrt();
            assert!((res.estimates[j] - beta[j]).abs() < 1e-8, "{:?} vs {beta}", res.estimates);
            assert!(
                (res.std_errors[j] - se).abs() < 1e-8 * se.max(1.0),
                "coef {j}: {} vs {se}",
                res.std_errors[j]
            );
        }
    }

    #[test]
    fn collinear_instrument_is_singular() {
        let n = 20;
        let w: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let z = w.iter().map(|v| 2.0 * v).collect();
        let d = w.iter().map(|v| v * v).collect();
        let y = w.iter().map(|v| v + 1.0).collect();
        let df = DataFrame::from_columns([("y", y), ("w", w), ("d", d), ("z1", z)]).unwrap();

        let err = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap_err();
        assert!(
            matches!(err, EstimationError::SingularMatrix { ref stage, .. } if stage == "first-stage"),
            "{err}"
        );
    }

    #[test]
    fn constant_endogenous_regressor_is_singular_in_second_stage() {
        // Instruments are fine, but D̂ = 0 leaves X̂ without full column rank.
        let n = 20;
        let w: Vec<f64> = (0..n).map(|i| (i % 4) as f64).collect();
        let z: Vec<f64> = (0..n).map(|i| (i * i % 7) as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        let df = DataFrame::from_columns([("y", y), ("w", w), ("d", vec![0.0; n]), ("z1", z)])
            .unwrap();

        let err = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap_err();
        assert!(
            matches!(err, EstimationError::SingularMatrix { ref stage, .. } if stage == "second-stage"),
            "{err}"
        );
    }

    /// Dataset whose `y` column is longer than the others.
    struct Ragged {
        long: Vec<f64>,
        short: Vec<f64>,
    }

    impl Dataset for Ragged {
        fn n_rows(&self) -> usize {
            self.long.len()
        }

        fn column(&self, name: &str) -> Option<&[f64]> {
            match name {
                "y" => Some(self.long.as_slice()),
                "w" | "d" | "z1" => Some(self.short.as_slice()),
                _ => None,
            }
        }

        fn column_names(&self) -> Vec<&str> {
            vec!["y", "w", "d", "z1"]
        }
    }

    #[test]
    fn short_column_is_an_error() {
        let data = Ragged {
            long: (0..50).map(|i| i as f64).collect(),
            short: (0..40).map(|i| (i % 9) as f64).collect(),
        };
        let err = two_stage_least_squares(&candidate(0.2), &data, &EstimatorOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            EstimationError::ColumnLength {
                name: "z1".into(),
                len: 40,
                rows: 50
            }
        );
    }

    #[test]
    fn too_few_rows() {
        let df = DataFrame::from_columns([
            ("y", vec![1.0, 2.0, 3.0]),
            ("w", vec![0.0, 1.0, 0.0]),
            ("d", vec![1.0, 0.0, 2.0]),
            ("z1", vec![3.0, 1.0, 2.0]),
        ])
        .unwrap();
        let err = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            EstimationError::InsufficientObservations { rows: 3, params: 3 }
        );
    }

    #[test]
    fn missing_and_non_finite_columns() {
        let df = DataFrame::from_columns([("y", vec![1.0; 10]), ("w", vec![0.0; 10])]).unwrap();
        let err = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap_err();
        assert_eq!(err, EstimationError::MissingColumn("d".into()));

        let mut y = vec![1.0; 10];
        y[4] = f64::NAN;
        let df = DataFrame::from_columns([("y", y)]).unwrap();
        let err = two_stage_least_squares(&candidate(0.0), &df, &EstimatorOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            EstimationError::NonFiniteData {
                name: "y".into(),
                row: 4
            }
        );
    }
}
