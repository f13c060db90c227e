//! Ordinary least squares primitives.
//!
//! Every candidate of a UCI run solves two small regression problems:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We solve through the SVD so tall design matrices (more rows than columns)
//!   are handled directly. (Nalgebra's `QR::solve` is intended for square
//!   systems and will panic for non-square matrices.)
//! - Rank is decided with the usual `max(n, k) · ε · σ_max` tolerance. A
//!   rank-deficient design is reported to the caller instead of being solved
//!   with a pseudo-inverse, so collinear regressors never produce silently
//!   arbitrary coefficients.

use nalgebra::{DMatrix, DVector};

/// Singular-value tolerance for a matrix of the given shape.
fn rank_tolerance(nrows: usize, ncols: usize, sigma_max: f64) -> f64 {
    nrows.max(ncols) as f64 * f64::EPSILON * sigma_max
}

/// Numerical rank of `x`.
pub fn numerical_rank(x: &DMatrix<f64>) -> usize {
    if x.nrows() == 0 || x.ncols() == 0 {
        return 0;
    }
    let sv = x.singular_values();
    let sigma_max = sv.max();
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return 0;
    }
    let tol = rank_tolerance(x.nrows(), x.ncols(), sigma_max);
    sv.iter().filter(|&&s| s > tol).count()
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if `x` does not have full column rank or the solution is not
/// finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return None;
    }
    let tol = rank_tolerance(x.nrows(), x.ncols(), sigma_max);
    if svd.rank(tol) < x.ncols() {
        return None;
    }

    let beta = svd.solve(y, tol).ok()?;
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}

/// `(X'X)⁻¹`, or `None` when the Gram matrix is not invertible.
pub fn gram_inverse(x: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let xtx = x.transpose() * x;
    let inv = xtx.try_inverse()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

/// Concatenate two blocks with equal row counts side by side: `[a | b]`.
pub fn hstack(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    debug_assert_eq!(a.nrows(), b.nrows());
    let n = a.nrows();
    DMatrix::from_fn(n, a.ncols() + b.ncols(), |i, j| {
        if j < a.ncols() {
            a[(i, j)]
        } else {
            b[(i, j - a.ncols())]
        }
    })
}
