//! Gamma grid generation.
//!
//! The direct effects are unknown but bounded, so the bounds are covered by a
//! deterministic grid: `grid_size` equally spaced points per dimension and the
//! Cartesian product across dimensions.
//!
//! Ordering is lexicographic over per-dimension indices with the first
//! dimension varying slowest, so the same inputs always give the same grid.

use crate::domain::{GammaVector, SupportBounds};
use crate::error::{UciError, UciResult};

/// Generate `steps` equally spaced points between `min` and `max` (inclusive).
///
/// A single step yields `[min]`.
pub fn linear_space(min: f64, max: f64, steps: usize) -> UciResult<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min <= max) {
        return Err(UciError::config(format!(
            "Invalid grid range: min={min}, max={max} (must be finite and min<=max)."
        )));
    }
    if steps < 1 {
        return Err(UciError::config("Grid size must be >= 1."));
    }
    if steps == 1 {
        return Ok(vec![min]);
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out = Vec::with_capacity(steps);
    for i in 0..steps - 1 {
        out.push(min + step * i as f64);
    }
    // Pin the last point so the upper bound is hit exactly.
    out.push(max);
    Ok(out)
}

/// Default ceiling on the number of gamma vectors in one run.
pub const DEFAULT_MAX_GRID_POINTS: usize = 1_000_000;

/// Number of points in a `grid_size^dims` grid, checked against `max_points`.
pub fn grid_point_count(dims: usize, grid_size: usize, max_points: usize) -> UciResult<usize> {
    let total = u32::try_from(dims)
        .ok()
        .and_then(|d| grid_size.checked_pow(d));
    match total {
        Some(total) if total <= max_points => Ok(total),
        _ => Err(UciError::config(format!(
            "Grid of {grid_size}^{dims} points exceeds the limit of {max_points}; \
             lower the grid size or raise max_grid_points."
        ))),
    }
}

/// Cartesian grid of gamma vectors over `bounds`, at most `max_points` long.
///
/// Zero dimensions yield one empty gamma vector.
pub fn gamma_grid(
    bounds: &SupportBounds,
    grid_size: usize,
    max_points: usize,
) -> UciResult<Vec<GammaVector>> {
    bounds.validate()?;
    if grid_size < 1 {
        return Err(UciError::config("Grid size must be >= 1."));
    }
    // Size check first: nothing is allocated for an oversized request.
    let total = grid_point_count(bounds.dims(), grid_size, max_points)?;

    let axes = bounds
        .gmin
        .iter()
        .zip(bounds.gmax.iter())
        .map(|(&lo, &hi)| linear_space(lo, hi, grid_size))
        .collect::<UciResult<Vec<_>>>()?;

    let mut out = Vec::with_capacity(total);
    let mut idx = vec![0usize; axes.len()];
    for _ in 0..total {
        out.push(idx.iter().zip(axes.iter()).map(|(&i, axis)| axis[i]).collect());

        // Odometer increment, last dimension fastest.
        for pos in (0..idx.len()).rev() {
            idx[pos] += 1;
            if idx[pos] < grid_size {
                break;
            }
            idx[pos] = 0;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(gmin: &[f64], gmax: &[f64]) -> SupportBounds {
        SupportBounds::new(gmin.to_vec(), gmax.to_vec())
    }

    #[test]
    fn linear_space_includes_endpoints() {
        let v = linear_space(-1.0, 1.0, 5).unwrap();
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], -1.0);
        assert!((v[2]).abs() < 1e-12);
        assert_eq!(v[4], 1.0);
    }

    #[test]
    fn single_point_is_gmin() {
        assert_eq!(linear_space(0.25, 3.0, 1).unwrap(), vec![0.25]);
    }

    #[test]
    fn two_point_grid_is_the_endpoints() {
        let grid = gamma_grid(&bounds(&[-1.0], &[1.0]), 2, DEFAULT_MAX_GRID_POINTS).unwrap();
        assert_eq!(grid, vec![vec![-1.0], vec![1.0]]);
    }

    #[test]
    fn degenerate_support_collapses() {
        for n in 1..5 {
            let grid = gamma_grid(&bounds(&[0.0], &[0.0]), n, DEFAULT_MAX_GRID_POINTS).unwrap();
            assert_eq!(grid.len(), n);
            assert!(grid.iter().all(|g| g == &vec![0.0]));
        }
    }

    #[test]
    fn cartesian_product_order_is_stable() {
        let grid = gamma_grid(&bounds(&[0.0, 10.0], &[1.0, 20.0]), 2, DEFAULT_MAX_GRID_POINTS).unwrap();
        assert_eq!(
            grid,
            vec![
                vec![0.0, 10.0],
                vec![0.0, 20.0],
                vec![1.0, 10.0],
                vec![1.0, 20.0],
            ]
        );
    }

    #[test]
    fn grid_has_size_pow_dims() {
        let grid = gamma_grid(&bounds(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]), 3, DEFAULT_MAX_GRID_POINTS).unwrap();
        assert_eq!(grid.len(), 27);
        assert!(grid.iter().all(|g| g.len() == 3));
    }

    #[test]
    fn zero_dimensions_yield_one_empty_point() {
        let grid = gamma_grid(&bounds(&[], &[]), 4, DEFAULT_MAX_GRID_POINTS).unwrap();
        assert_eq!(grid, vec![Vec::<f64>::new()]);
    }

    #[test]
    fn rejects_mismatched_lengths_and_zero_size() {
        assert!(matches!(
            gamma_grid(&bounds(&[0.0], &[1.0, 2.0]), 2, DEFAULT_MAX_GRID_POINTS),
            Err(UciError::Config(_))
        ));
        assert!(matches!(
            gamma_grid(&bounds(&[0.0], &[1.0]), 0, DEFAULT_MAX_GRID_POINTS),
            Err(UciError::Config(_))
        ));
    }

    #[test]
    fn oversized_grid_is_rejected_before_allocation() {
        let b = bounds(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        let err = gamma_grid(&b, 100_000, DEFAULT_MAX_GRID_POINTS).unwrap_err();
        assert!(matches!(err, UciError::Config(ref m) if m.contains("limit")), "{err}");

        assert_eq!(gamma_grid(&b, 3, 27).unwrap().len(), 27);
        assert!(gamma_grid(&b, 3, 26).is_err());
    }

    #[test]
    fn point_count_overflow_is_a_config_error() {
        assert_eq!(grid_point_count(0, 50, 1).unwrap(), 1);
        assert!(matches!(
            grid_point_count(64, usize::MAX, usize::MAX),
            Err(UciError::Config(_))
        ));
    }
}
