//! Critical values for two-sided confidence intervals.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::domain::QuantileKind;

/// `q(1 - α/2)` for coverage `level = 1 - α`.
///
/// Returns `None` for a level outside `(0, 1)` or a Student-t with zero degrees
/// of freedom.
pub fn critical_value(level: f64, kind: QuantileKind, dof: usize) -> Option<f64> {
    if !(level.is_finite() && level > 0.0 && level < 1.0) {
        return None;
    }
    let p = 1.0 - (1.0 - level) / 2.0;
    let q = match kind {
        QuantileKind::Normal => Normal::new(0.0, 1.0).ok()?.inverse_cdf(p),
        QuantileKind::StudentT => {
            if dof == 0 {
                return None;
            }
            StudentsT::new(0.0, 1.0, dof as f64).ok()?.inverse_cdf(p)
        }
    };
    q.is_finite().then_some(q)
}
