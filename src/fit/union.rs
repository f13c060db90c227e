//! Union of confidence intervals across candidates.
//!
//! For each coefficient: `lower = min` of candidate lower bounds and
//! `upper = max` of candidate upper bounds. Both are commutative and
//! associative, so the result does not depend on candidate order, and adding
//! candidates can only widen (or keep) each interval.

use crate::domain::{EstimationResult, UnionBounds};
use crate::error::{UciError, UciResult};

/// Fold candidate interval sets into their union.
///
/// Every set must list the same coefficients in the same order.
pub fn union_bounds<'a, I>(results: I) -> UciResult<UnionBounds>
where
    I: IntoIterator<Item = &'a EstimationResult>,
{
    let mut iter = results.into_iter();
    let first = iter.next().ok_or(UciError::EmptyGrid)?;
    let mut acc = UnionBounds::from_result(first);

    for (offset, result) in iter.enumerate() {
        let next = UnionBounds::from_result(result);
        acc = merge(&acc, &next).map_err(|_| UciError::InconsistentCoefficientSet {
            index: offset + 1,
        })?;
    }
    Ok(acc)
}

/// Union of two partial unions.
///
/// Fails with `InconsistentCoefficientSet { index: 1 }` when the coefficient
/// names differ.
pub fn merge(a: &UnionBounds, b: &UnionBounds) -> UciResult<UnionBounds> {
    if !a.names().eq(b.names()) {
        return Err(UciError::InconsistentCoefficientSet { index: 1 });
    }
    let entries = a
        .entries
        .iter()
        .zip(b.entries.iter())
        .map(|(x, y)| {
            let mut out = x.clone();
            out.lower = x.lower.min(y.lower);
            out.upper = x.upper.max(y.upper);
            out
        })
        .collect();
    Ok(UnionBounds { entries })
}
