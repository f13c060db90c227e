//! Turn a base specification plus one gamma vector into a concrete regression.
//!
//! Under a direct effect `γ` the structural equation reads
//!
//! ```text
//! y = Xβ + Σ γ_j z_j + u
//! ```
//!
//! so for a *known* `γ` the instruments are valid again once their contribution
//! is moved to the left-hand side: regress `y - Σ γ_j z_j` on the original
//! regressors, instrumenting with the exogenous terms and the `z_j`.
//!
//! Everything here is pure: the base specifications are only borrowed, and each
//! candidate is an independent value.

use crate::domain::{
    CandidateRegression, GammaVector, InstrumentSpecification, ModelSpecification,
};
use crate::error::{UciError, UciResult};

/// Fail unless there are at least as many instruments as endogenous regressors.
pub fn check_identification(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
) -> UciResult<()> {
    let endogenous = model.endogenous.len().max(instruments.endogenous.len());
    if instruments.instruments.len() < endogenous {
        return Err(UciError::UnderidentifiedModel {
            instruments: instruments.instruments.len(),
            endogenous,
        });
    }
    Ok(())
}

/// Build the candidate regression for one grid point.
///
/// `gamma` must have one entry per excluded instrument.
pub fn candidate_regression(
    index: usize,
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
    gamma: &[f64],
) -> UciResult<CandidateRegression> {
    if gamma.len() != instruments.instruments.len() {
        return Err(UciError::config(format!(
            "Gamma vector at grid point {index} has {} entries but there are {} instruments.",
            gamma.len(),
            instruments.instruments.len()
        )));
    }

    let exogenous = model.exogenous_terms();
    let offsets = instruments
        .instruments
        .iter()
        .cloned()
        .zip(gamma.iter().copied())
        .collect();
    let instrument_set = exogenous
        .iter()
        .chain(instruments.instruments.iter())
        .cloned()
        .collect();

    Ok(CandidateRegression {
        index,
        gamma: gamma.to_vec(),
        dependent: model.dependent.clone(),
        offsets,
        exogenous,
        endogenous: model.endogenous.clone(),
        instruments: instrument_set,
    })
}

/// One candidate per grid point, in grid order.
///
/// Identification is checked once, before any candidate is built.
pub fn candidate_regressions(
    model: &ModelSpecification,
    instruments: &InstrumentSpecification,
    grid: &[GammaVector],
) -> UciResult<Vec<CandidateRegression>> {
    check_identification(model, instruments)?;
    grid.iter()
        .enumerate()
        .map(|(index, gamma)| candidate_regression(index, model, instruments, gamma))
        .collect()
}
