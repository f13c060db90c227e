//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model and instrument specifications (`ModelSpecification`, `InstrumentSpecification`)
//! - the support of the direct effects (`SupportBounds`) and grid points (`GammaVector`)
//! - per-candidate regressions and their results (`CandidateRegression`, `EstimationResult`)
//! - the final output (`UnionBounds`) and run options

pub mod types;

pub use types::*;
