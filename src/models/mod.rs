//! Candidate regression construction.
//!
//! Implemented as small, pure functions so the estimation code can stay generic.

pub mod transform;

pub use transform::*;
