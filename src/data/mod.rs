//! Data access for the estimator plus synthetic data generation.
//!
//! - `frame`: the `Dataset` capability and the in-memory `DataFrame`
//! - `simulate`: seeded synthetic IV samples for demos and tests

pub mod frame;
pub mod simulate;

pub use frame::*;
pub use simulate::*;
