//! UCI estimation building blocks.
//!
//! Responsibilities:
//!
//! - generate the gamma grid over the support bounds
//! - estimate each candidate regression by 2SLS
//! - fold candidate confidence intervals into their union

pub mod estimator;
pub mod grid;
pub mod union;

pub use estimator::*;
pub use grid::*;
pub use union::*;
