//! Mathematical utilities: least squares and distribution quantiles.

pub mod ols;
pub mod quantile;

pub use ols::*;
pub use quantile::*;
