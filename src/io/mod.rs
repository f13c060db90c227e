//! Input/output helpers.
//!
//! - CSV ingest + synthetic data writer (`ingest`)
//! - bounds exports (CSV/JSON) and run config loading (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
