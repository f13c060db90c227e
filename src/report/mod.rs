//! Reporting utilities: run summaries and bounds tables.

pub mod format;

pub use format::*;
