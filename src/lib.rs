//! `iv-uci` library crate.
//!
//! Sensitivity bounds for instrumental-variable regressions when the exclusion
//! restriction may fail by a bounded direct effect `γ` of the instruments on the
//! outcome. For every `γ` on a grid over the assumed support, the structural
//! equation is re-estimated by 2SLS; the union of the resulting confidence
//! intervals is valid for any `γ` in the support.
//!
//! ```no_run
//! use iv_uci::data::{simulate_iv, SimulationConfig};
//! use iv_uci::domain::{InstrumentSpecification, ModelSpecification};
//!
//! let data = simulate_iv(&SimulationConfig::default()).unwrap();
//! let model = ModelSpecification::new("y", ["w"], ["d"]);
//! let instruments = InstrumentSpecification::new(["d"], ["z1"]);
//! let bounds = iv_uci::uci(&model, &instruments, &[-0.1], &[0.1], 2, &data).unwrap();
//! println!("{:?}", bounds.get("d"));
//! ```
//!
//! The binary (`uci`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the estimator and aggregation are reusable from other Rust code

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;

pub use app::pipeline::{CancelToken, UciRun, uci, uci_detailed, uci_with};
pub use error::{EstimationError, UciError, UciResult};
