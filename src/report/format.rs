//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the estimation code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::UciRun;
use crate::domain::{FailurePolicy, RunConfig, UnionBounds};

/// Format the run summary followed by the bounds table.
pub fn format_run_summary(run: &UciRun, config: &RunConfig) -> String {
    let mut out = String::new();
    let model = &config.model;
    let opts = &config.options;

    out.push_str("=== uci - Union of Confidence Intervals ===\n");
    out.push_str(&format!(
        "Model: {} ~ {}\n",
        model.dependent,
        model.coefficient_names().join(" + ")
    ));
    out.push_str(&format!(
        "Instruments: {} (for {})\n",
        config.instruments.instruments.join(", "),
        config.instruments.endogenous.join(", ")
    ));
    out.push_str(&format!(
        "Support: gmin={} gmax={}\n",
        fmt_vec(&config.bounds.gmin),
        fmt_vec(&config.bounds.gmax)
    ));
    out.push_str(&format!(
        "Grid: {} point(s) ({} per dimension) | level={:.3} | variance={:?} | quantile={:?}\n",
        run.grid_len,
        opts.grid_size,
        opts.estimator.confidence_level,
        opts.estimator.variance,
        opts.estimator.quantile,
    ));
    if let Some(first) = run.candidates.first() {
        out.push_str(&format!("Observations: n={}\n", first.result.n_obs));
    }
    if !run.skipped.is_empty() || opts.failure_policy == FailurePolicy::SkipAndWarn {
        out.push_str(&format!(
            "Skipped candidates: {} (union covers surviving grid points only)\n",
            run.skipped.len()
        ));
        for s in &run.skipped {
            out.push_str(&format!("  - #{} gamma={} : {}\n", s.index, fmt_vec(&s.gamma), s.error));
        }
    }

    out.push_str("\nUnion bounds:\n");
    out.push_str(&format_bounds_table(&run.bounds));
    out
}

/// Aligned `coefficient | lower | upper` table.
pub fn format_bounds_table(bounds: &UnionBounds) -> String {
    let width = bounds
        .names()
        .map(str::len)
        .max()
        .unwrap_or(0)
        .max("coefficient".len());

    let mut out = String::new();
    out.push_str(&format!("{:<width$}  {:>14}  {:>14}\n", "coefficient", "lower", "upper"));
    for b in bounds.iter() {
        out.push_str(&format!("{:<width$}  {:>14.6}  {:>14.6}\n", b.name, b.lower, b.upper));
    }
    out
}

/// Per-candidate intervals for the named coefficients.
pub fn format_candidates(run: &UciRun, names: &[String]) -> String {
    let mut out = String::new();
    out.push_str("\nCandidate intervals:\n");
    for c in &run.candidates {
        out.push_str(&format!("#{:<4} gamma={}", c.index, fmt_vec(&c.gamma)));
        for name in names {
            if let Some(ci) = c.result.interval(name) {
                out.push_str(&format!("  {name}=[{:.4}, {:.4}]", ci.lower, ci.upper));
            }
        }
        out.push('\n');
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let items: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", items.join(", "))
}
