//! Export union bounds to CSV / JSON.
//!
//! The CSV is meant to be easy to consume in spreadsheets; the JSON keeps the
//! run settings next to the bounds so results can be reproduced.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::pipeline::UciRun;
use crate::domain::{RunConfig, UnionBounds};
use crate::error::AppError;

/// JSON export schema.
#[derive(Debug, Serialize)]
pub struct BoundsFile<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub config: &'a RunConfig,
    pub grid_points: usize,
    pub skipped: usize,
    pub bounds: &'a UnionBounds,
}

/// Write bounds as `coefficient,lower,upper` rows.
pub fn write_bounds_csv(path: &Path, bounds: &UnionBounds) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "coefficient,lower,upper")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;
    for b in bounds.iter() {
        writeln!(file, "{},{:.10},{:.10}", b.name, b.lower, b.upper)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}

/// Write bounds plus run settings as pretty JSON.
pub fn write_bounds_json(path: &Path, run: &UciRun, config: &RunConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display())))?;

    let out = BoundsFile {
        tool: "uci",
        generated_at: Utc::now(),
        config,
        grid_points: run.grid_len,
        skipped: run.skipped.len(),
        bounds: &run.bounds,
    };
    serde_json::to_writer_pretty(file, &out)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON: {e}")))?;
    Ok(())
}

/// Read a JSON run configuration.
pub fn read_run_config(path: &Path) -> Result<RunConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid config JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CoefficientBounds, InstrumentSpecification, ModelSpecification, SupportBounds, UciOptions};

    fn bounds() -> UnionBounds {
        UnionBounds {
            entries: vec![CoefficientBounds {
                name: "d".into(),
                lower: 1.5,
                upper: 2.5,
            }],
        }
    }

    #[test]
    fn csv_and_json_exports_are_written() {
        let dir = std::env::temp_dir().join(format!("uci-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv_path = dir.join("bounds.csv");
        write_bounds_csv(&csv_path, &bounds()).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(text.lines().next(), Some("coefficient,lower,upper"));
        assert!(text.contains("d,1.5000000000,2.5000000000"));

        let config = RunConfig {
            model: ModelSpecification::new("y", Vec::<String>::new(), ["d"]),
            instruments: InstrumentSpecification::new(["d"], ["z1"]),
            bounds: SupportBounds::new(vec![-0.1], vec![0.1]),
            options: UciOptions::default(),
        };
        let run = UciRun {
            bounds: bounds(),
            grid_len: 2,
            candidates: Vec::new(),
            skipped: Vec::new(),
        };
        let json_path = dir.join("bounds.json");
        write_bounds_json(&json_path, &run, &config).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["tool"], "uci");
        assert_eq!(value["grid_points"], 2);
        assert_eq!(value["bounds"]["entries"][0]["name"], "d");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
