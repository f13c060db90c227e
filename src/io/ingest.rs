//! CSV ingest.
//!
//! Turns a header-row CSV into a [`DataFrame`] of numeric columns.
//!
//! Design goals:
//! - **Strict**: every loaded cell must be a finite number; an empty or
//!   non-numeric cell is an error naming its line and column (no silent
//!   row dropping, which would change the sample across runs)
//! - **Selective**: only the requested columns are parsed, so unrelated text
//!   columns in the file are fine
//! - **Separation of concerns**: no estimation logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::data::{DataFrame, Dataset};
use crate::error::AppError;

/// Load `columns` (or every column when `None`) from a CSV file.
pub fn load_csv(path: &Path, columns: Option<&[String]>) -> Result<DataFrame, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_csv(file, columns)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

/// Parse CSV from any reader (used by `load_csv` and tests).
pub fn read_csv<R: std::io::Read>(reader: R, columns: Option<&[String]>) -> Result<DataFrame, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let wanted: Vec<String> = match columns {
        Some(cols) => cols.to_vec(),
        None => headers.iter().map(normalize_header_name).collect(),
    };
    let mut selected = Vec::with_capacity(wanted.len());
    for name in &wanted {
        let idx = header_map
            .get(name.as_str())
            .copied()
            .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))?;
        selected.push((name.clone(), idx));
    }

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); selected.len()];
    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header, and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(3, format!("CSV parse error on line {line}: {e}")))?;
        for ((name, col), out) in selected.iter().zip(values.iter_mut()) {
            out.push(parse_cell(&record, *col, name, line)?);
        }
    }

    let frame = DataFrame::from_columns(selected.into_iter().map(|(name, _)| name).zip(values))?;
    if frame.n_rows() == 0 {
        return Err(AppError::new(3, "CSV contains no data rows."));
    }
    Ok(frame)
}

/// Write every column of `frame` to a CSV file.
pub fn write_csv(path: &Path, frame: &DataFrame) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    writer
        .write_record(frame.column_names())
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;
    for i in 0..frame.n_rows() {
        let row = frame.row(i).unwrap_or_default();
        writer
            .write_record(row.iter().map(|v| format!("{v:.10}")))
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn parse_cell(record: &StringRecord, col: usize, name: &str, line: usize) -> Result<f64, AppError> {
    let raw = record.get(col).unwrap_or("");
    if raw.is_empty() {
        return Err(AppError::new(3, format!("Missing value for `{name}` on line {line}.")));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AppError::new(
            3,
            format!("Non-numeric value `{raw}` for `{name}` on line {line}."),
        )),
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, column lookup fails on that name.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_selected_columns() {
        let csv = "\u{feff}id,y,x\nA,1.5,2\nB,2.5,3\n";
        let cols = vec!["x".to_string(), "y".to_string()];
        let df = read_csv(csv.as_bytes(), Some(cols.as_slice())).unwrap();
        assert_eq!(df.column_names(), vec!["x", "y"]);
        assert_eq!(df.column("y"), Some(&[1.5, 2.5][..]));
    }

    #[test]
    fn missing_value_names_line_and_column() {
        let csv = "y,x\n1,2\n,3\n";
        let err = read_csv(csv.as_bytes(), None).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("`y` on line 3"), "{err}");
    }

    #[test]
    fn missing_column_is_config_error() {
        let cols = vec!["z".to_string()];
        let err = read_csv("y\n1\n".as_bytes(), Some(cols.as_slice())).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn non_numeric_cell_rejected() {
        let err = read_csv("y\nabc\n".as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("abc"));
    }
}
