//! Named numeric columns.
//!
//! The estimator only needs column lookup by name and a common row count, so
//! that capability is expressed as the [`Dataset`] trait. [`DataFrame`] is the
//! in-memory implementation used by the CLI and the tests.

use std::collections::HashMap;

use crate::error::{UciError, UciResult};

/// Read-only tabular data with named `f64` columns of equal length.
pub trait Dataset: Sync {
    fn n_rows(&self) -> usize;

    fn column(&self, name: &str) -> Option<&[f64]>;

    fn column_names(&self) -> Vec<&str>;

    fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Insertion-ordered collection of equally sized columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, values)` pairs.
    pub fn from_columns<I, S>(columns: I) -> UciResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> UciResult<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(UciError::config(format!("Duplicate column `{name}`.")));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != values.len() {
                return Err(UciError::config(format!(
                    "Column `{name}` has {} rows but the frame has {}.",
                    values.len(),
                    first.len()
                )));
            }
        }
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> UciResult<Self> {
        self.push_column(name, values)?;
        Ok(self)
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    /// Values of one row in column order (used by CSV export).
    pub fn row(&self, i: usize) -> Option<Vec<f64>> {
        if i >= self.n_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| c[i]).collect())
    }
}

impl Dataset for DataFrame {
    fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    fn column_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }
}
