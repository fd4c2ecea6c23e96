//! Dataset loading.

use std::path::Path;

use crate::error::{LgpError, Result};
use crate::value::Numeric;

/// One row: feature vector loaded into Input registers, and the target
/// value(s) a program's output registers are scored against.
#[derive(Debug, Clone)]
pub struct FitnessCase<V> {
    pub features: Vec<V>,
    pub targets: Vec<V>,
}

/// An in-memory collection of fitness cases, all sharing one feature/target
/// shape.
#[derive(Debug, Clone, Default)]
pub struct Dataset<V> {
    cases: Vec<FitnessCase<V>>,
}

impl<V: Numeric> Dataset<V> {
    pub fn new(cases: Vec<FitnessCase<V>>) -> Self {
        Self { cases }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn cases(&self) -> &[FitnessCase<V>] {
        &self.cases
    }

    pub fn n_features(&self) -> usize {
        self.cases.first().map_or(0, |c| c.features.len())
    }

    pub fn n_targets(&self) -> usize {
        self.cases.first().map_or(0, |c| c.targets.len())
    }
}

/// Load a CSV file where the trailing `n_targets` columns are the target(s)
/// and everything before them is the feature vector. Every row must parse to
/// `V`, match the first row's column count, and carry exactly `n_input`
/// feature columns (the configured register layout, not just internal
/// row-to-row consistency) — a mismatch against either fails fast at load
/// time with `Configuration`/`RowShape`, rather than being deferred to the
/// first call to `RegisterFile::load_row` during evaluation.
pub fn load_csv(path: impl AsRef<Path>, n_targets: usize, n_input: usize) -> Result<Dataset<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_ref())
        .map_err(|e| LgpError::Configuration(format!("failed to open dataset: {e}")))?;

    let mut cases = Vec::new();
    let mut expected_cols: Option<usize> = None;

    for record in reader.records() {
        let record = record.map_err(|e| LgpError::Configuration(format!("malformed CSV row: {e}")))?;
        let cols = record.len();
        if n_targets >= cols {
            return Err(LgpError::Configuration(format!(
                "targetColumns ({n_targets}) must be fewer than the row's column count ({cols})"
            )));
        }
        match expected_cols {
            None => expected_cols = Some(cols),
            Some(expected) if expected != cols => {
                return Err(LgpError::RowShape {
                    expected,
                    actual: cols,
                })
            }
            _ => {}
        }

        let values: std::result::Result<Vec<f64>, _> =
            record.iter().map(|field| field.trim().parse::<f64>()).collect();
        let values = values.map_err(|e| {
            LgpError::Configuration(format!("non-numeric field in dataset row: {e}"))
        })?;

        let split = cols - n_targets;
        if split != n_input {
            return Err(LgpError::RowShape {
                expected: n_input,
                actual: split,
            });
        }
        cases.push(FitnessCase {
            features: values[..split].to_vec(),
            targets: values[split..].to_vec(),
        });
    }

    Ok(Dataset::new(cases))
}
