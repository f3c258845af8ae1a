//! CSV correlation-matrix reader with full input validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{CorrelationDataset, EpochLabel};

/// Reads a correlation matrix from a CSV file.
///
/// Expected CSV format:
/// - Header row required (first column is the epoch label, remaining are lag samples)
/// - `epoch,lag_0,lag_1,...,lag_n`
/// - One row per epoch, all rows must have the same number of columns
/// - `NaN` (or an empty cell) marks a missing correlation and is kept as NaN
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::EmptyDataset`] | No lag columns, or zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::EmptyEpochLabel`] | First column of a row is blank |
/// | [`IoError::InvalidValue`] | Cell is infinite or unparseable |
/// | [`IoError::DuplicateEpoch`] | Same epoch label appears twice |
pub struct CorrelationMatrixReader {
    path: PathBuf,
}

impl CorrelationMatrixReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Return the path this reader was created for.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the CSV file, returning a [`CorrelationDataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<CorrelationDataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so that short rows reach the InconsistentRowLength check
        // instead of failing inside the csv crate.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;
        let expected_cols = header.len();
        if expected_cols < 2 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }
        let n_lag = expected_cols - 1;
        debug!(n_lag, "read CSV header");

        let mut epochs = Vec::new();
        let mut rows: Vec<Array1<f64>> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;

            let label = record.get(0).unwrap_or("").to_string();
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    epoch: label,
                    expected: expected_cols,
                    got: record.len(),
                });
            }
            if label.is_empty() {
                return Err(IoError::EmptyEpochLabel {
                    path: self.path.clone(),
                    row_index,
                });
            }
            if let Some(&first_row) = seen.get(&label) {
                return Err(IoError::DuplicateEpoch {
                    path: self.path.clone(),
                    epoch: label,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(label.clone(), row_index);

            let mut values = Vec::with_capacity(n_lag);
            for (col_index, raw) in record.iter().skip(1).enumerate() {
                values.push(self.parse_cell(raw, row_index, col_index)?);
            }

            epochs.push(EpochLabel::new(label));
            rows.push(Array1::from(values));
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let mut matrix = Array2::<f64>::zeros((rows.len(), n_lag));
        for (mut dst, src) in matrix.outer_iter_mut().zip(&rows) {
            dst.assign(src);
        }
        let n_missing = matrix.iter().filter(|v| v.is_nan()).count();

        info!(
            n_epochs = epochs.len(),
            n_lag,
            n_missing,
            "correlation matrix loaded"
        );

        Ok(CorrelationDataset { epochs, matrix })
    }

    fn parse_cell(&self, raw: &str, row_index: usize, col_index: usize) -> Result<f64, IoError> {
        if raw.is_empty() {
            return Ok(f64::NAN);
        }
        let invalid = || IoError::InvalidValue {
            path: self.path.clone(),
            row_index,
            col_index,
            raw: raw.to_string(),
        };
        let value: f64 = raw.parse().map_err(|_| invalid())?;
        if value.is_infinite() {
            return Err(invalid());
        }
        Ok(value)
    }
}
