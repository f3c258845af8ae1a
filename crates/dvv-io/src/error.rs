//! I/O error types for dvv-io.

use std::path::PathBuf;

/// Errors from file I/O, CSV parsing, and result serialization.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file has no lag columns or zero data rows.
    #[error("empty correlation matrix in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} (epoch {epoch}) has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Epoch label of the offending row.
        epoch: String,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell is infinite or not a float at all.
    ///
    /// `NaN` cells are accepted: they mark missing correlations.
    #[error("invalid value in {path}: row {row_index}, lag column {col_index}, raw value \"{raw}\"")]
    InvalidValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Zero-based column index (excluding the epoch column).
        col_index: usize,
        /// The raw string value that was rejected.
        raw: String,
    },

    /// Returned when an epoch row has an empty label.
    #[error("empty epoch label in {path} at row {row_index}")]
    EmptyEpochLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
    },

    /// Returned when the same epoch label appears more than once.
    #[error("duplicate epoch \"{epoch}\" in {path}: first at row {first_row}, again at row {second_row}")]
    DuplicateEpoch {
        /// Path to the CSV file.
        path: PathBuf,
        /// The duplicated label.
        epoch: String,
        /// Zero-based row index of the first occurrence.
        first_row: usize,
        /// Zero-based row index of the second occurrence.
        second_row: usize,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when an artifact label contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid artifact label \"{label}\": must match [a-zA-Z0-9_-]+")]
    InvalidLabel {
        /// The invalid label.
        label: String,
    },

    /// Returned when the epoch labels passed to the writer do not match the result rows.
    #[error("{n_labels} epoch labels for a result with {n_epochs} epochs")]
    EpochCountMismatch {
        /// Number of labels supplied.
        n_labels: usize,
        /// Number of epochs in the result.
        n_epochs: usize,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact cannot be serialized to JSON.
    #[error("cannot serialize artifact for {path}")]
    Serialize {
        /// Destination path of the artifact.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
