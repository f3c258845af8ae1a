//! Domain types for dvv-io.

use ndarray::{Array2, ArrayView2};

use crate::IoError;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Label of one epoch (one row of a correlation matrix).
///
/// Wraps the non-empty string from the first CSV column, typically a date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EpochLabel(String);

impl EpochLabel {
    /// Create a new epoch label from a non-empty string.
    pub(crate) fn new(label: String) -> Self {
        debug_assert!(!label.is_empty(), "epoch label must not be empty");
        Self(label)
    }

    /// Return the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EpochLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty() || !name.chars().all(is_name_char) {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that an artifact label is usable inside a file name.
pub(crate) fn validate_label(label: &str) -> Result<(), IoError> {
    if label.is_empty() || !label.chars().all(is_name_char) {
        return Err(IoError::InvalidLabel {
            label: label.to_string(),
        });
    }
    Ok(())
}

/// A correlation matrix with one labelled row per epoch.
///
/// Produced by [`CorrelationMatrixReader`](crate::CorrelationMatrixReader).
/// `epochs[i]` labels `matrix.row(i)`. Missing correlations are `NaN`.
#[derive(Debug)]
pub struct CorrelationDataset {
    /// Epoch labels in file order.
    pub epochs: Vec<EpochLabel>,
    /// Correlation functions, shape `[n_epochs, n_lag]`.
    pub matrix: Array2<f64>,
}

impl CorrelationDataset {
    /// Return the number of epochs.
    #[must_use]
    pub fn n_epochs(&self) -> usize {
        self.matrix.nrows()
    }

    /// Return the number of lag samples per epoch.
    #[must_use]
    pub fn n_lag(&self) -> usize {
        self.matrix.ncols()
    }

    /// Return a view of the correlation matrix.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }
}
