//! JSON result writer for stretch, shift, and multi-reference estimates.

use std::fs;
use std::path::{Path, PathBuf};

use dvv_stretch::{EstimationResult, ReconciledResult};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{EpochLabel, ExperimentName, validate_label};

/// Writes estimation results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_{label}_stretch.json`,
/// `{experiment}_{label}_shift.json`, and `{experiment}_{label}_multiref.json`,
/// where `label` identifies the input (usually the CSV file stem).
///
/// Missing values (NaN correlations or factors) are written as `null`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the path an artifact with this label and suffix is written to.
    #[must_use]
    pub fn artifact_path(&self, label: &str, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{label}_{suffix}.json", self.experiment.as_str()))
    }

    /// Write a single-reference estimate to `{experiment}_{label}_{kind}.json`.
    ///
    /// The suffix is `stretch` or `shift` depending on
    /// [`EstimationResult::kind`]. Returns the path written.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::InvalidLabel`] | `label` is not usable in a file name |
    /// | [`IoError::EpochCountMismatch`] | `epochs.len()` differs from the result's epoch count |
    /// | [`IoError::Serialize`] | JSON serialization failed |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip(self, epochs, result), fields(kind = result.kind.as_str()))]
    pub fn write_estimate(
        &self,
        label: &str,
        epochs: &[EpochLabel],
        result: &EstimationResult,
    ) -> Result<PathBuf, IoError> {
        validate_label(label)?;
        let path = self.artifact_path(label, result.kind.as_str());
        let artifact = self.estimate_artifact(label, epochs, result)?;
        write_json(&path, &artifact)?;
        info!(path = %path.display(), "estimate written");
        Ok(path)
    }

    /// Write a reconciled multi-reference estimate to `{experiment}_{label}_multiref.json`.
    ///
    /// Adds the solved per-reference `offsets` to the single-reference layout.
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::InvalidLabel`] | `label` is not usable in a file name |
    /// | [`IoError::EpochCountMismatch`] | `epochs.len()` differs from the result's epoch count |
    /// | [`IoError::Serialize`] | JSON serialization failed |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip(self, epochs, reconciled), fields(n_refs = reconciled.offsets.len()))]
    pub fn write_multiref(
        &self,
        label: &str,
        epochs: &[EpochLabel],
        reconciled: &ReconciledResult,
    ) -> Result<PathBuf, IoError> {
        validate_label(label)?;
        let path = self.artifact_path(label, "multiref");
        let artifact = MultiRefArtifact {
            estimate: self.estimate_artifact(label, epochs, &reconciled.result)?,
            n_references: reconciled.offsets.len(),
            offsets: reconciled.offsets.to_vec(),
        };
        write_json(&path, &artifact)?;
        info!(path = %path.display(), "multi-reference estimate written");
        Ok(path)
    }

    fn estimate_artifact<'a>(
        &'a self,
        label: &'a str,
        epochs: &'a [EpochLabel],
        result: &EstimationResult,
    ) -> Result<EstimateArtifact<'a>, IoError> {
        if epochs.len() != result.n_epochs() {
            return Err(IoError::EpochCountMismatch {
                n_labels: epochs.len(),
                n_epochs: result.n_epochs(),
            });
        }
        let windows = (0..result.n_windows())
            .map(|w| WindowEntry {
                window: w,
                corr: result.corr_in(w).to_vec(),
                factor: result.factor_in(w).to_vec(),
            })
            .collect();
        Ok(EstimateArtifact {
            experiment: self.experiment.as_str(),
            label,
            kind: result.kind.as_str(),
            n_epochs: result.n_epochs(),
            n_windows: result.n_windows(),
            epochs: epochs.iter().map(EpochLabel::as_str).collect(),
            factors: result.factors.to_vec(),
            windows,
        })
    }
}

fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, &json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EstimateArtifact<'a> {
    experiment: &'a str,
    label: &'a str,
    kind: &'static str,
    n_epochs: usize,
    n_windows: usize,
    epochs: Vec<&'a str>,
    factors: Vec<f64>,
    windows: Vec<WindowEntry>,
}

#[derive(Serialize)]
struct WindowEntry {
    window: usize,
    corr: Vec<f64>,
    factor: Vec<f64>,
}

#[derive(Serialize)]
struct MultiRefArtifact<'a> {
    #[serde(flatten)]
    estimate: EstimateArtifact<'a>,
    n_references: usize,
    offsets: Vec<f64>,
}
