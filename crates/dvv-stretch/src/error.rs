//! Error types for stretch estimation, reconciliation, and trace transforms.

/// Coarse classification of a [`StretchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input detectable before any computation.
    Configuration,
    /// The operation is not defined for the given input (e.g. reconciling one reference).
    UnsupportedOperation,
}

/// Errors from window construction, grid generation, similarity search,
/// multi-reference reconciliation, and time-axis transforms.
#[derive(Debug, thiserror::Error)]
pub enum StretchError {
    /// Returned when a correlation matrix has no rows or no columns.
    #[error("correlation matrix must be non-empty, got {n_epochs}x{n_lag}")]
    EmptyMatrix {
        /// Number of rows (epochs).
        n_epochs: usize,
        /// Number of columns (lag samples).
        n_lag: usize,
    },

    /// Returned when a trace has fewer than two samples and cannot be interpolated.
    #[error("trace must have at least 2 samples, got {len}")]
    TraceTooShort {
        /// Number of samples in the trace.
        len: usize,
    },

    /// Returned when a stretch or shift range is negative or non-finite.
    #[error("search range must be finite and non-negative, got {range}")]
    InvalidRange {
        /// The invalid range value.
        range: f64,
    },

    /// Returned when fewer than two trial factors are requested.
    #[error("need at least 2 trial steps, got {steps}")]
    InvalidStepCount {
        /// The requested step count.
        steps: usize,
    },

    /// Returned when a per-window width list disagrees with the start list.
    #[error("got {n_widths} window widths for {n_starts} window starts")]
    WidthCountMismatch {
        /// Number of window starts.
        n_starts: usize,
        /// Number of window widths.
        n_widths: usize,
    },

    /// Returned when a trace or grid does not match the matrix lag length.
    #[error("lag length mismatch: expected {expected} samples, got {got}")]
    LagLengthMismatch {
        /// Lag length of the correlation matrix.
        expected: usize,
        /// Lag length of the offending trace or grid.
        got: usize,
    },

    /// Returned when a stretch grid has a different number of rows than factors.
    #[error("stretch grid has {rows} rows but {factors} factors")]
    FactorCountMismatch {
        /// Number of grid rows.
        rows: usize,
        /// Number of factors.
        factors: usize,
    },

    /// Returned when a shift/stretch table does not have one row per trace.
    #[error("expected one value per trace ({n_traces}), got {n_values}")]
    ValueCountMismatch {
        /// Number of traces in the matrix.
        n_traces: usize,
        /// Number of value rows supplied.
        n_values: usize,
    },

    /// Returned when a shift/stretch table has no columns.
    #[error("shift/stretch table has no columns")]
    NoValueColumns,

    /// Returned when reconciliation is requested with fewer than two references.
    #[error("reconciliation requires at least 2 reference traces, got {n_ref}")]
    TooFewReferences {
        /// Number of references in the panel.
        n_ref: usize,
    },

    /// Returned when panel entries disagree on grid, window, or epoch layout.
    #[error("reference {reference} is inconsistent with reference 0: {reason}")]
    InconsistentPanel {
        /// Index of the offending reference.
        reference: usize,
        /// What differs.
        reason: &'static str,
    },

    /// Returned when reconciliation needs a similarity matrix that was not kept.
    #[error("estimate for reference {reference} carries no similarity matrix")]
    MissingSimilarity {
        /// Index of the offending reference.
        reference: usize,
    },

    /// Returned when the epoch time vector does not match the matrix rows.
    #[error("got {n_times} epoch times for {n_epochs} epochs")]
    TimeCountMismatch {
        /// Number of matrix rows.
        n_epochs: usize,
        /// Number of times supplied.
        n_times: usize,
    },

    /// Returned when a reference grouping interval is not a positive finite
    /// number, or is too fine to resolve over the time span.
    #[error("reference interval must be positive, finite, and at least 2^-52 of the time span, got {interval}")]
    InvalidInterval {
        /// The invalid interval.
        interval: f64,
    },

    /// Returned when weighted averaging is called with no curves.
    #[error("cannot average an empty set of dv/v curves")]
    NoCurves,

    /// Returned when a dv/v curve or its correlation differs in length from the first curve.
    #[error("curve {index} has {got} samples, expected {expected}")]
    CurveLengthMismatch {
        /// Position of the offending curve.
        index: usize,
        /// Length of the first curve.
        expected: usize,
        /// Length of the offending curve.
        got: usize,
    },

    /// Returned when the real FFT rejects its buffers.
    #[error("FFT processing failed")]
    Fft(#[from] realfft::FftError),
}

impl StretchError {
    /// Return the coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooFewReferences { .. } => ErrorKind::UnsupportedOperation,
            _ => ErrorKind::Configuration,
        }
    }
}
