//! Result types for single-reference estimation and multi-reference reconciliation.

use ndarray::{Array1, Array2, Array3, ArrayView1};

/// What the factors of an [`EstimationResult`] measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateKind {
    /// Relative stretch of the time axis.
    Stretch,
    /// Additive shift in samples.
    Shift,
}

impl EstimateKind {
    /// Return the lowercase name used in logs and output files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stretch => "stretch",
            Self::Shift => "shift",
        }
    }
}

/// Best-matching factor and correlation per epoch and window.
#[derive(Debug, Clone)]
pub struct EstimationResult {
    /// Whether `factor` holds stretches or shifts.
    pub kind: EstimateKind,
    /// Best correlation coefficient, shape `[n_epochs, n_windows]`.
    pub corr: Array2<f64>,
    /// Factor at the best correlation, shape `[n_epochs, n_windows]`.
    pub factor: Array2<f64>,
    /// Trial factors searched, ascending.
    pub factors: Array1<f64>,
    /// Full similarity cube `[n_epochs, n_factors, n_windows]`, if kept.
    pub similarity: Option<Array3<f64>>,
}

impl EstimationResult {
    /// Return the number of epochs.
    #[must_use]
    pub fn n_epochs(&self) -> usize {
        self.corr.nrows()
    }

    /// Return the number of windows.
    #[must_use]
    pub fn n_windows(&self) -> usize {
        self.corr.ncols()
    }

    /// Return the best correlation per epoch for window `w`.
    ///
    /// # Panics
    ///
    /// Panics if `w >= n_windows()`.
    #[must_use]
    pub fn corr_in(&self, w: usize) -> ArrayView1<'_, f64> {
        self.corr.column(w)
    }

    /// Return the best factor per epoch for window `w`.
    ///
    /// # Panics
    ///
    /// Panics if `w >= n_windows()`.
    #[must_use]
    pub fn factor_in(&self, w: usize) -> ArrayView1<'_, f64> {
        self.factor.column(w)
    }

    /// Return the spacing between consecutive trial factors.
    #[must_use]
    pub fn delta(&self) -> f64 {
        if self.factors.len() < 2 {
            0.0
        } else {
            self.factors[1] - self.factors[0]
        }
    }
}

/// Combined estimate from several references after offset reconciliation.
#[derive(Debug, Clone)]
pub struct ReconciledResult {
    /// Combined estimate for the reconciled window.
    pub result: EstimationResult,
    /// Solved per-reference offsets, mean zero, one per reference.
    pub offsets: Array1<f64>,
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2};

    use super::*;

    #[test]
    fn shape_accessors() {
        let r = EstimationResult {
            kind: EstimateKind::Stretch,
            corr: Array2::zeros((7, 3)),
            factor: Array2::zeros((7, 3)),
            factors: Array1::linspace(-0.1, 0.1, 21),
            similarity: None,
        };
        assert_eq!(r.n_epochs(), 7);
        assert_eq!(r.n_windows(), 3);
        assert_eq!(r.corr_in(2).len(), 7);
        assert!((r.delta() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn results_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EstimationResult>();
        assert_send_sync::<ReconciledResult>();
    }

    #[test]
    fn kind_names() {
        assert_eq!(EstimateKind::Stretch.as_str(), "stretch");
        assert_eq!(EstimateKind::Shift.as_str(), "shift");
    }
}
