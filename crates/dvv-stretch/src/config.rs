//! Configuration builders for stretch, shift, and multi-reference estimation.

use ndarray::{ArrayView1, ArrayView2};

use crate::error::StretchError;
use crate::grid::validate_search;
use crate::multiref::MultiReferencePanel;
use crate::reference::ReferenceSet;
use crate::result::{EstimationResult, ReconciledResult};
use crate::similarity::Sides;
use crate::window::TimeWindow;

/// Configuration for single-reference stretch estimation.
///
/// Construct via [`StretchConfig::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter         | Default                        |
/// |-------------------|--------------------------------|
/// | `sides`           | `Sides::Both`                  |
/// | `windows`         | `[0, n_lag / 2)`               |
/// | `keep_similarity` | true                           |
#[derive(Debug, Clone)]
pub struct StretchConfig {
    pub(crate) range: f64,
    pub(crate) steps: usize,
    pub(crate) sides: Sides,
    pub(crate) windows: Option<Vec<TimeWindow>>,
    pub(crate) keep_similarity: bool,
}

impl Default for StretchConfig {
    /// Range 0.1 with 100 steps.
    fn default() -> Self {
        Self {
            range: 0.1,
            steps: 100,
            sides: Sides::Both,
            windows: None,
            keep_similarity: true,
        }
    }
}

impl StretchConfig {
    /// Create a configuration testing `steps` stretches in `[-range, range]`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::InvalidRange`] | `range` negative or non-finite |
    /// | [`StretchError::InvalidStepCount`] | `steps < 2` |
    pub fn new(range: f64, steps: usize) -> Result<Self, StretchError> {
        validate_search(range, steps)?;
        Ok(Self {
            range,
            steps,
            ..Self::default()
        })
    }

    /// Set which part of the correlation functions the windows select.
    ///
    /// [`Sides::Single`] also moves the zero of the stretch axis to the first sample.
    #[must_use]
    pub fn with_sides(mut self, sides: Sides) -> Self {
        self.sides = sides;
        self
    }

    /// Set the time windows. Each window yields one estimate per epoch.
    #[must_use]
    pub fn with_windows(mut self, windows: Vec<TimeWindow>) -> Self {
        self.windows = Some(windows);
        self
    }

    /// Keep or discard the full similarity cube in the result.
    #[must_use]
    pub fn with_keep_similarity(mut self, keep: bool) -> Self {
        self.keep_similarity = keep;
        self
    }

    /// Return the maximum stretch tested.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Return the number of trial stretches.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Return the side selector.
    #[must_use]
    pub fn sides(&self) -> Sides {
        self.sides
    }

    /// Return the configured windows, or `None` for the default window.
    #[must_use]
    pub fn windows(&self) -> Option<&[TimeWindow]> {
        self.windows.as_deref()
    }

    /// Return whether results keep the similarity cube.
    #[must_use]
    pub fn keep_similarity(&self) -> bool {
        self.keep_similarity
    }

    /// Estimate the stretch of every row of `matrix` relative to `reference`.
    ///
    /// Without a reference the NaN-aware mean of all rows is used.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
    /// | [`StretchError::LagLengthMismatch`] | `reference` length differs from the row length |
    /// | [`StretchError::TraceTooShort`] | rows have fewer than 2 samples |
    pub fn estimate(
        &self,
        matrix: ArrayView2<'_, f64>,
        reference: Option<ArrayView1<'_, f64>>,
    ) -> Result<EstimationResult, StretchError> {
        crate::estimate::estimate_stretch(matrix, reference, self)
    }
}

/// Configuration for single-reference time-shift estimation.
///
/// Construct via [`ShiftConfig::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter         | Default          |
/// |-------------------|------------------|
/// | `single_sided`    | false            |
/// | `windows`         | `[0, n_lag / 2)` |
/// | `keep_similarity` | true             |
#[derive(Debug, Clone)]
pub struct ShiftConfig {
    pub(crate) range: f64,
    pub(crate) steps: usize,
    pub(crate) single_sided: bool,
    pub(crate) windows: Option<Vec<TimeWindow>>,
    pub(crate) keep_similarity: bool,
}

impl Default for ShiftConfig {
    /// Range of 10 samples with 100 steps.
    fn default() -> Self {
        Self {
            range: 10.0,
            steps: 100,
            single_sided: false,
            windows: None,
            keep_similarity: true,
        }
    }
}

impl ShiftConfig {
    /// Create a configuration testing `steps` shifts in `[-range, range]` samples.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::InvalidRange`] | `range` negative or non-finite |
    /// | [`StretchError::InvalidStepCount`] | `steps < 2` |
    pub fn new(range: f64, steps: usize) -> Result<Self, StretchError> {
        validate_search(range, steps)?;
        Ok(Self {
            range,
            steps,
            ..Self::default()
        })
    }

    /// Treat traces as one-sided: only the right side is searched.
    ///
    /// Otherwise left and right are searched separately and averaged.
    #[must_use]
    pub fn with_single_sided(mut self, single_sided: bool) -> Self {
        self.single_sided = single_sided;
        self
    }

    /// Set the time windows.
    #[must_use]
    pub fn with_windows(mut self, windows: Vec<TimeWindow>) -> Self {
        self.windows = Some(windows);
        self
    }

    /// Keep or discard the full similarity cube in the result.
    #[must_use]
    pub fn with_keep_similarity(mut self, keep: bool) -> Self {
        self.keep_similarity = keep;
        self
    }

    /// Return the maximum shift tested, in samples.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Return the number of trial shifts.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Return whether traces are treated as one-sided.
    #[must_use]
    pub fn single_sided(&self) -> bool {
        self.single_sided
    }

    /// Return the configured windows, or `None` for the default window.
    #[must_use]
    pub fn windows(&self) -> Option<&[TimeWindow]> {
        self.windows.as_deref()
    }

    /// Estimate the time shift of every row of `matrix` relative to `reference`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
    /// | [`StretchError::LagLengthMismatch`] | `reference` length differs from the row length |
    /// | [`StretchError::TraceTooShort`] | rows have fewer than 2 samples |
    pub fn estimate(
        &self,
        matrix: ArrayView2<'_, f64>,
        reference: Option<ArrayView1<'_, f64>>,
    ) -> Result<EstimationResult, StretchError> {
        crate::estimate::estimate_shift(matrix, reference, self)
    }
}

/// Configuration for stretch estimation against several references.
///
/// Every reference is searched with the same [`StretchConfig`]. The similarity
/// cube is always kept since reconciliation needs it.
#[derive(Debug, Clone)]
pub struct MultiReferenceConfig {
    pub(crate) stretch: StretchConfig,
}

impl MultiReferenceConfig {
    /// Create a configuration testing `steps` stretches in `[-range, range]`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::InvalidRange`] | `range` negative or non-finite |
    /// | [`StretchError::InvalidStepCount`] | `steps < 2` |
    pub fn new(range: f64, steps: usize) -> Result<Self, StretchError> {
        Ok(Self::from_stretch(StretchConfig::new(range, steps)?))
    }

    /// Wrap an existing stretch configuration.
    #[must_use]
    pub fn from_stretch(stretch: StretchConfig) -> Self {
        Self {
            stretch: stretch.with_keep_similarity(true),
        }
    }

    /// Set the side selector.
    #[must_use]
    pub fn with_sides(mut self, sides: Sides) -> Self {
        self.stretch.sides = sides;
        self
    }

    /// Set the time windows.
    #[must_use]
    pub fn with_windows(mut self, windows: Vec<TimeWindow>) -> Self {
        self.stretch.windows = Some(windows);
        self
    }

    /// Return the per-reference stretch configuration.
    #[must_use]
    pub fn stretch(&self) -> &StretchConfig {
        &self.stretch
    }

    /// Run one stretch estimate per reference.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::TooFewReferences`] | `references` is empty |
    /// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
    /// | [`StretchError::LagLengthMismatch`] | a reference differs from the row length |
    pub fn estimate_panel<'a>(
        &self,
        matrix: ArrayView2<'_, f64>,
        references: impl Into<ReferenceSet<'a>>,
    ) -> Result<MultiReferencePanel, StretchError> {
        crate::multiref::estimate_panel(matrix, references.into(), &self.stretch)
    }

    /// Estimate against every reference and reconcile the results.
    ///
    /// Only the first configured window is used; extra windows are ignored
    /// with a warning.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::TooFewReferences`] | fewer than 2 references |
    /// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
    /// | [`StretchError::LagLengthMismatch`] | a reference differs from the row length |
    pub fn estimate_and_align<'a>(
        &self,
        matrix: ArrayView2<'_, f64>,
        references: impl Into<ReferenceSet<'a>>,
    ) -> Result<ReconciledResult, StretchError> {
        crate::multiref::estimate_and_align(matrix, references.into(), &self.stretch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_defaults() {
        let c = StretchConfig::default();
        assert_eq!(c.range(), 0.1);
        assert_eq!(c.steps(), 100);
        assert_eq!(c.sides(), Sides::Both);
        assert!(c.windows().is_none());
        assert!(c.keep_similarity());
    }

    #[test]
    fn shift_defaults() {
        let c = ShiftConfig::default();
        assert_eq!(c.range(), 10.0);
        assert_eq!(c.steps(), 100);
        assert!(!c.single_sided());
    }

    #[test]
    fn builders_override() {
        let c = StretchConfig::new(0.05, 51)
            .unwrap()
            .with_sides(Sides::Left)
            .with_windows(vec![TimeWindow::span(10, 20)])
            .with_keep_similarity(false);
        assert_eq!(c.range(), 0.05);
        assert_eq!(c.sides(), Sides::Left);
        assert_eq!(c.windows().map(<[TimeWindow]>::len), Some(1));
        assert!(!c.keep_similarity());
    }

    #[test]
    fn multi_reference_always_keeps_similarity() {
        let stretch = StretchConfig::new(0.05, 51).unwrap().with_keep_similarity(false);
        let c = MultiReferenceConfig::from_stretch(stretch);
        assert!(c.stretch().keep_similarity());
    }

    #[test]
    fn rejects_invalid_search() {
        assert!(matches!(
            StretchConfig::new(0.1, 1),
            Err(StretchError::InvalidStepCount { steps: 1 })
        ));
        assert!(matches!(
            ShiftConfig::new(f64::NAN, 10),
            Err(StretchError::InvalidRange { .. })
        ));
        assert!(matches!(
            MultiReferenceConfig::new(-1.0, 10),
            Err(StretchError::InvalidRange { .. })
        ));
    }
}
