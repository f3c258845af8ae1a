//! Stretched (or shifted) copies of a reference trace over a grid of trial factors.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::{debug, instrument};

use crate::error::StretchError;
use crate::spline::CubicSpline;
use crate::taper::{TAPER_FRACTION, cosine_taper};

/// How a trial factor acts on the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    /// Resample at `t * exp(-factor)`. The time axis `t` is centered on the
    /// middle sample unless `single_sided`, in which case it starts at zero.
    Stretch {
        /// Zero lag at the first sample (one-sided, active-source signals).
        single_sided: bool,
    },
    /// Resample at `i - factor`, i.e. a delay of `factor` samples.
    Shift,
}

/// Sample positions of a trace of length `n`, centered or starting at zero.
pub(crate) fn time_axis(n: usize, centered: bool) -> (f64, Vec<f64>) {
    let x0 = if centered { -((n as f64 - 1.0) / 2.0) } else { 0.0 };
    (x0, (0..n).map(|i| x0 + i as f64).collect())
}

/// `steps` evenly spaced values from `-range` to `range`, both included.
///
/// Requires `steps >= 2`.
pub(crate) fn linspace_symmetric(range: f64, steps: usize) -> Vec<f64> {
    let last = (steps - 1) as f64;
    (0..steps)
        .map(|i| range * (2.0 * i as f64 / last - 1.0))
        .collect()
}

pub(crate) fn validate_search(range: f64, steps: usize) -> Result<(), StretchError> {
    if !range.is_finite() || range < 0.0 {
        return Err(StretchError::InvalidRange { range });
    }
    if steps < 2 {
        return Err(StretchError::InvalidStepCount { steps });
    }
    Ok(())
}

/// A reference trace resampled at every trial factor.
///
/// Row `k` of [`traces`](Self::traces) is the reference evaluated under
/// `factors()[k]`. Factors are ascending.
#[derive(Debug, Clone)]
pub struct StretchGrid {
    traces: Array2<f64>,
    factors: Array1<f64>,
}

impl StretchGrid {
    /// Build a grid of `steps` trial factors spanning `[-range, range]`.
    ///
    /// The reference is copied and multiplied by a 5% cosine taper before the
    /// spline is fitted, so the caller's trace is left untouched.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::TraceTooShort`] | reference has fewer than 2 samples |
    /// | [`StretchError::InvalidRange`] | `range` negative or non-finite |
    /// | [`StretchError::InvalidStepCount`] | `steps < 2` |
    #[instrument(skip(reference), fields(n = reference.len()))]
    pub fn build(
        reference: ArrayView1<'_, f64>,
        range: f64,
        steps: usize,
        mode: GridMode,
    ) -> Result<Self, StretchError> {
        validate_search(range, steps)?;
        let n = reference.len();
        if n < 2 {
            return Err(StretchError::TraceTooShort { len: n });
        }

        let tapered: Vec<f64> = reference
            .iter()
            .zip(cosine_taper(n, TAPER_FRACTION))
            .map(|(&x, w)| x * w)
            .collect();

        let centered = matches!(mode, GridMode::Stretch { single_sided: false });
        let (x0, t) = time_axis(n, centered);
        let spline = CubicSpline::new(x0, 1.0, &tapered)?;

        let factors = linspace_symmetric(range, steps);
        let mut traces = Array2::zeros((steps, n));
        for (k, &f) in factors.iter().enumerate() {
            let mut row = traces.row_mut(k);
            match mode {
                GridMode::Stretch { .. } => {
                    let scale = (-f).exp();
                    for (out, &ti) in row.iter_mut().zip(&t) {
                        *out = spline.eval(ti * scale);
                    }
                }
                GridMode::Shift => {
                    for (out, &ti) in row.iter_mut().zip(&t) {
                        *out = spline.eval(ti - f);
                    }
                }
            }
        }
        debug!(steps, "stretch grid built");

        Ok(Self {
            traces,
            factors: Array1::from(factors),
        })
    }

    /// Assemble a grid from precomputed traces and factors.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::FactorCountMismatch`] | `traces.nrows() != factors.len()` |
    pub fn from_parts(traces: Array2<f64>, factors: Array1<f64>) -> Result<Self, StretchError> {
        if traces.nrows() != factors.len() {
            return Err(StretchError::FactorCountMismatch {
                rows: traces.nrows(),
                factors: factors.len(),
            });
        }
        Ok(Self { traces, factors })
    }

    /// Return the resampled traces, one row per factor.
    #[must_use]
    pub fn traces(&self) -> ArrayView2<'_, f64> {
        self.traces.view()
    }

    /// Return the trial factors in row order.
    #[must_use]
    pub fn factors(&self) -> ArrayView1<'_, f64> {
        self.factors.view()
    }

    /// Return the number of trial factors.
    #[must_use]
    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }

    /// Return the trace length.
    #[must_use]
    pub fn n_lag(&self) -> usize {
        self.traces.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wavelet(n: usize) -> Array1<f64> {
        let c = (n as f64 - 1.0) / 2.0;
        Array1::from_iter((0..n).map(|i| {
            let t = i as f64 - c;
            (-(t / 20.0).powi(2)).exp() * (t * 0.3).cos()
        }))
    }

    #[test]
    fn factors_symmetric_and_sorted() {
        let g = StretchGrid::build(wavelet(101).view(), 0.05, 11, GridMode::Stretch { single_sided: false })
            .unwrap();
        let f = g.factors();
        assert_eq!(f.len(), 11);
        assert_eq!(f[0], -0.05);
        assert_eq!(f[10], 0.05);
        assert_eq!(f[5], 0.0);
        for k in 0..10 {
            assert!(f[k] < f[k + 1]);
        }
        assert_eq!(g.traces().dim(), (11, 101));
    }

    #[test]
    fn zero_factor_row_is_tapered_reference() {
        let r = wavelet(101);
        let g = StretchGrid::build(r.view(), 0.02, 21, GridMode::Stretch { single_sided: false }).unwrap();
        let taper = cosine_taper(101, TAPER_FRACTION);
        let traces = g.traces();
        let row = traces.row(10);
        for i in 0..101 {
            assert_eq!(row[i], r[i] * taper[i], "sample {i}");
        }
    }

    #[test]
    fn reference_is_not_mutated() {
        let r = Array1::from_elem(50, 1.0);
        let before = r.clone();
        let _ = StretchGrid::build(r.view(), 0.1, 5, GridMode::Shift).unwrap();
        assert_eq!(r, before);
    }

    #[test]
    fn integer_shift_moves_samples() {
        let r = wavelet(101);
        // factors: -2, -1, 0, 1, 2 samples
        let g = StretchGrid::build(r.view(), 2.0, 5, GridMode::Shift).unwrap();
        let zero = g.traces().row(2).to_owned();
        let traces = g.traces();
        let plus_one = traces.row(3);
        for i in 1..101 {
            assert!((plus_one[i] - zero[i - 1]).abs() < 1e-12, "sample {i}");
        }
    }

    #[test]
    fn positive_stretch_dilates_about_center() {
        let r = wavelet(201);
        let g = StretchGrid::build(r.view(), 0.1, 3, GridMode::Stretch { single_sided: false }).unwrap();
        // Center sample (t = 0) is invariant under stretching.
        assert!((g.traces()[[0, 100]] - g.traces()[[1, 100]]).abs() < 1e-12);
        assert!((g.traces()[[2, 100]] - g.traces()[[1, 100]]).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_reference() {
        let r = Array1::from(vec![1.0]);
        assert!(matches!(
            StretchGrid::build(r.view(), 0.1, 10, GridMode::Shift),
            Err(StretchError::TraceTooShort { len: 1 })
        ));
    }

    #[test]
    fn rejects_bad_steps_and_range() {
        let r = wavelet(20);
        assert!(matches!(
            StretchGrid::build(r.view(), 0.1, 1, GridMode::Shift),
            Err(StretchError::InvalidStepCount { steps: 1 })
        ));
        assert!(matches!(
            StretchGrid::build(r.view(), -0.1, 10, GridMode::Shift),
            Err(StretchError::InvalidRange { .. })
        ));
    }

    #[test]
    fn from_parts_checks_rows() {
        let result = StretchGrid::from_parts(Array2::zeros((3, 10)), Array1::zeros(4));
        assert!(matches!(
            result,
            Err(StretchError::FactorCountMismatch { rows: 3, factors: 4 })
        ));
    }
}
