//! Apply known shifts or stretches to a batch of traces.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use realfft::RealFftPlanner;
use realfft::num_complex::Complex;
use tracing::{debug, instrument};

use crate::error::StretchError;
use crate::grid::time_axis;
use crate::spline::CubicSpline;
use crate::taper::{TAPER_FRACTION, apply_taper, cosine_taper};

/// One value per trace, either as a vector or as the first column of a table.
#[derive(Debug, Clone, Copy)]
pub enum PerTraceValues<'a> {
    /// One value per trace.
    Column(ArrayView1<'a, f64>),
    /// One row per trace; only the first column is used.
    Table(ArrayView2<'a, f64>),
}

impl PerTraceValues<'_> {
    /// Extract one value per trace, checking the row count.
    fn first_column(&self, n_traces: usize) -> Result<Array1<f64>, StretchError> {
        let values = match self {
            Self::Column(c) => c.to_owned(),
            Self::Table(t) => {
                if t.ncols() == 0 {
                    return Err(StretchError::NoValueColumns);
                }
                if t.ncols() > 1 {
                    debug!(n_cols = t.ncols(), "extra value columns ignored");
                }
                t.column(0).to_owned()
            }
        };
        if values.len() != n_traces {
            return Err(StretchError::ValueCountMismatch {
                n_traces,
                n_values: values.len(),
            });
        }
        Ok(values)
    }
}

impl<'a> From<ArrayView1<'a, f64>> for PerTraceValues<'a> {
    fn from(c: ArrayView1<'a, f64>) -> Self {
        Self::Column(c)
    }
}

impl<'a> From<ArrayView2<'a, f64>> for PerTraceValues<'a> {
    fn from(t: ArrayView2<'a, f64>) -> Self {
        Self::Table(t)
    }
}

impl<'a> From<&'a Array1<f64>> for PerTraceValues<'a> {
    fn from(c: &'a Array1<f64>) -> Self {
        Self::Column(c.view())
    }
}

impl<'a> From<&'a Array2<f64>> for PerTraceValues<'a> {
    fn from(t: &'a Array2<f64>) -> Self {
        Self::Table(t.view())
    }
}

fn check_matrix(matrix: ArrayView2<'_, f64>) -> Result<(), StretchError> {
    let (n_epochs, n_lag) = matrix.dim();
    if n_epochs == 0 || n_lag == 0 {
        return Err(StretchError::EmptyMatrix { n_epochs, n_lag });
    }
    Ok(())
}

/// Delay each row of `matrix` by a (fractional) number of samples.
///
/// Each row is tapered, zero-padded to the next power of two at least twice
/// its length, phase-shifted by `exp(-i shift w)` in the frequency domain, and
/// truncated back. A positive shift moves the waveform to later samples.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
/// | [`StretchError::NoValueColumns`] | `shifts` is a table with no columns |
/// | [`StretchError::ValueCountMismatch`] | `shifts` does not have one row per trace |
/// | [`StretchError::Fft`] | the FFT rejects its buffers |
#[instrument(skip_all, fields(n_traces = matrix.nrows(), n_lag = matrix.ncols()))]
pub fn time_shift_apply<'a>(
    matrix: ArrayView2<'_, f64>,
    shifts: impl Into<PerTraceValues<'a>>,
) -> Result<Array2<f64>, StretchError> {
    check_matrix(matrix)?;
    let (n_traces, n_lag) = matrix.dim();
    let shifts: PerTraceValues<'a> = shifts.into();
    let shifts = shifts.first_column(n_traces)?;

    let nfft = (2 * n_lag).next_power_of_two();
    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(nfft);
    let inverse = planner.plan_fft_inverse(nfft);
    let mut input = forward.make_input_vec();
    let mut spectrum = forward.make_output_vec();
    let mut output = inverse.make_output_vec();

    let n_bins = spectrum.len();
    let omega: Vec<f64> = (0..n_bins)
        .map(|k| std::f64::consts::PI * k as f64 / (n_bins - 1) as f64)
        .collect();
    let taper = cosine_taper(n_lag, TAPER_FRACTION);
    let scale = 1.0 / nfft as f64;

    let mut shifted = matrix.to_owned();
    for (mut row, &shift) in shifted.outer_iter_mut().zip(&shifts) {
        apply_taper(row.view_mut(), &taper);
        input.fill(0.0);
        for (dst, &x) in input.iter_mut().zip(row.iter()) {
            *dst = x;
        }
        forward.process(&mut input, &mut spectrum)?;

        for (bin, &w) in spectrum.iter_mut().zip(&omega) {
            *bin *= Complex::from_polar(1.0, -shift * w);
        }
        // The inverse real FFT requires purely real DC and Nyquist bins.
        spectrum[0].im = 0.0;
        spectrum[n_bins - 1].im = 0.0;

        inverse.process(&mut spectrum, &mut output)?;
        for (dst, &y) in row.iter_mut().zip(output.iter()) {
            *dst = y * scale;
        }
    }
    debug!(nfft, "shift applied");
    Ok(shifted)
}

/// Stretch each row of `matrix` by a relative factor.
///
/// Each row is tapered and resampled with a cubic spline at `t * exp(-stretch)`,
/// where `t` is centered on the middle sample unless `single_sided`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
/// | [`StretchError::TraceTooShort`] | rows have fewer than 2 samples |
/// | [`StretchError::NoValueColumns`] | `stretches` is a table with no columns |
/// | [`StretchError::ValueCountMismatch`] | `stretches` does not have one row per trace |
#[instrument(skip(matrix, stretches), fields(n_traces = matrix.nrows(), n_lag = matrix.ncols()))]
pub fn time_stretch_apply<'a>(
    matrix: ArrayView2<'_, f64>,
    stretches: impl Into<PerTraceValues<'a>>,
    single_sided: bool,
) -> Result<Array2<f64>, StretchError> {
    check_matrix(matrix)?;
    let (n_traces, n_lag) = matrix.dim();
    if n_lag < 2 {
        return Err(StretchError::TraceTooShort { len: n_lag });
    }
    let stretches: PerTraceValues<'a> = stretches.into();
    let stretches = stretches.first_column(n_traces)?;

    let taper = cosine_taper(n_lag, TAPER_FRACTION);
    let (x0, t) = time_axis(n_lag, !single_sided);

    let mut stretched = matrix.to_owned();
    for (mut row, &stretch) in stretched.outer_iter_mut().zip(&stretches) {
        apply_taper(row.view_mut(), &taper);
        let samples = row.to_vec();
        let spline = CubicSpline::new(x0, 1.0, &samples)?;
        let scale = (-stretch).exp();
        for (dst, &ti) in row.iter_mut().zip(&t) {
            *dst = spline.eval(ti * scale);
        }
    }
    debug!("stretch applied");
    Ok(stretched)
}
