//! Windowed normalized cross-correlation between observed traces and a stretch grid.

use std::fmt;

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, s};
use tracing::{debug, instrument, warn};

use crate::error::StretchError;
use crate::grid::StretchGrid;
use crate::window::TimeWindow;

/// Which part of a correlation function a window is applied to.
///
/// `Both`, `Left`, and `Right` assume zero lag at the trace center
/// (`n_lag / 2`); `Single` assumes zero lag at the first sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sides {
    /// Causal and acausal parts, mirrored about the center.
    #[default]
    Both,
    /// Acausal (negative-lag) part only.
    Left,
    /// Causal (positive-lag) part only.
    Right,
    /// Window indices used as absolute positions (one-sided signals).
    Single,
}

impl Sides {
    /// Parse a side selector by name (`both`, `left`, `right`, `single`).
    ///
    /// Unknown names are not an error: a warning is logged and
    /// [`Sides::Single`] is returned, so the window indices are used unmodified.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "both" => Self::Both,
            "left" => Self::Left,
            "right" => Self::Right,
            "single" => Self::Single,
            other => {
                warn!(sides = other, "unrecognized sides selector, using single");
                Self::Single
            }
        }
    }

    /// Return the selector name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Left => "left",
            Self::Right => "right",
            Self::Single => "single",
        }
    }

    /// Map relative window indices to absolute trace positions.
    ///
    /// Positions outside `[0, n_lag)` are dropped. The returned positions are
    /// sorted and unique, which is the binary mask the search applies.
    #[must_use]
    pub fn positions(self, window: &TimeWindow, n_lag: usize) -> Vec<usize> {
        let center = (n_lag / 2) as isize;
        let rel = window.indices();
        let raw: Vec<isize> = match self {
            Self::Both => rel
                .iter()
                .rev()
                .map(|&w| center - w)
                .chain(rel.iter().map(|&w| center + w))
                .collect(),
            Self::Left => rel.iter().rev().map(|&w| center - w).collect(),
            Self::Right => rel.iter().map(|&w| center + w).collect(),
            Self::Single => rel.to_vec(),
        };

        let mut mask = vec![false; n_lag];
        let mut dropped = 0usize;
        for p in raw {
            if p >= 0 && (p as usize) < n_lag {
                mask[p as usize] = true;
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(dropped, n_lag, "window positions outside the trace ignored");
        }
        mask.iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect()
    }
}

impl fmt::Display for Sides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`search`]: best matches per epoch and window plus the full similarity cube.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best correlation, shape `[n_epochs, n_windows]`.
    pub corr: Array2<f64>,
    /// Factor at the best correlation, shape `[n_epochs, n_windows]`.
    pub factor: Array2<f64>,
    /// Correlation coefficients, shape `[n_epochs, n_factors, n_windows]`.
    pub similarity: Array3<f64>,
}

/// Compare every row of `matrix` against every row of `grid`, per window.
///
/// For each window the coefficient between epoch `e` and factor `k` is
/// `<m_e, r_k> / sqrt(<m_e, m_e> <r_k, r_k>)` restricted to the window
/// positions. A zero denominator gives 0, results are clamped to `[-1, 1]`,
/// and NaN samples inside the window make that epoch's coefficients NaN.
/// Rows are used as given; the estimators taper them to match the grid first.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
/// | [`StretchError::LagLengthMismatch`] | `grid` and `matrix` differ in trace length |
#[instrument(skip_all, fields(n_epochs = matrix.nrows(), n_factors = grid.n_factors(), n_windows = windows.len(), %sides))]
pub fn search(
    matrix: ArrayView2<'_, f64>,
    grid: &StretchGrid,
    windows: &[TimeWindow],
    sides: Sides,
) -> Result<SearchOutcome, StretchError> {
    let (n_epochs, n_lag) = matrix.dim();
    if n_epochs == 0 || n_lag == 0 {
        return Err(StretchError::EmptyMatrix { n_epochs, n_lag });
    }
    if grid.n_lag() != n_lag {
        return Err(StretchError::LagLengthMismatch {
            expected: n_lag,
            got: grid.n_lag(),
        });
    }

    let n_factors = grid.n_factors();
    let factors = grid.factors();
    let mut corr = Array2::zeros((n_epochs, windows.len()));
    let mut factor = Array2::zeros((n_epochs, windows.len()));
    let mut similarity = Array3::zeros((n_epochs, n_factors, windows.len()));

    for (w, window) in windows.iter().enumerate() {
        let cols = sides.positions(window, n_lag);
        let sim = window_similarity(matrix, grid.traces(), &cols);
        let (best_corr, best_factor) = best_match(sim.view(), factors);

        similarity.slice_mut(s![.., .., w]).assign(&sim);
        corr.column_mut(w).assign(&best_corr);
        factor.column_mut(w).assign(&best_factor);
        debug!(window = w, n_samples = cols.len(), "window searched");
    }

    Ok(SearchOutcome {
        corr,
        factor,
        similarity,
    })
}

/// Correlation coefficients `[n_epochs, n_factors]` restricted to `cols`.
pub(crate) fn window_similarity(
    matrix: ArrayView2<'_, f64>,
    grid: ArrayView2<'_, f64>,
    cols: &[usize],
) -> Array2<f64> {
    let first = matrix.select(Axis(1), cols);
    let second = grid.select(Axis(1), cols);

    let dprod = first.dot(&second.t());
    let f_sq: Array1<f64> = first.map_axis(Axis(1), |row| row.dot(&row));
    let s_sq: Array1<f64> = second.map_axis(Axis(1), |row| row.dot(&row));

    let mut sim = dprod;
    for ((e, k), v) in sim.indexed_iter_mut() {
        let den = (f_sq[e] * s_sq[k]).sqrt();
        *v = if den == 0.0 {
            0.0
        } else {
            (*v / den).clamp(-1.0, 1.0)
        };
    }
    sim
}

/// Reduce `[n_epochs, n_factors]` along the factor axis.
///
/// Returns the maximum coefficient and the factor at its first occurrence.
/// Rows containing NaN give NaN for both.
pub(crate) fn best_match(
    sim: ArrayView2<'_, f64>,
    factors: ArrayView1<'_, f64>,
) -> (Array1<f64>, Array1<f64>) {
    let n = sim.nrows();
    let mut corr = Array1::zeros(n);
    let mut factor = Array1::zeros(n);
    for (e, row) in sim.outer_iter().enumerate() {
        match argmax(row) {
            Some(k) => {
                corr[e] = row[k];
                factor[e] = factors[k];
            }
            None => {
                corr[e] = f64::NAN;
                factor[e] = f64::NAN;
            }
        }
    }
    (corr, factor)
}

/// Index of the first maximum, or `None` if the row is empty or contains NaN.
fn argmax(row: ArrayView1<'_, f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (k, &v) in row.iter().enumerate() {
        if v.is_nan() {
            return None;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((k, v)),
        }
    }
    best.map(|(k, _)| k)
}
