//! Cosine taper applied before resampling and frequency-domain shifting.

use ndarray::{Array2, ArrayView2, ArrayViewMut1, Zip};

/// Fraction of the trace covered by the taper (both ends together).
pub(crate) const TAPER_FRACTION: f64 = 0.05;

/// Build a cosine taper of length `n` covering the fraction `p` of the samples.
///
/// Half-cosine ramps of `round(n * p / 2)` samples rise from 0 at the first
/// sample and fall to 0 at the last, with unit gain in between. Very short
/// ramps are widened to two samples so the ends are always pinned to zero.
#[must_use]
pub fn cosine_taper(n: usize, p: f64) -> Vec<f64> {
    let np = n as isize;
    let frac = if p == 0.0 || p == 1.0 {
        (n as f64 * p / 2.0) as isize
    } else {
        (n as f64 * p / 2.0 + 0.5) as isize
    };

    let idx1: isize = 0;
    let mut idx2 = frac - 1;
    let mut idx3 = np - frac;
    let idx4 = np - 1;
    if idx1 == idx2 {
        idx2 += 1;
    }
    if idx3 == idx4 {
        idx3 -= 1;
    }

    let mut win = vec![0.0; n];
    let in_bounds = |i: isize| i >= 0 && i < np;

    for i in idx1..=idx2 {
        if in_bounds(i) {
            let phase = std::f64::consts::PI * (i - idx1) as f64 / (idx2 - idx1) as f64;
            win[i as usize] = 0.5 * (1.0 - phase.cos());
        }
    }
    for i in (idx2 + 1)..idx3 {
        if in_bounds(i) {
            win[i as usize] = 1.0;
        }
    }
    for i in idx3..=idx4 {
        if in_bounds(i) {
            let phase = std::f64::consts::PI * (idx3 - i) as f64 / (idx4 - idx3) as f64;
            win[i as usize] = 0.5 * (1.0 + phase.cos());
        }
    }
    win
}

/// Multiply `trace` in place by the standard 5% taper.
pub(crate) fn apply_taper(trace: ArrayViewMut1<'_, f64>, taper: &[f64]) {
    Zip::from(trace)
        .and(taper)
        .for_each(|x, &w| *x *= w);
}

/// Owned copy of `matrix` with every row multiplied by the standard 5% taper.
pub(crate) fn tapered_rows(matrix: ArrayView2<'_, f64>) -> Array2<f64> {
    let taper = cosine_taper(matrix.ncols(), TAPER_FRACTION);
    let mut out = matrix.to_owned();
    for row in out.outer_iter_mut() {
        apply_taper(row, &taper);
    }
    out
}
