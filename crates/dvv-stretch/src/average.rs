//! Inverse-variance averaging of dv/v curves measured on the same epochs.

use ndarray::{Array1, ArrayView1};
use tracing::{debug, instrument};

use crate::error::StretchError;

/// Correlations above this are treated as degenerate and excluded.
const MAX_CORR: f64 = 0.999;

/// Averaged dv/v and correlation curves.
#[derive(Debug, Clone)]
pub struct WeightedAverage {
    /// Weighted mean factor per epoch.
    pub dv: Array1<f64>,
    /// Weighted mean correlation per epoch.
    pub corr: Array1<f64>,
}

/// Average several `(dv, corr)` curves with weights `4c² / (1 - c²)`.
///
/// The weight is the inverse of the stretch variance proxy `(1 - c²) / (4c²)`.
/// Samples with NaN correlation or correlation above 0.999 are left out; an
/// epoch with no remaining samples is NaN in both outputs.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::NoCurves`] | `curves` is empty |
/// | [`StretchError::CurveLengthMismatch`] | a dv or corr curve differs in length from the first dv curve |
#[instrument(skip(curves), fields(n_curves = curves.len()))]
pub fn weighted_average(
    curves: &[(ArrayView1<'_, f64>, ArrayView1<'_, f64>)],
) -> Result<WeightedAverage, StretchError> {
    let Some((first, _)) = curves.first() else {
        return Err(StretchError::NoCurves);
    };
    let n = first.len();
    for (index, (dv, corr)) in curves.iter().enumerate() {
        for got in [dv.len(), corr.len()] {
            if got != n {
                return Err(StretchError::CurveLengthMismatch {
                    index,
                    expected: n,
                    got,
                });
            }
        }
    }

    let mut sum_w = Array1::<f64>::zeros(n);
    let mut sum_dv = Array1::<f64>::zeros(n);
    let mut sum_corr = Array1::<f64>::zeros(n);
    let mut excluded = 0usize;
    for (dv, corr) in curves {
        for e in 0..n {
            let c = corr[e];
            if c.is_nan() || c > MAX_CORR || dv[e].is_nan() {
                excluded += 1;
                continue;
            }
            let w = 4.0 * c * c / (1.0 - c * c);
            sum_w[e] += w;
            sum_dv[e] += w * dv[e];
            sum_corr[e] += w * c;
        }
    }
    debug!(excluded, "samples excluded from average");

    let normalize = |sum: &Array1<f64>| {
        Array1::from_iter(
            sum.iter()
                .zip(&sum_w)
                .map(|(&s, &w)| if w > 0.0 { s / w } else { f64::NAN }),
        )
    };
    Ok(WeightedAverage {
        dv: normalize(&sum_dv),
        corr: normalize(&sum_corr),
    })
}
