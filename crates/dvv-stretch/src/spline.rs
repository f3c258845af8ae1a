//! Exact interpolating cubic spline on a uniform sample grid.

use crate::error::StretchError;

/// Cubic spline through every sample of a uniformly sampled trace.
///
/// Uses not-a-knot end conditions (third derivative continuous across the
/// second and second-to-last knots), which is the spline a zero-smoothing
/// cubic B-spline fit produces. Evaluation outside the sampled range
/// extrapolates the first or last polynomial piece.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x0: f64,
    step: f64,
    values: Vec<f64>,
    /// Second derivatives at the knots.
    moments: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline through `values` sampled at `x0 + i * step`.
    ///
    /// Two samples give a straight line and three a parabola; from four
    /// samples on the full not-a-knot cubic is used.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::TraceTooShort`] | `values.len() < 2` |
    pub fn new(x0: f64, step: f64, values: &[f64]) -> Result<Self, StretchError> {
        let n = values.len();
        if n < 2 {
            return Err(StretchError::TraceTooShort { len: n });
        }
        let moments = match n {
            2 => vec![0.0; 2],
            3 => {
                let m = (values[0] - 2.0 * values[1] + values[2]) / (step * step);
                vec![m; 3]
            }
            _ => not_a_knot_moments(values, step),
        };
        Ok(Self {
            x0,
            step,
            values: values.to_vec(),
            moments,
        })
    }

    /// Evaluate the spline at `x`.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.values.len();
        let pos = (x - self.x0) / self.step;
        let i = if pos <= 0.0 {
            0
        } else {
            (pos.floor() as usize).min(n - 2)
        };
        let xi = self.x0 + i as f64 * self.step;
        let b = (x - xi) / self.step;
        let a = 1.0 - b;
        let h2 = self.step * self.step;
        a * self.values[i]
            + b * self.values[i + 1]
            + ((a * a * a - a) * self.moments[i] + (b * b * b - b) * self.moments[i + 1]) * h2 / 6.0
    }
}

/// Solve for knot second derivatives under not-a-knot end conditions.
///
/// With uniform spacing the interior equations read
/// `M[i-1] + 4 M[i] + M[i+1] = r[i]`, `r[i] = 6 (y[i+1] - 2 y[i] + y[i-1]) / h^2`.
/// Not-a-knot gives `M0 = 2 M1 - M2` and the mirror at the far end, which
/// reduces the first and last interior equations to `6 M1 = r1` and
/// `6 M[n-2] = r[n-2]`. What remains is tridiagonal in `M2..=M[n-3]`.
fn not_a_knot_moments(y: &[f64], h: f64) -> Vec<f64> {
    let n = y.len();
    let rhs: Vec<f64> = (0..n)
        .map(|i| {
            if i == 0 || i == n - 1 {
                0.0
            } else {
                6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]) / (h * h)
            }
        })
        .collect();

    let mut m = vec![0.0; n];
    m[1] = rhs[1] / 6.0;
    m[n - 2] = rhs[n - 2] / 6.0;

    // Thomas algorithm on rows 2..=n-3 with known neighbours m[1] and m[n-2].
    if n > 4 {
        let lo = 2;
        let hi = n - 3;
        let len = hi - lo + 1;
        let mut c_prime = vec![0.0; len];
        let mut d_prime = vec![0.0; len];
        for k in 0..len {
            let i = lo + k;
            let mut d = rhs[i];
            if i == lo {
                d -= m[1];
            }
            if i == hi {
                d -= m[n - 2];
            }
            if k == 0 {
                c_prime[k] = 1.0 / 4.0;
                d_prime[k] = d / 4.0;
            } else {
                let denom = 4.0 - c_prime[k - 1];
                c_prime[k] = 1.0 / denom;
                d_prime[k] = (d - d_prime[k - 1]) / denom;
            }
        }
        m[hi] = d_prime[len - 1];
        for k in (0..len - 1).rev() {
            m[lo + k] = d_prime[k] - c_prime[k] * m[lo + k + 1];
        }
    }

    m[0] = 2.0 * m[1] - m[2];
    m[n - 1] = 2.0 * m[n - 2] - m[n - 3];
    m
}
