//! Multi-reference stretch estimation and offset reconciliation.
//!
//! Each reference yields its own stretch curve, biased by the unknown stretch
//! of that reference. Pairwise weighted offsets between the curves are
//! inverted by least squares for one offset per reference; the similarity
//! cubes are then aligned by those offsets and averaged.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use tracing::{debug, info, instrument, warn};

use crate::config::StretchConfig;
use crate::error::StretchError;
use crate::estimate::estimate_stretch;
use crate::reference::ReferenceSet;
use crate::result::{EstimationResult, ReconciledResult};
use crate::similarity::best_match;

/// Correlations above this in both curves carry no information about the offset.
const MAX_CORR: f64 = 0.999;

/// Relative tolerance when comparing factor grids across references.
const FACTOR_TOL: f64 = 1e-9;

// ── Panel ─────────────────────────────────────────────────────────────────────

/// Stretch estimates of the same matrix against an ordered list of references.
///
/// Every entry shares the factor grid, window layout, and epoch count.
/// Reference ids are positions in the panel.
#[derive(Debug, Clone)]
pub struct MultiReferencePanel {
    results: Vec<EstimationResult>,
}

impl MultiReferencePanel {
    /// Create a panel, checking that all estimates are comparable.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`StretchError::TooFewReferences`] | `results` is empty |
    /// | [`StretchError::InconsistentPanel`] | an entry differs in kind, factors, windows, or epochs |
    pub fn new(results: Vec<EstimationResult>) -> Result<Self, StretchError> {
        let Some(first) = results.first() else {
            return Err(StretchError::TooFewReferences { n_ref: 0 });
        };
        for (reference, r) in results.iter().enumerate().skip(1) {
            let reason = if r.kind != first.kind {
                Some("estimate kind differs")
            } else if !same_factors(r.factors.view(), first.factors.view()) {
                Some("factor grid differs")
            } else if r.n_windows() != first.n_windows() {
                Some("window count differs")
            } else if r.n_epochs() != first.n_epochs() {
                Some("epoch count differs")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(StretchError::InconsistentPanel { reference, reason });
            }
        }
        Ok(Self { results })
    }

    /// Return the number of references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Return true if the panel has no references.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Return the estimate for reference `id`.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&EstimationResult> {
        self.results.get(id)
    }

    /// Iterate over the estimates in reference order.
    pub fn iter(&self) -> std::slice::Iter<'_, EstimationResult> {
        self.results.iter()
    }

    /// Return the only estimate of a one-reference panel.
    ///
    /// Returns `None` when the panel holds more than one reference.
    #[must_use]
    pub fn into_single(mut self) -> Option<EstimationResult> {
        if self.results.len() == 1 {
            self.results.pop()
        } else {
            None
        }
    }

    /// Consume the panel and return the estimates in reference order.
    #[must_use]
    pub fn into_results(self) -> Vec<EstimationResult> {
        self.results
    }

    /// Reconcile the per-reference estimates of the first window.
    ///
    /// # Errors
    ///
    /// See [`reconcile`].
    pub fn reconcile(&self) -> Result<ReconciledResult, StretchError> {
        reconcile(self)
    }
}

fn same_factors(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(&x, &y)| (x - y).abs() <= FACTOR_TOL * x.abs().max(y.abs()).max(1.0))
}

/// Run one stretch estimate per reference, keeping the similarity cubes.
#[instrument(skip_all, fields(n_ref = references.len(), n_epochs = matrix.nrows()))]
pub(crate) fn estimate_panel(
    matrix: ArrayView2<'_, f64>,
    references: ReferenceSet<'_>,
    config: &StretchConfig,
) -> Result<MultiReferencePanel, StretchError> {
    if references.is_empty() {
        return Err(StretchError::TooFewReferences { n_ref: 0 });
    }
    let config = config.clone().with_keep_similarity(true);
    let results = references
        .iter()
        .enumerate()
        .map(|(id, r)| {
            debug!(reference = id, "estimating against reference");
            estimate_stretch(matrix, Some(r), &config)
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(n_ref = results.len(), "reference panel estimated");
    MultiReferencePanel::new(results)
}

/// Estimate against several references and reconcile, using the first window only.
#[instrument(skip_all, fields(n_ref = references.len()))]
pub(crate) fn estimate_and_align(
    matrix: ArrayView2<'_, f64>,
    references: ReferenceSet<'_>,
    config: &StretchConfig,
) -> Result<ReconciledResult, StretchError> {
    if references.len() < 2 {
        return Err(StretchError::TooFewReferences {
            n_ref: references.len(),
        });
    }
    let mut config = config.clone();
    if let Some(windows) = config.windows.as_mut()
        && windows.len() > 1
    {
        warn!(
            n_windows = windows.len(),
            "multi-reference alignment uses only the first window"
        );
        windows.truncate(1);
    }
    let panel = estimate_panel(matrix, references, &config)?;
    reconcile(&panel)
}

// ── Pairwise offsets ──────────────────────────────────────────────────────────

/// Weighted mean offset between two stretch curves on the same epochs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOffset {
    /// Sum of the per-epoch weights; zero when no epoch is informative.
    pub weight: f64,
    /// Weighted mean of `dt_a - dt_b`; zero when `weight` is zero.
    pub offset: f64,
}

/// Weighted mean of `dt_a - dt_b` over the informative epochs.
///
/// Epochs where either correlation is not positive, or both exceed 0.999, are
/// skipped. The others are weighted by `1 / (var_a + var_b)` with
/// `var = (1 - c²) / (4c²)`.
#[must_use]
pub fn pair_offset(
    dt_a: ArrayView1<'_, f64>,
    dt_b: ArrayView1<'_, f64>,
    corr_a: ArrayView1<'_, f64>,
    corr_b: ArrayView1<'_, f64>,
) -> PairOffset {
    let variance = |c: f64| (1.0 - c * c) / (4.0 * c * c);
    let mut sum_w = 0.0;
    let mut sum_wd = 0.0;
    for (((&a, &b), &ca), &cb) in dt_a.iter().zip(dt_b).zip(corr_a).zip(corr_b) {
        if !(ca > 0.0 && cb > 0.0) || (ca > MAX_CORR && cb > MAX_CORR) {
            continue;
        }
        let d = a - b;
        if d.is_nan() {
            continue;
        }
        let w = 1.0 / (variance(ca) + variance(cb));
        sum_w += w;
        sum_wd += w * d;
    }
    if sum_w > 0.0 {
        PairOffset {
            weight: sum_w,
            offset: sum_wd / sum_w,
        }
    } else {
        PairOffset {
            weight: 0.0,
            offset: 0.0,
        }
    }
}

// ── Reconciliation ────────────────────────────────────────────────────────────

/// Reconcile a panel into one stretch curve.
///
/// Offsets `m` (one per reference, mean zero) solve the weighted least-squares
/// system built from every ordered pair of references. Each reference's
/// similarity matrix is rolled along the factor axis by `m / delta` rounded
/// half to even, and the rolled matrices are averaged; the best factor and correlation are
/// read off the average. Only the first window is used.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::TooFewReferences`] | the panel has fewer than 2 references |
/// | [`StretchError::InconsistentPanel`] | the estimates have no windows |
/// | [`StretchError::MissingSimilarity`] | an estimate was made without keeping its similarity cube |
#[instrument(skip_all, fields(n_ref = panel.len()))]
pub fn reconcile(panel: &MultiReferencePanel) -> Result<ReconciledResult, StretchError> {
    let n_ref = panel.len();
    if n_ref < 2 {
        return Err(StretchError::TooFewReferences { n_ref });
    }
    let first = &panel.results[0];
    if first.n_windows() == 0 {
        return Err(StretchError::InconsistentPanel {
            reference: 0,
            reason: "no windows to reconcile",
        });
    }
    if first.n_windows() > 1 {
        warn!(n_windows = first.n_windows(), "reconciling the first window only");
    }

    let sims = panel
        .iter()
        .enumerate()
        .map(|(reference, r)| {
            r.similarity
                .as_ref()
                .map(|sim| sim.slice(s![.., .., 0]))
                .ok_or(StretchError::MissingSimilarity { reference })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut pairs = Vec::with_capacity(n_ref * (n_ref - 1));
    for a in 0..n_ref {
        for b in 0..n_ref {
            if a == b {
                continue;
            }
            let (ra, rb) = (&panel.results[a], &panel.results[b]);
            let p = pair_offset(ra.factor_in(0), rb.factor_in(0), ra.corr_in(0), rb.corr_in(0));
            pairs.push((a, b, p));
        }
    }
    let offsets = solve_offsets(n_ref, &pairs);
    debug!(?offsets, "reference offsets solved");

    let aligned = align_and_average(&sims, offsets.view(), first.delta());
    let (corr, factor) = best_match(aligned.view(), first.factors.view());
    info!(n_epochs = corr.len(), "references reconciled");

    Ok(ReconciledResult {
        result: EstimationResult {
            kind: first.kind,
            corr: corr.insert_axis(Axis(1)),
            factor: factor.insert_axis(Axis(1)),
            factors: first.factors.clone(),
            similarity: Some(aligned.insert_axis(Axis(2))),
        },
        offsets,
    })
}

/// Solve `m = (GᵀWG)⁻¹ GᵀWd` for offsets of references `1..n_ref`.
///
/// Row `(a, b)` of `G` has `-1` in column `a - 1` and `+1` in column `b - 1`
/// (columns for reference 0 are omitted, fixing it at zero). The result is
/// shifted to mean zero. A singular system gives all-zero offsets.
fn solve_offsets(n_ref: usize, pairs: &[(usize, usize, PairOffset)]) -> Array1<f64> {
    let n_unknowns = n_ref - 1;
    let mut g = DMatrix::<f64>::zeros(pairs.len(), n_unknowns);
    let mut w = DVector::<f64>::zeros(pairs.len());
    let mut d = DVector::<f64>::zeros(pairs.len());
    for (row, &(a, b, p)) in pairs.iter().enumerate() {
        if a > 0 {
            g[(row, a - 1)] = -1.0;
        }
        if b > 0 {
            g[(row, b - 1)] = 1.0;
        }
        w[row] = p.weight;
        d[row] = p.offset;
    }

    let gtw = g.transpose() * DMatrix::from_diagonal(&w);
    let normal = &gtw * &g;
    let rhs = &gtw * &d;
    let solved = normal
        .lu()
        .solve(&rhs)
        .filter(|m| m.iter().all(|v| v.is_finite()));

    let mut m = Array1::<f64>::zeros(n_ref);
    match solved {
        Some(sol) => {
            for (i, v) in sol.iter().enumerate() {
                m[i + 1] = *v;
            }
        }
        None => warn!(n_ref, "singular offset system, using zero offsets"),
    }
    let mean = m.sum() / n_ref as f64;
    m.mapv_inplace(|v| v - mean);
    m
}

/// Roll each `[n_epochs, n_factors]` matrix by its offset in factor steps and average.
fn align_and_average(
    sims: &[ArrayView2<'_, f64>],
    offsets: ArrayView1<'_, f64>,
    delta: f64,
) -> Array2<f64> {
    let (n_epochs, n_factors) = sims[0].dim();
    let mut acc = Array2::<f64>::zeros((n_epochs, n_factors));
    for (sim, &m) in sims.iter().zip(offsets.iter()) {
        let shift = if delta > 0.0 { (m / delta).round_ties_even() as isize } else { 0 };
        for k in 0..n_factors {
            let src = (k as isize - shift).rem_euclid(n_factors as isize) as usize;
            let mut col = acc.column_mut(k);
            col += &sim.column(src);
        }
    }
    acc /= sims.len() as f64;
    acc
}
