//! Reference traces: mean fallback, interval grouping, and single/multiple selection.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::{debug, instrument};

use crate::error::StretchError;

/// One reference trace or one reference per row.
#[derive(Debug, Clone, Copy)]
pub enum ReferenceSet<'a> {
    /// A single reference trace.
    Single(ArrayView1<'a, f64>),
    /// Several references, one per row.
    Multiple(ArrayView2<'a, f64>),
}

impl ReferenceSet<'_> {
    /// Return the number of reference traces.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(m) => m.nrows(),
        }
    }

    /// Return true if there are no reference traces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the trace length shared by all references.
    #[must_use]
    pub fn n_lag(&self) -> usize {
        match self {
            Self::Single(r) => r.len(),
            Self::Multiple(m) => m.ncols(),
        }
    }

    /// Iterate over the reference traces in order.
    pub fn iter(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> + '_ {
        let (single, multiple) = match self {
            Self::Single(r) => (Some(r.view()), None),
            Self::Multiple(m) => (None, Some(m.outer_iter())),
        };
        single.into_iter().chain(multiple.into_iter().flatten())
    }
}

impl<'a> From<ArrayView1<'a, f64>> for ReferenceSet<'a> {
    fn from(r: ArrayView1<'a, f64>) -> Self {
        Self::Single(r)
    }
}

impl<'a> From<ArrayView2<'a, f64>> for ReferenceSet<'a> {
    fn from(m: ArrayView2<'a, f64>) -> Self {
        Self::Multiple(m)
    }
}

impl<'a> From<&'a Array1<f64>> for ReferenceSet<'a> {
    fn from(r: &'a Array1<f64>) -> Self {
        Self::Single(r.view())
    }
}

impl<'a> From<&'a Array2<f64>> for ReferenceSet<'a> {
    fn from(m: &'a Array2<f64>) -> Self {
        Self::Multiple(m.view())
    }
}

/// Sum every column ignoring NaN, divided by the total row count.
///
/// Columns that are NaN in every row come out as zero.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
pub fn mean_reference(matrix: ArrayView2<'_, f64>) -> Result<Array1<f64>, StretchError> {
    let (n_epochs, n_lag) = matrix.dim();
    if n_epochs == 0 || n_lag == 0 {
        return Err(StretchError::EmptyMatrix { n_epochs, n_lag });
    }
    let rows = n_epochs as f64;
    Ok(matrix.map_axis(Axis(0), |col| {
        col.iter().filter(|v| !v.is_nan()).sum::<f64>() / rows
    }))
}

/// Largest `span / interval` ratio accepted by [`interval_references`] (2^52).
const MAX_EDGES: f64 = 4_503_599_627_370_496.0;

/// Build one reference per time interval by averaging the epochs inside it.
///
/// `times[e]` is the acquisition time of row `e` in any unit; `interval` is
/// in the same unit. Interval edges start at the earliest time and advance by
/// `interval` up to the latest. With a `break_point`, edges instead run
/// backward from the last time at or before the break point down to the first
/// time strictly before it, and forward from the break point itself, so no
/// interval straddles it. When no time lies strictly before the break point
/// there are no backward edges.
///
/// An epoch belongs to group `g` when exactly `g` edges are at or before its
/// time. Groups are returned in ascending order, empty groups are skipped,
/// and each group mean ignores NaN samples. Edges are never materialized:
/// each epoch's group is found by binary search over the edge runs, so the
/// cost does not depend on how many intervals the time span holds.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
/// | [`StretchError::TimeCountMismatch`] | `times.len()` differs from the row count |
/// | [`StretchError::InvalidInterval`] | `interval` is not positive and finite, or the time span (break point included) holds more than 2^52 intervals |
#[instrument(skip(matrix, times), fields(n_epochs = matrix.nrows()))]
pub fn interval_references(
    matrix: ArrayView2<'_, f64>,
    times: &[f64],
    interval: f64,
    break_point: Option<f64>,
) -> Result<Array2<f64>, StretchError> {
    let (n_epochs, n_lag) = matrix.dim();
    if n_epochs == 0 || n_lag == 0 {
        return Err(StretchError::EmptyMatrix { n_epochs, n_lag });
    }
    if times.len() != n_epochs {
        return Err(StretchError::TimeCountMismatch {
            n_epochs,
            n_times: times.len(),
        });
    }
    if !interval.is_finite() || interval <= 0.0 {
        return Err(StretchError::InvalidInterval { interval });
    }

    let t_min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let t_max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = break_point.map_or((t_min, t_max), |bp| (t_min.min(bp), t_max.max(bp)));
    let n_intervals = (hi - lo) / interval;
    if n_intervals.is_nan() || n_intervals > MAX_EDGES {
        return Err(StretchError::InvalidInterval { interval });
    }

    let runs = interval_edges(times, interval, break_point);
    debug!(n_edges = runs.iter().map(|r| r.len).sum::<usize>(), "interval edges built");

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (e, &t) in times.iter().enumerate() {
        let g: usize = runs.iter().map(|r| r.count_at_or_below(t)).sum();
        groups.entry(g).or_default().push(e);
    }

    let mut refs = Array2::zeros((groups.len(), n_lag));
    for (mut out, members) in refs.outer_iter_mut().zip(groups.values()) {
        for (j, v) in out.iter_mut().enumerate() {
            let (sum, count) = members
                .iter()
                .map(|&e| matrix[[e, j]])
                .filter(|x| !x.is_nan())
                .fold((0.0, 0usize), |(s, c), x| (s + x, c + 1));
            *v = if count == 0 { f64::NAN } else { sum / count as f64 };
        }
    }
    debug!(n_refs = refs.nrows(), "interval references built");
    Ok(refs)
}

/// Evenly spaced edges `anchor ± k * interval`, `k` in `first_k..first_k + len`,
/// indexed in ascending order.
#[derive(Debug, Clone, Copy)]
struct EdgeRun {
    anchor: f64,
    interval: f64,
    first_k: usize,
    len: usize,
    descending: bool,
}

impl EdgeRun {
    fn edge(&self, j: usize) -> f64 {
        if self.descending {
            self.anchor - (self.first_k + self.len - 1 - j) as f64 * self.interval
        } else {
            self.anchor + (self.first_k + j) as f64 * self.interval
        }
    }

    fn count_at_or_below(&self, t: f64) -> usize {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.edge(mid) <= t {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

/// Number of steps `k = 0, 1, ...` from `anchor` toward `bound` that stay within it.
fn run_length(anchor: f64, bound: f64, interval: f64, descending: bool) -> usize {
    let in_range = |k: f64| {
        if descending {
            anchor - k * interval >= bound
        } else {
            anchor + k * interval <= bound
        }
    };
    if !in_range(0.0) {
        return 0;
    }
    let mut k = ((anchor - bound).abs() / interval).floor();
    while k > 0.0 && !in_range(k) {
        k -= 1.0;
    }
    while in_range(k + 1.0) {
        k += 1.0;
    }
    k as usize + 1
}

/// Ascending edge runs for [`interval_references`].
fn interval_edges(times: &[f64], interval: f64, break_point: Option<f64>) -> Vec<EdgeRun> {
    let t_max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ascending = |anchor: f64, first_k: usize| EdgeRun {
        anchor,
        interval,
        first_k,
        len: run_length(anchor, t_max, interval, false).saturating_sub(first_k),
        descending: false,
    };
    let Some(bp) = break_point else {
        let t_min = times.iter().copied().fold(f64::INFINITY, f64::min);
        return vec![ascending(t_min, 0)];
    };

    let mut runs = Vec::with_capacity(2);
    let hi = times.iter().copied().filter(|&t| t <= bp).fold(f64::NEG_INFINITY, f64::max);
    let lo = times.iter().copied().filter(|&t| t < bp).fold(f64::INFINITY, f64::min);
    if lo.is_finite() {
        runs.push(EdgeRun {
            anchor: hi,
            interval,
            first_k: 0,
            len: run_length(hi, lo, interval, true),
            descending: true,
        });
    }
    runs.push(ascending(bp, 1));
    runs
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn mean_ignores_nan_but_divides_by_all_rows() {
        let m = array![[1.0, f64::NAN], [3.0, 4.0]];
        let r = mean_reference(m.view()).unwrap();
        assert_eq!(r[0], 2.0);
        assert_eq!(r[1], 2.0);
    }

    #[test]
    fn mean_rejects_empty() {
        let m = Array2::<f64>::zeros((0, 4));
        assert!(matches!(
            mean_reference(m.view()),
            Err(StretchError::EmptyMatrix { n_epochs: 0, n_lag: 4 })
        ));
    }

    #[test]
    fn groups_by_interval() {
        // Times 0..6, interval 2: edges 0, 2, 4, 6 -> groups {0,1}, {2,3}, {4,5}, {6}.
        let m = Array2::from_shape_fn((7, 2), |(e, j)| (e * 10 + j) as f64);
        let times: Vec<f64> = (0..7).map(f64::from).collect();
        let refs = interval_references(m.view(), &times, 2.0, None).unwrap();
        assert_eq!(refs.nrows(), 4);
        assert_eq!(refs[[0, 0]], 5.0);
        assert_eq!(refs[[1, 1]], 26.0);
        assert_eq!(refs[[3, 0]], 60.0);
    }

    fn edges(times: &[f64], interval: f64, break_point: Option<f64>) -> Vec<f64> {
        interval_edges(times, interval, break_point)
            .iter()
            .flat_map(|r| (0..r.len).map(move |j| r.edge(j)))
            .collect()
    }

    #[test]
    fn edges_span_the_times() {
        assert_eq!(edges(&[0.0, 1.0, 6.0], 2.0, None), vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(edges(&[0.5, 6.0], 2.0, None), vec![0.5, 2.5, 4.5]);
        assert_eq!(edges(&[3.0], 2.0, None), vec![3.0]);
    }

    #[test]
    fn break_point_splits_intervals() {
        // bp = 3.5: backward edges from 3 by 2 down to 0 -> 1, 3; forward 5.5.
        let times = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(edges(&times, 2.0, Some(3.5)), vec![1.0, 3.0, 5.5]);

        let m = Array2::from_shape_fn((7, 1), |(e, _)| e as f64);
        let refs = interval_references(m.view(), &times, 2.0, Some(3.5)).unwrap();
        // groups: {0}, {1,2}, {3,4,5}, {6}
        assert_eq!(refs.column(0).to_vec(), vec![0.0, 1.5, 4.0, 6.0]);
    }

    #[test]
    fn epoch_on_break_point_starts_no_backward_run() {
        // Only 3.0 is at or before bp = 3.0 and nothing is strictly before it.
        let times = [3.0, 3.0, 4.5, 6.0];
        assert_eq!(edges(&times, 2.0, Some(3.0)), vec![5.0]);

        let m = Array2::from_shape_fn((4, 1), |(e, _)| e as f64);
        let refs = interval_references(m.view(), &times, 2.0, Some(3.0)).unwrap();
        // groups: {0,1,2}, {3}
        assert_eq!(refs.column(0).to_vec(), vec![1.0, 3.0]);
    }

    #[test]
    fn backward_run_stops_at_first_earlier_time() {
        // hi = 4 (on bp), lo = 1.5 (< bp): backward edges 2, 4; forward 6.
        let times = [1.5, 4.0, 5.0, 7.0];
        assert_eq!(edges(&times, 2.0, Some(4.0)), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn fine_interval_groups_each_epoch_alone() {
        // 199 / 1e-5 edges: the grouping must not walk them one by one.
        let times: Vec<f64> = (0..200).map(f64::from).collect();
        let m = Array2::from_shape_fn((200, 3), |(e, j)| (e * 3 + j) as f64);
        let refs = interval_references(m.view(), &times, 1e-5, None).unwrap();
        assert_eq!(refs.dim(), (200, 3));
        assert_eq!(refs, m);

        let refs = interval_references(m.view(), &times, 1e-5, Some(99.5)).unwrap();
        assert_eq!(refs.dim(), (200, 3));
    }

    #[test]
    fn rejects_interval_too_fine_for_the_span() {
        let m = Array2::<f64>::zeros((2, 4));
        assert!(matches!(
            interval_references(m.view(), &[0.0, 199.0], 1e-300, None),
            Err(StretchError::InvalidInterval { .. })
        ));
        assert!(matches!(
            interval_references(m.view(), &[0.0, 1.0], 1.0, Some(f64::INFINITY)),
            Err(StretchError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn group_mean_skips_nan() {
        let m = array![[f64::NAN, 1.0], [2.0, 3.0]];
        let refs = interval_references(m.view(), &[0.0, 0.5], 10.0, None).unwrap();
        assert_eq!(refs.nrows(), 1);
        assert_eq!(refs[[0, 0]], 2.0);
        assert_eq!(refs[[0, 1]], 2.0);
    }

    #[test]
    fn rejects_bad_inputs() {
        let m = Array2::<f64>::zeros((3, 4));
        assert!(matches!(
            interval_references(m.view(), &[0.0, 1.0], 1.0, None),
            Err(StretchError::TimeCountMismatch { n_epochs: 3, n_times: 2 })
        ));
        assert!(matches!(
            interval_references(m.view(), &[0.0, 1.0, 2.0], 0.0, None),
            Err(StretchError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn reference_set_iterates_rows() {
        let m = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let set = ReferenceSet::from(&m);
        assert_eq!(set.len(), 3);
        assert_eq!(set.n_lag(), 2);
        let firsts: Vec<f64> = set.iter().map(|r| r[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 5.0]);

        let r = array![7.0, 8.0];
        let set = ReferenceSet::from(&r);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().count(), 1);
    }
}
