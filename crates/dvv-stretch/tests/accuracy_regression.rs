//! Accuracy regression tests for dvv-stretch.
//!
//! These tests pin the behaviour of the estimators on synthetic correlation
//! functions with known stretches, shifts, and reference offsets.

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use dvv_stretch::{
    ErrorKind, MultiReferenceConfig, ShiftConfig, Sides, StretchConfig, StretchError, TimeWindow,
    WindowWidth, time_shift_apply, time_stretch_apply, time_windows,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Symmetric coda-like waveform centered on the middle sample, vanishing at the ends.
fn coda_at(t: f64, width: f64) -> f64 {
    (-(t / width).powi(2)).exp() * ((0.3 * t).cos() + 0.6 * (0.17 * t).cos())
}

fn centered_axis(n: usize) -> Vec<f64> {
    let c = (n as f64 - 1.0) / 2.0;
    (0..n).map(|i| i as f64 - c).collect()
}

fn coda(n: usize, width: f64) -> Array1<f64> {
    Array1::from_iter(centered_axis(n).into_iter().map(|t| coda_at(t, width)))
}

/// Rows `f(t * exp(-s_e))`: the waveform with its time axis dilated by `exp(s_e)`.
fn dilated(n: usize, width: f64, stretches: &[f64]) -> Array2<f64> {
    let t = centered_axis(n);
    Array2::from_shape_fn((stretches.len(), n), |(e, i)| {
        coda_at(t[i] * (-stretches[e]).exp(), width)
    })
}

fn max_abs(a: &[f64]) -> f64 {
    a.iter().fold(0.0, |m, v| m.max(v.abs()))
}

// ---------------------------------------------------------------------------
// a) zero_stretch_identity
// ---------------------------------------------------------------------------

/// A trace compared with itself has factor exactly 0 and correlation 1.
#[test]
fn zero_stretch_identity() {
    let r = coda(201, 35.0);
    let m = r.clone().insert_axis(Axis(0));
    for sides in [Sides::Both, Sides::Left, Sides::Right] {
        let out = StretchConfig::new(0.02, 101)
            .unwrap()
            .with_sides(sides)
            .estimate(m.view(), Some(r.view()))
            .unwrap();
        assert_eq!(out.factor[[0, 0]], 0.0, "{sides}");
        assert!((out.corr[[0, 0]] - 1.0).abs() < 1e-12, "{sides}: {}", out.corr[[0, 0]]);
    }
}

// ---------------------------------------------------------------------------
// b) concrete_scenario_10x201
// ---------------------------------------------------------------------------

/// 10 x 201 random matrix, reference = row 0, range 0.02, 101 steps, one
/// window covering every sample on both sides.
#[test]
fn concrete_scenario_10x201() {
    let mut rng = ChaCha8Rng::seed_from_u64(201);
    let m = Array2::from_shape_fn((10, 201), |_| rng.random_range(-1.0_f64..1.0));

    // Center 100, relative 0..=100 mirrored: positions 0..=200.
    let window = TimeWindow::span(0, 101);
    let out = StretchConfig::new(0.02, 101)
        .unwrap()
        .with_windows(vec![window])
        .estimate(m.view(), Some(m.row(0)))
        .unwrap();

    assert_eq!(out.n_windows(), 1);
    assert_eq!(out.corr_in(0).len(), 10);
    assert_eq!(out.factor_in(0).len(), 10);
    assert_eq!(out.factors.len(), 101);
    assert_eq!(out.factor[[0, 0]], 0.0);
    assert!((out.corr[[0, 0]] - 1.0).abs() < 1e-12, "row 0: {}", out.corr[[0, 0]]);
    assert!(out.corr.iter().all(|c| (-1.0..=1.0).contains(c)));
}

// ---------------------------------------------------------------------------
// c) factor_recovery_is_monotonic
// ---------------------------------------------------------------------------

/// A dilation by `exp(s0)` is recovered as `-s0` within one grid step, and
/// larger dilations give smaller estimates.
#[test]
fn factor_recovery_is_monotonic() {
    let s0: Vec<f64> = (0..11).map(|k| -0.02 + 0.004 * k as f64).collect();
    let n = 301;
    let reference = coda(n, 50.0);
    let observed = dilated(n, 50.0, &s0.iter().map(|s| -s).collect::<Vec<_>>());

    let config = StretchConfig::new(0.03, 201).unwrap();
    let out = config.estimate(observed.view(), Some(reference.view())).unwrap();
    let delta = out.delta();
    assert!((delta - 0.0003).abs() < 1e-12);

    for (e, &s) in s0.iter().enumerate() {
        let got = out.factor[[e, 0]];
        assert!((got + s).abs() <= delta + 1e-12, "s0 = {s}: estimated {got}");
    }
    for e in 1..s0.len() {
        assert!(out.factor[[e, 0]] < out.factor[[e - 1, 0]]);
    }
}

/// Stretching a reference with `time_stretch_apply(ref, s)` is estimated as `+s`.
#[test]
fn applied_stretch_is_estimated_with_same_sign() {
    let n = 301;
    let reference = coda(n, 50.0);
    let stretches = Array1::from(vec![-0.012, -0.003, 0.0, 0.0075, 0.015]);
    let batch = Array2::from_shape_fn((5, n), |(_, j)| reference[j]);
    let observed = time_stretch_apply(batch.view(), &stretches, false).unwrap();

    let out = StretchConfig::new(0.03, 201)
        .unwrap()
        .estimate(observed.view(), Some(reference.view()))
        .unwrap();
    for (e, &s) in stretches.iter().enumerate() {
        assert!((out.factor[[e, 0]] - s).abs() <= out.delta() + 1e-12, "epoch {e}");
    }
}

// ---------------------------------------------------------------------------
// d) sides_agree_for_symmetric_traces
// ---------------------------------------------------------------------------

/// Left and right side searches agree on traces symmetric about the center.
#[test]
fn sides_agree_for_symmetric_traces() {
    let stretches = [-0.01, -0.004, 0.0, 0.006, 0.011];
    let m = dilated(201, 40.0, &stretches);
    let reference = coda(201, 40.0);
    let windows = time_windows(&[5, 30], &WindowWidth::Uniform(40)).unwrap();

    let run = |sides: Sides| {
        StretchConfig::new(0.02, 81)
            .unwrap()
            .with_sides(sides)
            .with_windows(windows.clone())
            .estimate(m.view(), Some(reference.view()))
            .unwrap()
    };
    let left = run(Sides::Left);
    let right = run(Sides::Right);
    for e in 0..stretches.len() {
        for w in 0..2 {
            assert!((left.factor[[e, w]] - right.factor[[e, w]]).abs() < 1e-12);
            assert!((left.corr[[e, w]] - right.corr[[e, w]]).abs() < 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// e) transforms_round_trip
// ---------------------------------------------------------------------------

/// Stretching by `v` then by `-v` restores the trace away from the edges.
#[test]
fn stretch_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n = 401;
    let base = coda(n, 60.0);
    let x = Array2::from_shape_fn((8, n), |(_, j)| base[j]);
    let v = Array1::from_iter((0..8).map(|_| rng.random_range(-0.02..0.02)));

    let there = time_stretch_apply(x.view(), &v, false).unwrap();
    let back = time_stretch_apply(there.view(), &v.mapv(|s| -s), false).unwrap();

    for e in 0..8 {
        let row = x.row(e);
        let err: Vec<f64> = (50..n - 50).map(|i| back[[e, i]] - row[i]).collect();
        let scale = max_abs(row.as_slice().unwrap());
        assert!(max_abs(&err) / scale < 1e-3, "trace {e}");
    }
}

/// Shifting by `v` then by `-v` restores the trace away from the edges.
#[test]
fn shift_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let n = 256;
    let base = coda(n, 30.0);
    let x = Array2::from_shape_fn((8, n), |(_, j)| base[j]);
    let v = Array1::from_iter((0..8).map(|_| rng.random_range(-3.0..3.0)));

    let there = time_shift_apply(x.view(), &v).unwrap();
    let back = time_shift_apply(there.view(), &v.mapv(|s| -s)).unwrap();

    for e in 0..8 {
        let row = x.row(e);
        let err: Vec<f64> = (20..n - 20).map(|i| back[[e, i]] - row[i]).collect();
        let scale = max_abs(row.as_slice().unwrap());
        assert!(max_abs(&err) / scale < 1e-3, "trace {e}");
    }
}

/// A shift applied with `time_shift_apply` is recovered by the shift estimator.
#[test]
fn applied_shift_is_estimated() {
    let n = 256;
    let reference = coda(n, 30.0);
    let shifts = Array1::from(vec![-2.0, 0.0, 1.5]);
    let batch = Array2::from_shape_fn((3, n), |(_, j)| reference[j]);
    let observed = time_shift_apply(batch.view(), &shifts).unwrap();

    let out = ShiftConfig::new(4.0, 81)
        .unwrap()
        .with_single_sided(true)
        .estimate(observed.view(), Some(reference.view()))
        .unwrap();
    for (e, &s) in shifts.iter().enumerate() {
        assert!((out.factor[[e, 0]] - s).abs() <= 0.1 + 1e-9, "epoch {e}: {}", out.factor[[e, 0]]);
    }
}

// ---------------------------------------------------------------------------
// f) multi_reference_consistency
// ---------------------------------------------------------------------------

/// References offset by {0, 0.01, -0.01} are reconciled to those offsets and
/// the combined curve follows the true stretches.
#[test]
fn multi_reference_consistency() {
    let n = 401;
    let width = 70.0;
    let offsets = [0.0, 0.01, -0.01];
    let config = MultiReferenceConfig::new(0.03, 121).unwrap();
    let delta = 0.0005;

    let references = dilated(n, width, &offsets);
    let truth: Vec<f64> = (0..24).map(|e| (e as f64 - 12.0) * delta).collect();
    let mut observed = dilated(n, width, &truth);
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    observed.mapv_inplace(|x| x + rng.random_range(-0.06..0.06));

    let out = config.estimate_and_align(observed.view(), &references).unwrap();

    assert_eq!(out.offsets.len(), 3);
    assert!(out.offsets.sum().abs() < 1e-12);
    for (i, &c) in offsets.iter().enumerate() {
        assert!(
            (out.offsets[i] - c).abs() <= delta,
            "reference {i}: offset {} expected {c}",
            out.offsets[i]
        );
    }

    let combined = out.result.factor_in(0);
    let mean_err = combined
        .iter()
        .zip(&truth)
        .map(|(got, want)| (got - want).abs())
        .sum::<f64>()
        / truth.len() as f64;
    assert!(mean_err <= 2.0 * delta, "mean error {mean_err}");
    for &c in out.result.corr_in(0) {
        assert!(c > 0.9 && c < 0.999);
    }
}

/// Each reference's own estimate is biased by its offset.
#[test]
fn panel_entries_are_biased_by_reference_offset() {
    let n = 401;
    let offsets = [0.0, 0.01];
    let references = dilated(n, 70.0, &offsets);
    let observed = dilated(n, 70.0, &[0.004]);

    let panel = MultiReferenceConfig::new(0.03, 121)
        .unwrap()
        .estimate_panel(observed.view(), &references)
        .unwrap();
    assert_eq!(panel.len(), 2);
    let d0 = panel.get(0).unwrap().factor[[0, 0]];
    let d1 = panel.get(1).unwrap().factor[[0, 0]];
    assert!((d0 - 0.004).abs() <= 0.0005);
    assert!((d1 + 0.006).abs() <= 0.0005);
}

// ---------------------------------------------------------------------------
// g) degenerate inputs
// ---------------------------------------------------------------------------

/// An empty window yields zero correlation for every epoch.
#[test]
fn empty_window_gives_zero_correlation() {
    let m = dilated(101, 25.0, &[0.0, 0.01, -0.01]);
    let out = StretchConfig::new(0.02, 21)
        .unwrap()
        .with_windows(vec![TimeWindow::new(Vec::new())])
        .estimate(m.view(), None)
        .unwrap();
    for e in 0..3 {
        assert_eq!(out.corr[[e, 0]], 0.0);
    }
}

/// Reconciliation is not defined for a single reference.
#[test]
fn single_reference_is_unsupported() {
    let m = dilated(101, 25.0, &[0.0, 0.01]);
    let reference = coda(101, 25.0);
    let config = MultiReferenceConfig::new(0.02, 21).unwrap();

    let panel = config.estimate_panel(m.view(), &reference).unwrap();
    assert_eq!(panel.len(), 1);
    let err = panel.reconcile().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);

    let err = config.estimate_and_align(m.view(), &reference).unwrap_err();
    assert!(matches!(err, StretchError::TooFewReferences { n_ref: 1 }));
}

/// NaN epochs propagate without disturbing the others.
#[test]
fn nan_epoch_is_isolated() {
    let mut m = dilated(101, 25.0, &[0.0, 0.005]);
    m[[1, 40]] = f64::NAN;
    let reference = coda(101, 25.0);
    let out = StretchConfig::new(0.02, 41)
        .unwrap()
        .estimate(m.view(), Some(reference.view()))
        .unwrap();
    assert_eq!(out.factor[[0, 0]], 0.0);
    assert!(out.corr[[1, 0]].is_nan());
    assert!(out.factor[[1, 0]].is_nan());
}

/// Window widths must match window starts.
#[test]
fn width_list_must_match_starts() {
    let err = time_windows(&[0, 10, 20], &WindowWidth::PerWindow(vec![5, 5])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
