//! Single-reference stretch and time-shift estimation.
//!
//! Builds the trial grid from the reference, runs the windowed similarity
//! search, and packages the best matches.

use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::{info, instrument};

use crate::config::{ShiftConfig, StretchConfig};
use crate::error::StretchError;
use crate::grid::{GridMode, StretchGrid};
use crate::reference::mean_reference;
use crate::result::{EstimateKind, EstimationResult};
use crate::similarity::{SearchOutcome, Sides, search};
use crate::taper::tapered_rows;
use crate::window::{TimeWindow, default_windows};

/// Use the given reference or fall back to the mean of all rows.
fn resolve_reference(
    matrix: ArrayView2<'_, f64>,
    reference: Option<ArrayView1<'_, f64>>,
) -> Result<Array1<f64>, StretchError> {
    let (n_epochs, n_lag) = matrix.dim();
    if n_epochs == 0 || n_lag == 0 {
        return Err(StretchError::EmptyMatrix { n_epochs, n_lag });
    }
    match reference {
        Some(r) if r.len() != n_lag => Err(StretchError::LagLengthMismatch {
            expected: n_lag,
            got: r.len(),
        }),
        Some(r) => Ok(r.to_owned()),
        None => mean_reference(matrix),
    }
}

fn resolve_windows(windows: Option<&[TimeWindow]>, n_lag: usize) -> Vec<TimeWindow> {
    windows.map_or_else(|| default_windows(n_lag), <[TimeWindow]>::to_vec)
}

fn into_result(
    kind: EstimateKind,
    outcome: SearchOutcome,
    grid: &StretchGrid,
    keep_similarity: bool,
) -> EstimationResult {
    EstimationResult {
        kind,
        corr: outcome.corr,
        factor: outcome.factor,
        factors: grid.factors().to_owned(),
        similarity: keep_similarity.then_some(outcome.similarity),
    }
}

/// Stretch estimate of every row against one reference.
///
/// The rows are compared through an owned copy carrying the same 5% taper as
/// the grid, so a row equal to the reference matches the zero factor with a
/// coefficient of exactly 1.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
/// | [`StretchError::LagLengthMismatch`] | `reference` length differs from the row length |
/// | [`StretchError::TraceTooShort`] | rows have fewer than 2 samples |
#[instrument(skip(matrix, reference, config),
             fields(n_epochs = matrix.nrows(), n_lag = matrix.ncols(), steps = config.steps))]
pub(crate) fn estimate_stretch(
    matrix: ArrayView2<'_, f64>,
    reference: Option<ArrayView1<'_, f64>>,
    config: &StretchConfig,
) -> Result<EstimationResult, StretchError> {
    let reference = resolve_reference(matrix, reference)?;
    let mode = GridMode::Stretch {
        single_sided: config.sides == Sides::Single,
    };
    let grid = StretchGrid::build(reference.view(), config.range, config.steps, mode)?;
    let windows = resolve_windows(config.windows(), matrix.ncols());

    let working = tapered_rows(matrix);
    let outcome = search(working.view(), &grid, &windows, config.sides)?;
    info!(n_windows = windows.len(), "stretch estimate complete");
    Ok(into_result(
        EstimateKind::Stretch,
        outcome,
        &grid,
        config.keep_similarity,
    ))
}

/// Time-shift estimate of every row against one reference.
///
/// Two-sided traces are searched on the left and right sides separately and
/// the correlations, shifts, and similarity cubes averaged. Rows are tapered
/// on an owned copy, as for [`estimate_stretch`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::EmptyMatrix`] | `matrix` has no rows or no columns |
/// | [`StretchError::LagLengthMismatch`] | `reference` length differs from the row length |
/// | [`StretchError::TraceTooShort`] | rows have fewer than 2 samples |
#[instrument(skip(matrix, reference, config),
             fields(n_epochs = matrix.nrows(), n_lag = matrix.ncols(), steps = config.steps))]
pub(crate) fn estimate_shift(
    matrix: ArrayView2<'_, f64>,
    reference: Option<ArrayView1<'_, f64>>,
    config: &ShiftConfig,
) -> Result<EstimationResult, StretchError> {
    let reference = resolve_reference(matrix, reference)?;
    let grid = StretchGrid::build(reference.view(), config.range, config.steps, GridMode::Shift)?;
    let windows = resolve_windows(config.windows(), matrix.ncols());

    let working = tapered_rows(matrix);
    let outcome = if config.single_sided {
        search(working.view(), &grid, &windows, Sides::Right)?
    } else {
        let left = search(working.view(), &grid, &windows, Sides::Left)?;
        let right = search(working.view(), &grid, &windows, Sides::Right)?;
        SearchOutcome {
            corr: (left.corr + right.corr) / 2.0,
            factor: (left.factor + right.factor) / 2.0,
            similarity: (left.similarity + right.similarity) / 2.0,
        }
    };
    info!(n_windows = windows.len(), single_sided = config.single_sided, "shift estimate complete");
    Ok(into_result(
        EstimateKind::Shift,
        outcome,
        &grid,
        config.keep_similarity,
    ))
}
