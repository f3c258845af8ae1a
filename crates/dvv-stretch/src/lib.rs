//! Stretching-based estimation of relative seismic velocity changes (dv/v).
//!
//! Pure math library, zero I/O. Resamples a reference correlation function
//! over a grid of trial stretches (or time shifts), finds the best match for
//! every epoch of a correlation matrix per time window, reconciles estimates
//! made against several references, and applies known stretches or shifts to
//! traces.

mod apply;
mod average;
mod config;
mod error;
mod estimate;
mod grid;
mod multiref;
mod reference;
mod result;
mod similarity;
mod spline;
mod taper;
mod window;

pub use apply::{PerTraceValues, time_shift_apply, time_stretch_apply};
pub use average::{WeightedAverage, weighted_average};
pub use config::{MultiReferenceConfig, ShiftConfig, StretchConfig};
pub use error::{ErrorKind, StretchError};
pub use grid::{GridMode, StretchGrid};
pub use multiref::{MultiReferencePanel, PairOffset, pair_offset, reconcile};
pub use reference::{ReferenceSet, interval_references, mean_reference};
pub use result::{EstimateKind, EstimationResult, ReconciledResult};
pub use similarity::{SearchOutcome, Sides, search};
pub use spline::CubicSpline;
pub use taper::cosine_taper;
pub use window::{TimeWindow, WindowWidth, time_windows};
