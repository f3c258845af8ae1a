//! Time windows: sample-index sets relative to the zero-lag sample.

use std::ops::Range;

use crate::error::StretchError;

/// An ordered set of sample indices, counted from the zero-lag sample.
///
/// How the indices map onto absolute trace positions depends on the
/// [`Sides`](crate::Sides) selector used during the similarity search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow(Vec<isize>);

impl TimeWindow {
    /// Create a window from explicit relative indices.
    ///
    /// An empty window is allowed; it masks every sample and yields zero similarity.
    #[must_use]
    pub fn new(indices: Vec<isize>) -> Self {
        Self(indices)
    }

    /// Create the window `[start, start + width)`.
    #[must_use]
    pub fn span(start: isize, width: usize) -> Self {
        Self((start..start + width as isize).collect())
    }

    /// Return the relative indices.
    #[must_use]
    pub fn indices(&self) -> &[isize] {
        &self.0
    }

    /// Return the number of indices in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return true if the window contains no indices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Range<isize>> for TimeWindow {
    fn from(range: Range<isize>) -> Self {
        Self(range.collect())
    }
}

/// Width specification for [`time_windows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowWidth {
    /// One width shared by every window.
    Uniform(usize),
    /// One width per window start.
    PerWindow(Vec<usize>),
}

/// Build one window `[start, start + width)` per start index.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StretchError::WidthCountMismatch`] | `PerWindow` widths and `starts` differ in length |
pub fn time_windows(starts: &[isize], width: &WindowWidth) -> Result<Vec<TimeWindow>, StretchError> {
    match width {
        WindowWidth::Uniform(w) => Ok(starts.iter().map(|&s| TimeWindow::span(s, *w)).collect()),
        WindowWidth::PerWindow(widths) => {
            if widths.len() != starts.len() {
                return Err(StretchError::WidthCountMismatch {
                    n_starts: starts.len(),
                    n_widths: widths.len(),
                });
            }
            Ok(starts
                .iter()
                .zip(widths)
                .map(|(&s, &w)| TimeWindow::span(s, w))
                .collect())
        }
    }
}

/// Default window: the whole causal half, `[0, n_lag / 2)`.
pub(crate) fn default_windows(n_lag: usize) -> Vec<TimeWindow> {
    vec![TimeWindow::span(0, n_lag / 2)]
}
