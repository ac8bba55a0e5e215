//! Identity and time-window helpers shared by every diagnostic.

use crate::error::DiagResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of a diagnostic: where its data lives, which shot it belongs to and what
/// kind of diagnostic it is.
///
/// The type tag is fixed when the diagnostic is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticInfo {
    path: PathBuf,
    shot: u32,
    kind: &'static str,
}

impl DiagnosticInfo {
    /// Create the identity of a diagnostic of type `kind`.
    pub fn new(path: impl Into<PathBuf>, shot: u32, kind: &'static str) -> Self {
        Self {
            path: path.into(),
            shot,
            kind,
        }
    }

    /// Directory holding the acquisition data.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shot number.
    pub fn shot(&self) -> u32 {
        self.shot
    }

    /// Type tag, e.g. `"Probe"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

/// A diagnostic with an activity flag and a sampled time axis.
pub trait Diagnostic {
    /// Identity of this diagnostic.
    fn info(&self) -> &DiagnosticInfo;

    /// Whether the diagnostic was active during the shot.
    fn is_active(&mut self) -> DiagResult<bool>;

    /// Time axis in seconds, if data is available.
    fn time(&mut self) -> DiagResult<Option<Arc<[f64]>>>;

    /// Human-readable activity report, e.g. `"Diagnostic Probe is active."`.
    fn status(&mut self) -> DiagResult<String> {
        let state = if self.is_active()? {
            "active"
        } else {
            "inactive"
        };
        Ok(format!("Diagnostic {} is {state}.", self.info().kind()))
    }

    /// Indices of the samples closest to `start_time` and `end_time`.
    ///
    /// Bounds are not validated: times outside the series resolve to the first or last
    /// sample. Returns `None` when no time axis is available.
    fn time_indices(&mut self, start_time: f64, end_time: f64) -> DiagResult<Option<(usize, usize)>> {
        let Some(time) = self.time()? else {
            return Ok(None);
        };
        Ok(nearest_index(&time, start_time).zip(nearest_index(&time, end_time)))
    }
}

/// Index of the element of `series` closest to `target`.
///
/// Ties resolve to the lowest index. Returns `None` for an empty series.
pub fn nearest_index(series: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in series.iter().enumerate() {
        let distance = (value - target).abs();
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((idx, distance));
        }
    }
    best.map(|(idx, _)| idx)
}
