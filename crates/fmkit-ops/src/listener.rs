//! Job event callbacks.

use serde::{Deserialize, Serialize};

use crate::JobError;

/// How a listener wants a job to react to an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorAction {
    /// Keep going where the job's own policy allows it.
    #[default]
    Continue,
    /// Cancel the job.
    Abort,
}

/// Receives a job's events, in the order the filesystem calls complete.
///
/// Every method has a no-op default. Callbacks run on the job's thread and
/// block it; keep them short.
pub trait JobListener: Send {
    /// The pre-run phase finished and `total` units of work were found.
    fn prepared(&mut self, _total: u64) {}

    /// The job started processing an entry.
    fn current_file(&mut self, _display_name: &str) {}

    /// Progress ratio in `0.0..=1.0`.
    ///
    /// When the pre-run count is zero (a tree of empty files, say) every
    /// ratio is 0.0 until a finished run reports 1.0 once at the end.
    fn percent(&mut self, _ratio: f64) {}

    /// An entry failed.
    ///
    /// Returning [`ErrorAction::Abort`] cancels the job. Returning
    /// [`ErrorAction::Continue`] does not override the job's own policy:
    /// an attribute-change job still stops after any failure even when the
    /// error is reported as non-fatal.
    fn error(&mut self, _error: &JobError, _fatal: bool) -> ErrorAction {
        ErrorAction::Continue
    }
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl JobListener for NullListener {}
