//! State shared by every job while it runs.

use std::sync::Arc;

use fmkit_core::{Location, Vfs};
use fmkit_monitor::{ChangeKind, MonitorHandle, MonitorRegistry};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::counter::DeepCounter;
use crate::listener::{ErrorAction, JobListener};
use crate::progress::{JobProgress, ProgressUnit};
use crate::JobError;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// Every root was processed successfully.
    Finished,
    /// The run stopped early, either on a failure or on cancellation.
    /// [`JobSummary::cancelled`] tells the two apart.
    Stopped,
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub outcome: JobOutcome,
    /// Work done, in `unit`.
    pub finished: u64,
    /// Work counted before the run, in `unit`.
    pub total: u64,
    pub unit: ProgressUnit,
    /// Whether the cancellation token was triggered.
    pub cancelled: bool,
    /// Number of error events reported to the listener.
    pub errors: usize,
}

impl JobSummary {
    /// Check if every root was processed.
    pub fn is_success(&self) -> bool {
        self.outcome == JobOutcome::Finished
    }
}

/// What a job needs before it starts: a filesystem, the registry that
/// receives synthetic events, the roots and the cancellation token.
pub(crate) struct JobSetup {
    pub vfs: Arc<dyn Vfs>,
    pub registry: MonitorRegistry,
    pub roots: Vec<Location>,
    pub token: CancellationToken,
}

impl JobSetup {
    pub fn new(vfs: Arc<dyn Vfs>, registry: MonitorRegistry, roots: Vec<Location>) -> Self {
        Self {
            vfs,
            registry,
            roots,
            token: CancellationToken::new(),
        }
    }

    /// Run the pre-run phase and build the per-run context.
    pub fn prepare<'a>(
        &'a self,
        listener: &'a mut dyn JobListener,
        unit: ProgressUnit,
        deep: bool,
    ) -> JobContext<'a> {
        let total = if deep {
            DeepCounter::new(self.vfs.as_ref()).total(&self.roots, unit)
        } else {
            self.roots.len() as u64
        };
        tracing::debug!("job prepared: {} roots, total {} {}", self.roots.len(), total, unit);

        let mut progress = JobProgress::new(unit);
        progress.set_total(total);
        listener.prepared(total);

        JobContext {
            vfs: self.vfs.as_ref(),
            registry: &self.registry,
            token: &self.token,
            listener,
            progress,
            errors: 0,
            active: None,
        }
    }
}

/// Per-run state threaded through a walk.
pub(crate) struct JobContext<'a> {
    pub vfs: &'a dyn Vfs,
    pub registry: &'a MonitorRegistry,
    token: &'a CancellationToken,
    listener: &'a mut dyn JobListener,
    progress: JobProgress,
    errors: usize,
    /// Synthetic monitor of the directory containing the entry being processed.
    active: Option<MonitorHandle>,
}

impl JobContext<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn current_file(&mut self, display_name: &str) {
        tracing::trace!("processing {}", display_name);
        self.listener.current_file(display_name);
    }

    pub fn advance(&mut self, amount: u64) {
        self.progress.advance(amount);
        self.listener.percent(self.progress.ratio());
    }

    /// Report an error to the listener. An `Abort` answer cancels the job.
    pub fn report(&mut self, error: JobError, fatal: bool) {
        tracing::warn!("{}", error);
        self.errors += 1;
        if self.listener.error(&error, fatal) == ErrorAction::Abort {
            tracing::debug!("listener aborted the job");
            self.token.cancel();
        }
    }

    /// Make `monitor` the active synthetic monitor, returning the previous one.
    pub fn install(&mut self, monitor: Option<MonitorHandle>) -> Option<MonitorHandle> {
        std::mem::replace(&mut self.active, monitor)
    }

    /// Emit a synthetic event on the active monitor, if any.
    pub fn emit_on_active(&self, kind: ChangeKind, location: &Location) {
        if let Some(monitor) = &self.active {
            monitor.emit_synthetic(kind, location.clone());
        }
    }

    /// Reuse the monitor someone already holds for a non-native directory.
    /// Native directories get their events from the OS.
    pub fn existing_monitor(&self, directory: &Location) -> Option<MonitorHandle> {
        if directory.is_native() {
            None
        } else {
            self.registry.lookup_existing(directory)
        }
    }

    /// Walk the roots in order, installing the parent's monitor around each.
    ///
    /// Stops at the first root for which `process` returns `false`;
    /// cancellation is checked before every root. A finished run with a
    /// zero total reports a final ratio of 1.0.
    pub fn run_roots(
        mut self,
        roots: &[Location],
        mut process: impl FnMut(&mut Self, &Location) -> bool,
    ) -> JobSummary {
        let mut outcome = JobOutcome::Finished;

        for root in roots {
            if self.is_cancelled() {
                outcome = JobOutcome::Stopped;
                break;
            }

            let parent_monitor = root
                .parent()
                .and_then(|parent| self.existing_monitor(&parent));
            let previous = self.install(parent_monitor);
            let ok = process(&mut self, root);
            self.install(previous);

            if !ok {
                outcome = JobOutcome::Stopped;
                break;
            }
        }

        if outcome == JobOutcome::Finished && self.progress.total() == 0 {
            // Nothing was counted, so no advance ever reached 1.0.
            self.listener.percent(1.0);
        }

        let summary = JobSummary {
            outcome,
            finished: self.progress.finished(),
            total: self.progress.total(),
            unit: self.progress.unit(),
            cancelled: self.is_cancelled(),
            errors: self.errors,
        };
        tracing::debug!(
            "job done: {:?}, {}/{} {}, {} errors",
            summary.outcome,
            summary.finished,
            summary.total,
            summary.unit,
            summary.errors
        );
        summary
    }
}
