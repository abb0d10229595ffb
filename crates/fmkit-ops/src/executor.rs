//! Async adapters that run jobs on the blocking pool.

use std::sync::Arc;

use fmkit_core::{Location, Vfs};
use fmkit_monitor::MonitorRegistry;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::listener::{ErrorAction, JobListener};
use crate::{
    ChangeAttrJob, ChangeAttrOptions, DeleteJob, JobError, JobSummary, OPERATION_CHANNEL_SIZE,
};

/// An error event in a form that can cross the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobErrorReport {
    pub location: Location,
    pub message: String,
    pub fatal: bool,
}

impl JobErrorReport {
    fn new(error: &JobError, fatal: bool) -> Self {
        Self {
            location: error.location().clone(),
            message: error.to_string(),
            fatal,
        }
    }
}

/// Update sent through the channel while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Total work found by the pre-run phase.
    Prepared(u64),
    /// Display name of the entry being processed.
    CurrentFile(String),
    /// Progress ratio in `0.0..=1.0`.
    Percent(f64),
    /// An entry failed.
    Error(JobErrorReport),
    /// The job finished. Always the last update.
    Complete(JobSummary),
}

/// A running job: its update stream and its cancellation token.
#[derive(Debug)]
pub struct JobHandle {
    rx: mpsc::Receiver<JobUpdate>,
    token: CancellationToken,
}

impl JobHandle {
    /// Receive the next update; `None` once the job is gone.
    pub async fn recv(&mut self) -> Option<JobUpdate> {
        self.rx.recv().await
    }

    /// Drain updates until the job completes, returning its summary.
    pub async fn wait(mut self) -> Option<JobSummary> {
        while let Some(update) = self.rx.recv().await {
            if let JobUpdate::Complete(summary) = update {
                return Some(summary);
            }
        }
        None
    }

    /// Request cancellation. The job stops at its next checkpoint.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn into_receiver(self) -> mpsc::Receiver<JobUpdate> {
        self.rx
    }
}

/// Forwards listener callbacks into the update channel.
struct ChannelListener {
    tx: mpsc::Sender<JobUpdate>,
}

impl ChannelListener {
    fn send(&self, update: JobUpdate) {
        // The receiver may have been dropped; the job still runs to completion.
        let _ = self.tx.blocking_send(update);
    }
}

impl JobListener for ChannelListener {
    fn prepared(&mut self, total: u64) {
        self.send(JobUpdate::Prepared(total));
    }

    fn current_file(&mut self, display_name: &str) {
        self.send(JobUpdate::CurrentFile(display_name.to_string()));
    }

    fn percent(&mut self, ratio: f64) {
        self.send(JobUpdate::Percent(ratio));
    }

    fn error(&mut self, error: &JobError, fatal: bool) -> ErrorAction {
        self.send(JobUpdate::Error(JobErrorReport::new(error, fatal)));
        ErrorAction::Continue
    }
}

/// Start an attribute-change job on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub fn start_change_attr(
    vfs: Arc<dyn Vfs>,
    registry: MonitorRegistry,
    roots: Vec<Location>,
    options: ChangeAttrOptions,
) -> JobHandle {
    let job = ChangeAttrJob::new(vfs, registry, roots, options);
    let token = job.cancellation_token();
    spawn(token, move |listener| job.run(listener))
}

/// Start a delete job on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub fn start_delete(vfs: Arc<dyn Vfs>, registry: MonitorRegistry, roots: Vec<Location>) -> JobHandle {
    let job = DeleteJob::new(vfs, registry, roots);
    let token = job.cancellation_token();
    spawn(token, move |listener| job.run(listener))
}

fn spawn(
    token: CancellationToken,
    run: impl FnOnce(&mut dyn JobListener) -> JobSummary + Send + 'static,
) -> JobHandle {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::task::spawn_blocking(move || {
        let mut listener = ChannelListener { tx };
        let summary = run(&mut listener);
        listener.send(JobUpdate::Complete(summary));
    });

    JobHandle { rx, token }
}
