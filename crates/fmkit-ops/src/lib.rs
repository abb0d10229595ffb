//! Recursive file-operation jobs for fmkit.
//!
//! A job walks a list of roots depth-first and applies one mutation to
//! every entry: [`ChangeAttrJob`] changes owner, group and permission
//! bits, [`DeleteJob`] removes everything. Jobs run synchronously on the
//! calling thread, report progress through a [`JobListener`], stop at
//! cooperative cancellation checkpoints, and inject synthetic change
//! events into the [`MonitorRegistry`](fmkit_monitor::MonitorRegistry)
//! for non-native locations whose watches cannot fire on their own.
//!
//! [`start_change_attr`] and [`start_delete`] run a job on the tokio
//! blocking pool and stream [`JobUpdate`]s over a channel instead.

mod change_attr;
mod counter;
mod delete;
mod error;
mod executor;
mod job;
mod listener;
mod progress;

pub use change_attr::{ChangeAttrJob, ChangeAttrOptions, ChangeAttrOptionsBuilder, ModeChange};
pub use counter::DeepCounter;
pub use delete::DeleteJob;
pub use error::JobError;
pub use executor::{JobErrorReport, JobHandle, JobUpdate, start_change_attr, start_delete};
pub use job::{JobOutcome, JobSummary};
pub use listener::{ErrorAction, JobListener, NullListener};
pub use progress::{JobProgress, ProgressUnit};

/// Default channel buffer size for job updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
