//! Recursive deletion.

use std::sync::Arc;

use fmkit_core::{FileInfo, Location, Vfs};
use fmkit_monitor::{ChangeKind, MonitorHandle, MonitorRegistry};
use tokio_util::sync::CancellationToken;

use crate::job::{JobContext, JobSetup};
use crate::listener::JobListener;
use crate::progress::ProgressUnit;
use crate::{JobError, JobSummary};

/// A directory whose children are being deleted.
struct Frame {
    dir: Location,
    children: std::vec::IntoIter<FileInfo>,
    saved: Option<MonitorHandle>,
}

enum Entered {
    /// The entry was a directory; its frame is on the stack.
    Opened,
    /// The entry was deleted (or failed to be).
    Done(bool),
    /// Cancelled before anything was deleted.
    Cancelled,
}

/// Deletes everything under a set of roots, children before parents.
///
/// Progress is measured in bytes. A failure on a root stops the run; a
/// failure inside a tree is reported and the walk moves on to the next
/// sibling, so a directory whose children could not all be removed fails
/// its own delete.
pub struct DeleteJob {
    setup: JobSetup,
}

impl DeleteJob {
    pub fn new(vfs: Arc<dyn Vfs>, registry: MonitorRegistry, roots: Vec<Location>) -> Self {
        Self {
            setup: JobSetup::new(vfs, registry, roots),
        }
    }

    /// Token that cancels this job. Clone it before calling [`run`](Self::run).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.setup.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.setup.token.is_cancelled()
    }

    /// Run the job on the current thread.
    pub fn run(self, listener: &mut dyn JobListener) -> JobSummary {
        let ctx = self.setup.prepare(listener, ProgressUnit::Bytes, true);
        ctx.run_roots(&self.setup.roots, process_root)
    }
}

fn process_root(ctx: &mut JobContext<'_>, root: &Location) -> bool {
    let info = match ctx.vfs.query_info(root) {
        Ok(info) => info,
        Err(source) => {
            ctx.report(
                JobError::Query {
                    location: root.clone(),
                    source,
                },
                true,
            );
            return false;
        }
    };

    let mut stack = Vec::new();
    match enter(ctx, root, &info, &mut stack) {
        Entered::Opened => {}
        Entered::Done(ok) => return ok,
        Entered::Cancelled => return false,
    }

    loop {
        let next = match stack.last_mut() {
            None => return false,
            Some(frame) => frame
                .children
                .next()
                .map(|child| (frame.dir.child(child.name.as_str()), child)),
        };

        match next {
            Some((location, info)) => {
                if ctx.is_cancelled() {
                    unwind(ctx, stack);
                    return false;
                }
                // A child's own result does not stop its siblings.
                if let Entered::Cancelled = enter(ctx, &location, &info, &mut stack) {
                    unwind(ctx, stack);
                    return false;
                }
            }
            None => {
                let Some(frame) = stack.pop() else {
                    return false;
                };
                ctx.install(frame.saved);
                let ok = delete_entry(ctx, &frame.dir);
                if stack.is_empty() {
                    return ok;
                }
            }
        }
    }
}

/// Account for an entry, then delete it or open it as a directory.
fn enter(
    ctx: &mut JobContext<'_>,
    location: &Location,
    info: &FileInfo,
    stack: &mut Vec<Frame>,
) -> Entered {
    ctx.current_file(&info.display_name);
    ctx.advance(info.accounted_size());

    if ctx.is_cancelled() {
        return Entered::Cancelled;
    }

    if !info.is_dir() {
        return Entered::Done(delete_entry(ctx, location));
    }

    let children = match ctx.vfs.read_dir(location) {
        Ok(children) => children,
        Err(source) => {
            ctx.report(
                JobError::Enumerate {
                    location: location.clone(),
                    source,
                },
                false,
            );
            Vec::new()
        }
    };

    let monitor = ctx.existing_monitor(location);
    let saved = ctx.install(monitor);
    stack.push(Frame {
        dir: location.clone(),
        children: children.into_iter(),
        saved,
    });
    Entered::Opened
}

fn delete_entry(ctx: &mut JobContext<'_>, location: &Location) -> bool {
    match ctx.vfs.delete(location) {
        Ok(()) => {
            ctx.emit_on_active(ChangeKind::Deleted, location);
            true
        }
        Err(source) => {
            ctx.report(
                JobError::Delete {
                    location: location.clone(),
                    source,
                },
                false,
            );
            false
        }
    }
}

fn unwind(ctx: &mut JobContext<'_>, mut stack: Vec<Frame>) {
    while let Some(frame) = stack.pop() {
        ctx.install(frame.saved);
    }
}
