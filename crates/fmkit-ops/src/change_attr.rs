//! Owner, group and permission changes.

use std::sync::Arc;

use derive_builder::Builder;
use fmkit_core::{FileInfo, FileKind, Location, Vfs, VfsError};
use fmkit_monitor::{ChangeKind, MonitorHandle, MonitorRegistry};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::job::{JobContext, JobSetup};
use crate::listener::JobListener;
use crate::progress::ProgressUnit;
use crate::{JobError, JobSummary};

const PERMISSION_BITS: u32 = 0o7777;

/// A masked permission change: bits outside `mask` keep their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeChange {
    pub bits: u32,
    pub mask: u32,
}

impl ModeChange {
    pub fn new(bits: u32, mask: u32) -> Self {
        Self { bits, mask }
    }

    /// Replace every permission bit.
    pub fn set(bits: u32) -> Self {
        Self::new(bits, PERMISSION_BITS)
    }

    /// The mode an entry with `original` permissions ends up with.
    ///
    /// Directories also get the execute bit for every read bit that is in
    /// the mask and set in the result.
    pub fn apply(&self, original: u32, is_dir: bool) -> u32 {
        let mut mode = (original & !self.mask) | (self.bits & self.mask);
        if is_dir {
            for read in [0o400, 0o040, 0o004] {
                if self.mask & read != 0 && mode & read != 0 {
                    mode |= read >> 2;
                }
            }
        }
        mode & PERMISSION_BITS
    }
}

/// What a [`ChangeAttrJob`] changes.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct ChangeAttrOptions {
    /// New owning user.
    #[builder(default, setter(strip_option))]
    pub uid: Option<u32>,

    /// New owning group.
    #[builder(default, setter(strip_option))]
    pub gid: Option<u32>,

    /// Permission change.
    #[builder(default, setter(strip_option))]
    pub mode: Option<ModeChange>,

    /// Descend into directories.
    #[builder(default = "false")]
    pub recursive: bool,
}

impl ChangeAttrOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        let uid = self.uid.flatten();
        let gid = self.gid.flatten();
        let mode = self.mode.flatten();

        if uid.is_none() && gid.is_none() && mode.is_none() {
            return Err("Nothing to change: set uid, gid or mode".to_string());
        }
        if let Some(mode) = mode {
            if mode.mask & !PERMISSION_BITS != 0 || mode.bits & !PERMISSION_BITS != 0 {
                return Err(format!(
                    "Mode {:o} with mask {:o} is outside {:o}",
                    mode.bits, mode.mask, PERMISSION_BITS
                ));
            }
        }
        Ok(())
    }
}

impl ChangeAttrOptions {
    /// Create a new options builder.
    pub fn builder() -> ChangeAttrOptionsBuilder {
        ChangeAttrOptionsBuilder::default()
    }
}

/// An open directory: its remaining children and the monitor that was
/// active before the walk entered it.
struct Frame {
    dir: Location,
    children: std::vec::IntoIter<FileInfo>,
    saved: Option<MonitorHandle>,
}

/// Changes ownership and permissions of every entry under a set of roots.
///
/// Entries are processed parent first. The first failure stops the whole
/// run even though it is reported to the listener as non-fatal.
pub struct ChangeAttrJob {
    setup: JobSetup,
    options: ChangeAttrOptions,
}

impl ChangeAttrJob {
    pub fn new(
        vfs: Arc<dyn Vfs>,
        registry: MonitorRegistry,
        roots: Vec<Location>,
        options: ChangeAttrOptions,
    ) -> Self {
        Self {
            setup: JobSetup::new(vfs, registry, roots),
            options,
        }
    }

    /// Token that cancels this job. Clone it before calling [`run`](Self::run).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.setup.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.setup.token.is_cancelled()
    }

    pub fn options(&self) -> &ChangeAttrOptions {
        &self.options
    }

    /// Run the job on the current thread.
    pub fn run(self, listener: &mut dyn JobListener) -> JobSummary {
        let ctx = self
            .setup
            .prepare(listener, ProgressUnit::Entries, self.options.recursive);
        ctx.run_roots(&self.setup.roots, |ctx, root| self.process_root(ctx, root))
    }

    fn process_root(&self, ctx: &mut JobContext<'_>, root: &Location) -> bool {
        let mut stack = Vec::new();
        if !self.process_entry(ctx, root, None, &mut stack) {
            return false;
        }

        loop {
            let next = match stack.last_mut() {
                None => return true,
                Some(frame) => frame
                    .children
                    .next()
                    .map(|child| (frame.dir.child(child.name.as_str()), child)),
            };

            match next {
                Some((location, info)) => {
                    if ctx.is_cancelled()
                        || !self.process_entry(ctx, &location, Some(info), &mut stack)
                    {
                        unwind(ctx, stack);
                        return false;
                    }
                }
                None => {
                    if let Some(frame) = stack.pop() {
                        let own = ctx.install(frame.saved);
                        if let Some(monitor) = own {
                            monitor.emit_synthetic(ChangeKind::AttributeChanged, frame.dir);
                        }
                    }
                }
            }
        }
    }

    /// Change one entry and, for directories, push a frame for its children.
    fn process_entry(
        &self,
        ctx: &mut JobContext<'_>,
        location: &Location,
        info: Option<FileInfo>,
        stack: &mut Vec<Frame>,
    ) -> bool {
        let info = match info {
            Some(info) => info,
            None => match ctx.vfs.query_info(location) {
                Ok(info) => info,
                Err(source) => {
                    ctx.report(
                        JobError::Query {
                            location: location.clone(),
                            source,
                        },
                        false,
                    );
                    return false;
                }
            },
        };

        ctx.current_file(&info.display_name);
        let changed = match self.apply(ctx, location, &info) {
            Ok(changed) => changed,
            Err(error) => {
                ctx.report(error, false);
                return false;
            }
        };

        ctx.advance(1);
        if changed {
            ctx.emit_on_active(ChangeKind::AttributeChanged, location);
        }

        if self.options.recursive && info.is_dir() {
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
                    return false;
                }
            };

            let monitor = ctx.existing_monitor(location);
            let saved = ctx.install(monitor);
            stack.push(Frame {
                dir: location.clone(),
                children: children.into_iter(),
                saved,
            });
        }

        true
    }

    /// Set uid, gid and mode in that order, returning whether anything
    /// changed. When a later step fails after an earlier one succeeded,
    /// watchers are told about the partial change.
    fn apply(
        &self,
        ctx: &mut JobContext<'_>,
        location: &Location,
        info: &FileInfo,
    ) -> Result<bool, JobError> {
        let mut changed = false;
        match self.apply_steps(ctx, location, info, &mut changed) {
            Ok(()) => Ok(changed),
            Err(error) => {
                if changed {
                    ctx.emit_on_active(ChangeKind::AttributeChanged, location);
                }
                Err(error)
            }
        }
    }

    fn apply_steps(
        &self,
        ctx: &JobContext<'_>,
        location: &Location,
        info: &FileInfo,
        changed: &mut bool,
    ) -> Result<(), JobError> {
        if let Some(uid) = self.options.uid {
            ctx.vfs
                .set_owner(location, uid)
                .map_err(|source| JobError::SetOwner {
                    location: location.clone(),
                    source,
                })?;
            *changed = true;
        }

        if let Some(gid) = self.options.gid {
            ctx.vfs
                .set_group(location, gid)
                .map_err(|source| JobError::SetGroup {
                    location: location.clone(),
                    source,
                })?;
            *changed = true;
        }

        if let Some(change) = self.options.mode {
            // Links have no mode of their own to change.
            if info.kind == FileKind::Symlink {
                tracing::trace!("{}: symlink, mode left alone", location);
                return Ok(());
            }
            let original = info.mode.ok_or_else(|| JobError::SetMode {
                location: location.clone(),
                source: VfsError::NotSupported {
                    location: location.clone(),
                },
            })?;
            let mode = change.apply(original, info.is_dir());
            tracing::trace!("{}: mode {:o} -> {:o}", location, original, mode);
            ctx.vfs
                .set_mode(location, mode)
                .map_err(|source| JobError::SetMode {
                    location: location.clone(),
                    source,
                })?;
            *changed = true;
        }

        Ok(())
    }
}

/// Restore the monitors saved by open frames without emitting the
/// aggregate event.
fn unwind(ctx: &mut JobContext<'_>, mut stack: Vec<Frame>) {
    while let Some(frame) = stack.pop() {
        ctx.install(frame.saved);
    }
}
