//! In-memory filesystem used to drive jobs over non-native locations.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io;

use fmkit_core::{FileInfo, FileKind, Location, Vfs, VfsError};
use fmkit_ops::{ErrorAction, JobError, JobListener};
use parking_lot::Mutex;

/// Filesystem call recorded by [`MemoryFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    SetOwner(String, u32),
    SetGroup(String, u32),
    SetMode(String, u32),
    Delete(String),
}

#[derive(Default)]
struct State {
    /// Entries in insertion order, which is also enumeration order.
    entries: Vec<(Location, FileInfo)>,
    log: Vec<Op>,
    fail_query: HashSet<Location>,
    fail_read_dir: HashSet<Location>,
    fail_mode: HashSet<Location>,
    fail_delete: HashSet<Location>,
}

/// A tree under `mem://test/` with failure injection and an operation log.
#[derive(Default)]
pub struct MemoryFs {
    state: Mutex<State>,
}

pub fn loc(path: &str) -> Location {
    Location::from_parts("mem", "test", path)
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: &str, mode: u32) -> &Self {
        let location = loc(path);
        let name = location.display_name();
        let info = FileInfo::new(name, FileKind::Directory, 4096).with_unix(1000, 1000, mode);
        self.state.lock().entries.push((location, info));
        self
    }

    pub fn add_file(&self, path: &str, size: u64, mode: u32) -> &Self {
        let location = loc(path);
        let name = location.display_name();
        let info = FileInfo::new(name, FileKind::File, size).with_unix(1000, 1000, mode);
        self.state.lock().entries.push((location, info));
        self
    }

    pub fn add_symlink(&self, path: &str) -> &Self {
        let location = loc(path);
        let name = location.display_name();
        let info = FileInfo::new(name, FileKind::Symlink, 12).with_unix(1000, 1000, 0o777);
        self.state.lock().entries.push((location, info));
        self
    }

    pub fn fail_query(&self, path: &str) {
        self.state.lock().fail_query.insert(loc(path));
    }

    pub fn fail_read_dir(&self, path: &str) {
        self.state.lock().fail_read_dir.insert(loc(path));
    }

    pub fn fail_mode(&self, path: &str) {
        self.state.lock().fail_mode.insert(loc(path));
    }

    pub fn fail_delete(&self, path: &str) {
        self.state.lock().fail_delete.insert(loc(path));
    }

    pub fn log(&self) -> Vec<Op> {
        self.state.lock().log.clone()
    }

    pub fn exists(&self, path: &str) -> bool {
        let location = loc(path);
        self.state.lock().entries.iter().any(|(l, _)| *l == location)
    }

    pub fn mode_of(&self, path: &str) -> Option<u32> {
        let location = loc(path);
        self.state
            .lock()
            .entries
            .iter()
            .find(|(l, _)| *l == location)
            .and_then(|(_, info)| info.mode)
    }

    fn update(
        &self,
        location: &Location,
        op: Op,
        change: impl FnOnce(&mut FileInfo),
    ) -> Result<(), VfsError> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .iter_mut()
            .find(|(l, _)| l == location)
            .ok_or_else(|| VfsError::NotFound {
                location: location.clone(),
            })?;
        change(&mut entry.1);
        state.log.push(op);
        Ok(())
    }
}

fn denied(location: &Location) -> VfsError {
    VfsError::PermissionDenied {
        location: location.clone(),
    }
}

impl Vfs for MemoryFs {
    fn query_info(&self, location: &Location) -> Result<FileInfo, VfsError> {
        let state = self.state.lock();
        if state.fail_query.contains(location) {
            return Err(denied(location));
        }
        state
            .entries
            .iter()
            .find(|(l, _)| l == location)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| VfsError::NotFound {
                location: location.clone(),
            })
    }

    fn read_dir(&self, location: &Location) -> Result<Vec<FileInfo>, VfsError> {
        let state = self.state.lock();
        if state.fail_read_dir.contains(location) {
            return Err(denied(location));
        }
        Ok(state
            .entries
            .iter()
            .filter(|(l, _)| l.parent().as_ref() == Some(location))
            .map(|(_, info)| info.clone())
            .collect())
    }

    fn set_owner(&self, location: &Location, uid: u32) -> Result<(), VfsError> {
        let op = Op::SetOwner(location.path().display().to_string(), uid);
        self.update(location, op, |info| info.uid = Some(uid))
    }

    fn set_group(&self, location: &Location, gid: u32) -> Result<(), VfsError> {
        let op = Op::SetGroup(location.path().display().to_string(), gid);
        self.update(location, op, |info| info.gid = Some(gid))
    }

    fn set_mode(&self, location: &Location, mode: u32) -> Result<(), VfsError> {
        if self.state.lock().fail_mode.contains(location) {
            return Err(denied(location));
        }
        let op = Op::SetMode(location.path().display().to_string(), mode);
        self.update(location, op, |info| info.mode = Some(mode))
    }

    fn delete(&self, location: &Location) -> Result<(), VfsError> {
        let mut state = self.state.lock();
        if state.fail_delete.contains(location) {
            return Err(denied(location));
        }
        let has_children = state
            .entries
            .iter()
            .any(|(l, _)| l.parent().as_ref() == Some(location));
        if has_children {
            return Err(VfsError::Io {
                location: location.clone(),
                source: io::Error::other("directory not empty"),
            });
        }
        let before = state.entries.len();
        state.entries.retain(|(l, _)| l != location);
        if state.entries.len() == before {
            return Err(VfsError::NotFound {
                location: location.clone(),
            });
        }
        state.log.push(Op::Delete(location.path().display().to_string()));
        Ok(())
    }
}

/// Listener that records everything it is told.
#[derive(Default)]
pub struct RecordingListener {
    pub prepared: Option<u64>,
    pub files: Vec<String>,
    pub percents: Vec<f64>,
    pub errors: Vec<(String, bool)>,
    pub abort_on_error: bool,
}

impl JobListener for RecordingListener {
    fn prepared(&mut self, total: u64) {
        self.prepared = Some(total);
    }

    fn current_file(&mut self, display_name: &str) {
        self.files.push(display_name.to_string());
    }

    fn percent(&mut self, ratio: f64) {
        self.percents.push(ratio);
    }

    fn error(&mut self, error: &JobError, fatal: bool) -> ErrorAction {
        self.errors.push((error.location().path().display().to_string(), fatal));
        if self.abort_on_error {
            ErrorAction::Abort
        } else {
            ErrorAction::Continue
        }
    }
}

pub fn assert_monotonic(percents: &[f64]) {
    for pair in percents.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {:?}", percents);
    }
    if let Some(last) = percents.last() {
        assert!(*last <= 1.0);
    }
}
