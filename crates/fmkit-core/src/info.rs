//! File metadata snapshots.

use std::ffi::OsStr;
use std::fs::Metadata;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// The type of a filesystem entry, as seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Metadata for a single entry, queried without following symlinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Name of the entry within its parent.
    pub name: CompactString,
    /// Name suitable for showing to a user.
    pub display_name: CompactString,
    /// Entry type.
    pub kind: FileKind,
    /// Size in bytes.
    pub size: u64,
    /// Owning user id, when the backend exposes one.
    pub uid: Option<u32>,
    /// Owning group id, when the backend exposes one.
    pub gid: Option<u32>,
    /// Permission bits (`0o7777` range), when the backend exposes them.
    pub mode: Option<u32>,
}

impl FileInfo {
    /// Create info for an entry with no ownership or permission data.
    pub fn new(name: impl AsRef<str>, kind: FileKind, size: u64) -> Self {
        let name = CompactString::new(name.as_ref());
        Self {
            display_name: name.clone(),
            name,
            kind,
            size,
            uid: None,
            gid: None,
            mode: None,
        }
    }

    /// Build info from local metadata obtained via `symlink_metadata`.
    pub fn from_metadata(name: &OsStr, metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };

        let mut info = Self::new(name.to_string_lossy(), kind, metadata.len());
        let (uid, gid, mode) = unix_attributes(metadata);
        info.uid = uid;
        info.gid = gid;
        info.mode = mode;
        info
    }

    /// Set the ownership and permission data.
    pub fn with_unix(mut self, uid: u32, gid: u32, mode: u32) -> Self {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self.mode = Some(mode & 0o7777);
        self
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Bytes this entry contributes to delete progress. Directories count zero.
    pub fn accounted_size(&self) -> u64 {
        if self.is_dir() { 0 } else { self.size }
    }
}

#[cfg(unix)]
fn unix_attributes(metadata: &Metadata) -> (Option<u32>, Option<u32>, Option<u32>) {
    use std::os::unix::fs::MetadataExt;
    (
        Some(metadata.uid()),
        Some(metadata.gid()),
        Some(metadata.mode() & 0o7777),
    )
}

#[cfg(not(unix))]
fn unix_attributes(_metadata: &Metadata) -> (Option<u32>, Option<u32>, Option<u32>) {
    (None, None, None)
}

/// Totals produced by a deep count over a set of roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepCount {
    /// Non-directory entries (files, symlinks, special files).
    pub files: u64,
    /// Directories, roots included.
    pub dirs: u64,
    /// Sum of [`FileInfo::accounted_size`].
    pub bytes: u64,
}

impl DeepCount {
    /// Record one entry.
    pub fn record(&mut self, info: &FileInfo) {
        if info.is_dir() {
            self.dirs += 1;
        } else {
            self.files += 1;
        }
        self.bytes += info.accounted_size();
    }

    /// Total number of entries of any kind.
    pub fn entries(&self) -> u64 {
        self.files + self.dirs
    }
}
