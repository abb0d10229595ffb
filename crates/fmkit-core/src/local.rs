//! [`Vfs`] implementation for the local filesystem.

use std::fs;
use std::io;
use std::path::Path;

use jwalk::{Parallelism, WalkDir};

use crate::{DeepCount, FileInfo, Location, Vfs, VfsError};

/// Local filesystem backend. Handles `file` locations only.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    /// Threads used by [`Vfs::deep_count`] (0 = rayon default pool).
    threads: usize,
}

impl LocalFs {
    /// Create a backend using the default rayon pool for deep counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool of `threads` for deep counts.
    pub fn with_threads(threads: usize) -> Self {
        Self { threads }
    }

    fn parallelism(&self) -> Parallelism {
        match self.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        }
    }
}

fn native_path(location: &Location) -> Result<&Path, VfsError> {
    location.as_path().ok_or_else(|| VfsError::NotSupported {
        location: location.clone(),
    })
}

impl Vfs for LocalFs {
    fn query_info(&self, location: &Location) -> Result<FileInfo, VfsError> {
        let path = native_path(location)?;
        let metadata = fs::symlink_metadata(path).map_err(|e| VfsError::io(location.clone(), e))?;
        let name = path.file_name().unwrap_or(path.as_os_str());
        Ok(FileInfo::from_metadata(name, &metadata))
    }

    fn read_dir(&self, location: &Location) -> Result<Vec<FileInfo>, VfsError> {
        let path = native_path(location)?;
        let entries = fs::read_dir(path).map_err(|e| VfsError::io(location.clone(), e))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VfsError::io(location.clone(), e))?;
            let child = location.child(entry.file_name());
            if let Some(metadata) = child_metadata(&child, &entry.path())? {
                children.push(FileInfo::from_metadata(&entry.file_name(), &metadata));
            }
        }
        Ok(children)
    }

    fn set_owner(&self, location: &Location, uid: u32) -> Result<(), VfsError> {
        lchown(location, Some(uid), None)
    }

    fn set_group(&self, location: &Location, gid: u32) -> Result<(), VfsError> {
        lchown(location, None, Some(gid))
    }

    fn set_mode(&self, location: &Location, mode: u32) -> Result<(), VfsError> {
        let path = native_path(location)?;
        let metadata = fs::symlink_metadata(path).map_err(|e| VfsError::io(location.clone(), e))?;
        // No lchmod: a link's own mode is meaningless here.
        if metadata.file_type().is_symlink() {
            tracing::trace!("skipping mode change on symlink {}", location);
            return Ok(());
        }
        set_permissions(location, path, mode)
    }

    fn delete(&self, location: &Location) -> Result<(), VfsError> {
        let path = native_path(location)?;
        let metadata = fs::symlink_metadata(path).map_err(|e| VfsError::io(location.clone(), e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| VfsError::io(location.clone(), e))
    }

    fn deep_count(&self, roots: &[Location]) -> DeepCount {
        let mut count = DeepCount::default();

        for root in roots {
            let Ok(info) = self.query_info(root) else {
                tracing::debug!("deep count skipping unreadable root {}", root);
                continue;
            };
            count.record(&info);
            if !info.is_dir() {
                continue;
            }
            let Some(path) = root.as_path() else {
                continue;
            };

            let walker = WalkDir::new(path)
                .parallelism(self.parallelism())
                .skip_hidden(false)
                .follow_links(false)
                .min_depth(1);

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::debug!("deep count read error: {}", err);
                        continue;
                    }
                };
                match entry.metadata() {
                    Ok(metadata) => {
                        count.record(&FileInfo::from_metadata(entry.file_name(), &metadata))
                    }
                    Err(err) => tracing::debug!("deep count metadata error: {}", err),
                }
            }
        }

        count
    }
}

/// Metadata of a listed child, or `None` if it vanished after the listing.
fn child_metadata(child: &Location, path: &Path) -> Result<Option<fs::Metadata>, VfsError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} vanished while listing its parent", child);
            Ok(None)
        }
        Err(err) => Err(VfsError::io(child.clone(), err)),
    }
}

#[cfg(unix)]
fn lchown(location: &Location, uid: Option<u32>, gid: Option<u32>) -> Result<(), VfsError> {
    let path = native_path(location)?;
    std::os::unix::fs::lchown(path, uid, gid).map_err(|e| VfsError::io(location.clone(), e))
}

#[cfg(not(unix))]
fn lchown(location: &Location, _uid: Option<u32>, _gid: Option<u32>) -> Result<(), VfsError> {
    Err(VfsError::NotSupported {
        location: location.clone(),
    })
}

#[cfg(unix)]
fn set_permissions(location: &Location, path: &Path, mode: u32) -> Result<(), VfsError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| VfsError::io(location.clone(), e))
}

#[cfg(not(unix))]
fn set_permissions(location: &Location, path: &Path, mode: u32) -> Result<(), VfsError> {
    // Only the owner write bit maps onto a platform without unix modes.
    let metadata = fs::metadata(path).map_err(|e| VfsError::io(location.clone(), e))?;
    let mut permissions = metadata.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions).map_err(|e| VfsError::io(location.clone(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_non_native_is_not_supported() {
        let vfs = LocalFs::new();
        let remote = Location::parse("sftp://host/dir").unwrap();
        assert!(vfs.query_info(&remote).unwrap_err().is_not_supported());
        assert!(vfs.delete(&remote).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_vanished_child_is_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("kept"), "x").unwrap();
        let dir = Location::from_path(temp.path());

        let kept = child_metadata(&dir.child("kept"), &temp.path().join("kept")).unwrap();
        assert!(kept.is_some_and(|m| m.is_file()));
        let gone = child_metadata(&dir.child("gone"), &temp.path().join("gone")).unwrap();
        assert!(gone.is_none());

        let children = LocalFs::new().read_dir(&dir).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "kept");
    }

    #[test]
    fn test_delete_refuses_non_empty_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        fs::write(temp.path().join("dir/file"), "x").unwrap();

        let vfs = LocalFs::new();
        let dir = Location::from_path(temp.path().join("dir"));
        assert!(vfs.delete(&dir).is_err());

        vfs.delete(&dir.child("file")).unwrap();
        vfs.delete(&dir).unwrap();
        assert!(!temp.path().join("dir").exists());
    }
}
