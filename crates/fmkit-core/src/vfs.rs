//! The filesystem abstraction walked by file-operation jobs.

use crate::{DeepCount, FileInfo, Location, VfsError};

/// A filesystem backend.
///
/// Every call may block for an arbitrary time (network filesystems);
/// callers run jobs on worker threads and rely on cooperative cancellation
/// between calls.
pub trait Vfs: Send + Sync {
    /// Query an entry without following symlinks.
    fn query_info(&self, location: &Location) -> Result<FileInfo, VfsError>;

    /// List the children of a directory, in enumeration order.
    fn read_dir(&self, location: &Location) -> Result<Vec<FileInfo>, VfsError>;

    /// Change the owning user.
    fn set_owner(&self, location: &Location, uid: u32) -> Result<(), VfsError>;

    /// Change the owning group.
    fn set_group(&self, location: &Location, gid: u32) -> Result<(), VfsError>;

    /// Replace the permission bits.
    fn set_mode(&self, location: &Location, mode: u32) -> Result<(), VfsError>;

    /// Delete a file, symlink or empty directory.
    fn delete(&self, location: &Location) -> Result<(), VfsError>;

    /// Count every entry reachable from `roots`, roots included.
    ///
    /// Unreadable entries are skipped, so the result is a best-effort
    /// estimate for progress reporting.
    fn deep_count(&self, roots: &[Location]) -> DeepCount {
        let mut count = DeepCount::default();
        let mut pending: Vec<(Location, FileInfo)> = roots
            .iter()
            .filter_map(|root| self.query_info(root).ok().map(|info| (root.clone(), info)))
            .collect();

        while let Some((location, info)) = pending.pop() {
            count.record(&info);
            if info.is_dir() {
                if let Ok(children) = self.read_dir(&location) {
                    pending.extend(
                        children
                            .into_iter()
                            .map(|child| (location.child(child.name.as_str()), child)),
                    );
                }
            }
        }

        count
    }
}
