//! Pre-run work estimation.

use fmkit_core::{DeepCount, Location, Vfs};

use crate::progress::ProgressUnit;

/// Computes the total work for a job before it starts.
pub struct DeepCounter<'a> {
    vfs: &'a dyn Vfs,
}

impl<'a> DeepCounter<'a> {
    /// Create a counter over `vfs`.
    pub fn new(vfs: &'a dyn Vfs) -> Self {
        Self { vfs }
    }

    /// Count everything reachable from `roots`.
    pub fn count(&self, roots: &[Location]) -> DeepCount {
        self.vfs.deep_count(roots)
    }

    /// Total work in `unit`.
    pub fn total(&self, roots: &[Location], unit: ProgressUnit) -> u64 {
        let count = self.count(roots);
        tracing::debug!(
            "deep count: {} files, {} dirs, {} bytes",
            count.files,
            count.dirs,
            count.bytes
        );
        match unit {
            ProgressUnit::Entries => count.entries(),
            ProgressUnit::Bytes => count.bytes,
        }
    }
}
