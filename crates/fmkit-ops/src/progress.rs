//! Progress accounting for jobs.

use serde::{Deserialize, Serialize};
use strum::Display;

/// What a job's progress counters measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ProgressUnit {
    /// Entries processed (attribute changes).
    Entries,
    /// Bytes processed (deletion).
    Bytes,
}

/// Monotonic `finished / total` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    finished: u64,
    total: u64,
    unit: ProgressUnit,
}

impl JobProgress {
    /// Create an empty counter.
    pub fn new(unit: ProgressUnit) -> Self {
        Self {
            finished: 0,
            total: 0,
            unit,
        }
    }

    /// Set the total once the pre-run phase is done.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    /// Advance by `amount`, never past `total`.
    ///
    /// The total is an estimate taken before the walk; if the tree grew
    /// in the meantime the counter stays pinned at `total`.
    pub fn advance(&mut self, amount: u64) {
        let next = self.finished.saturating_add(amount);
        if next > self.total {
            tracing::warn!(
                "progress overran the counted total ({} > {} {})",
                next,
                self.total,
                self.unit
            );
        }
        self.finished = next.min(self.total);
    }

    /// Work done so far.
    pub fn finished(&self) -> u64 {
        self.finished
    }

    /// Work counted before the walk.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// What the counters measure.
    pub fn unit(&self) -> ProgressUnit {
        self.unit
    }

    /// Progress as a ratio in `0.0..=1.0` (0.0 when nothing was counted).
    pub fn ratio(&self) -> f64 {
        if self.total > 0 {
            self.finished as f64 / self.total as f64
        } else {
            0.0
        }
    }
}
