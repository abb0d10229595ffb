//! Change notifications and their fan-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fmkit_core::Location;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::broadcast;

/// What happened to a watched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum ChangeKind {
    /// Contents changed.
    Changed,
    /// Ownership, permissions or other metadata changed.
    AttributeChanged,
    /// Entry appeared.
    Created,
    /// Entry was removed.
    Deleted,
    /// Entry was renamed or moved.
    Moved,
}

/// A change notification delivered to handle subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// The entry it happened to.
    pub location: Location,
    /// Injected by a job rather than reported by the OS.
    pub synthetic: bool,
}

impl MonitorEvent {
    /// An event reported by the backend.
    pub fn native(kind: ChangeKind, location: Location) -> Self {
        Self {
            kind,
            location,
            synthetic: false,
        }
    }

    /// An event injected by a file-operation job.
    pub fn synthetic(kind: ChangeKind, location: Location) -> Self {
        Self {
            kind,
            location,
            synthetic: true,
        }
    }
}

/// Sending side of a handle's event channel.
///
/// Backends keep a clone to forward OS events; once the handle is
/// cancelled, sends are dropped silently.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<MonitorEvent>,
    cancelled: Arc<AtomicBool>,
}

impl EventSink {
    /// Create a sink with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver an event to current subscribers. Returns `false` when cancelled.
    pub fn send(&self, event: MonitorEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
        true
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Stop delivering events.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if the sink was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
