//! Shared watch handles.

use std::fmt;
use std::sync::{Arc, Weak};

use fmkit_core::Location;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::broadcast;

use crate::backend::NativeWatch;
use crate::event::{ChangeKind, EventSink, MonitorEvent};
use crate::registry::RegistryShared;

/// Which registry table a handle lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum WatchKind {
    /// Backed by an OS watch.
    Native,
    /// Never fires on its own; carries synthetic events only.
    Dummy,
}

pub(crate) enum Watch {
    Native(Mutex<Option<NativeWatch>>),
    Dummy,
}

pub(crate) struct Monitor {
    location: Location,
    watch: Watch,
    sink: EventSink,
    registry: Weak<RegistryShared>,
}

impl Monitor {
    pub(crate) fn new(
        location: Location,
        watch: Watch,
        sink: EventSink,
        registry: Weak<RegistryShared>,
    ) -> Self {
        Self {
            location,
            watch,
            sink,
            registry,
        }
    }

    pub(crate) fn kind(&self) -> WatchKind {
        match self.watch {
            Watch::Native(_) => WatchKind::Native,
            Watch::Dummy => WatchKind::Dummy,
        }
    }
}

impl Drop for Monitor {
    // Handles are never dropped while the registry lock is held.
    fn drop(&mut self) {
        if let Some(shared) = self.registry.upgrade() {
            shared.purge(&self.location, self.kind());
        }
    }
}

/// A shared, reference-counted change-notification subscription.
///
/// Clones refer to the same underlying watch. When the last clone is
/// dropped the registry forgets the location, so the next request creates
/// a fresh watch.
#[derive(Clone)]
pub struct MonitorHandle {
    inner: Arc<Monitor>,
}

impl MonitorHandle {
    pub(crate) fn from_arc(inner: Arc<Monitor>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<Monitor> {
        Arc::downgrade(&self.inner)
    }

    /// The watched location.
    pub fn location(&self) -> &Location {
        &self.inner.location
    }

    /// Whether this is a native or dummy watch.
    pub fn kind(&self) -> WatchKind {
        self.inner.kind()
    }

    /// Check if this is a dummy watch.
    pub fn is_dummy(&self) -> bool {
        self.kind() == WatchKind::Dummy
    }

    /// Stop watching. Always succeeds.
    ///
    /// A dummy handle only records the cancellation. A native handle also
    /// releases the OS watch. Further events, synthetic ones included, are
    /// discarded.
    pub fn cancel(&self) -> bool {
        self.inner.sink.cancel();
        if let Watch::Native(slot) = &self.inner.watch {
            let taken = slot.lock().take();
            if let Some(watch) = taken {
                tracing::debug!("released native watch on {}", self.location());
                drop(watch);
            }
        }
        true
    }

    /// Check if [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.sink.is_cancelled()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.sink.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.sink.subscriber_count()
    }

    /// Inject a synthetic event for `location`.
    pub fn emit_synthetic(&self, kind: ChangeKind, location: Location) {
        tracing::trace!("synthetic {} for {} on {}", kind, location, self.location());
        self.inner
            .sink
            .send(MonitorEvent::synthetic(kind, location));
    }

    /// Check if two handles share the same underlying watch.
    pub fn same_watch(&self, other: &MonitorHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live references to the underlying watch.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("location", self.location())
            .field("kind", &self.kind())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
