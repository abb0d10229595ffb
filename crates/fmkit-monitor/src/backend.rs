//! Native watch backends.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use fmkit_core::Location;
use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode, Watcher};

use crate::error::MonitorError;
use crate::event::{ChangeKind, EventSink, MonitorEvent};

/// Limit on remembered paths before stale throttle entries are pruned.
const RATE_LIMIT_PRUNE_THRESHOLD: usize = 1024;

/// Owns an OS-level watch. Dropping it stops the watch.
pub struct NativeWatch {
    _guard: Box<dyn Send>,
}

impl NativeWatch {
    /// Wrap whatever keeps the OS watch alive.
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for NativeWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWatch").finish_non_exhaustive()
    }
}

/// Creates native directory watches for the registry.
///
/// Called with the registry lock held, so implementations must not call
/// back into the registry.
pub trait WatchBackend: Send + Sync {
    /// Start watching `location`, forwarding events into `sink`.
    ///
    /// Return [`MonitorError::NotSupported`] when the location cannot be
    /// watched natively; the registry then falls back to a dummy handle.
    fn watch_directory(
        &self,
        location: &Location,
        rate_limit: Duration,
        sink: EventSink,
    ) -> Result<NativeWatch, MonitorError>;
}

/// Backend using the platform's recommended `notify` watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn watch_directory(
        &self,
        location: &Location,
        rate_limit: Duration,
        sink: EventSink,
    ) -> Result<NativeWatch, MonitorError> {
        let Some(dir) = location.as_path() else {
            return Err(MonitorError::NotSupported {
                location: location.clone(),
            });
        };

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = notify::recommended_watcher(tx)
            .map_err(|e| MonitorError::from_notify(location, e))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| MonitorError::from_notify(location, e))?;

        // The forwarder exits once the watcher, and with it the sender, is dropped.
        let watched = location.clone();
        thread::Builder::new()
            .name("fmkit-watch".into())
            .spawn(move || forward_events(rx, RateLimiter::new(rate_limit), sink, watched))
            .map_err(|e| MonitorError::Backend {
                location: location.clone(),
                message: e.to_string(),
            })?;

        Ok(NativeWatch::new(watcher))
    }
}

/// Translate raw `notify` events, throttle them and push them into `sink`.
///
/// Wakes up when a held-back change is due even if nothing new arrives.
fn forward_events(
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    mut limiter: RateLimiter,
    sink: EventSink,
    watched: Location,
) {
    loop {
        let received = match limiter.next_due() {
            Some(due) => rx.recv_timeout(due.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(event)) => {
                for event in translate(&event) {
                    if limiter.allow(&event, Instant::now()) && !sink.send(event) {
                        return;
                    }
                }
            }
            Ok(Err(err)) => tracing::warn!("watch error on {}: {}", watched, err),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        for event in limiter.take_due(Instant::now()) {
            if !sink.send(event) {
                return;
            }
        }
    }
}

/// Map a `notify` event to monitor events, one per affected path.
fn translate(event: &notify::Event) -> Vec<MonitorEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::AttributeChanged,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Moved,
        EventKind::Modify(_) => ChangeKind::Changed,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| MonitorEvent::native(kind, Location::from_path(path.as_path())))
        .collect()
}

/// Collapses bursts of change events for the same location.
///
/// `Changed` and `AttributeChanged` events pass at most once per window
/// per location. A change that arrives inside the window is held back and
/// handed out by [`take_due`](Self::take_due) when the window closes, so
/// the last change of a burst is never lost. Structural events (create,
/// delete, move) always pass.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    slots: HashMap<Location, Slot>,
}

#[derive(Debug)]
struct Slot {
    last_sent: Instant,
    pending: Option<MonitorEvent>,
}

impl Slot {
    fn due(&self, window: Duration) -> Option<Instant> {
        self.pending.as_ref().map(|_| self.last_sent + window)
    }
}

impl RateLimiter {
    /// Create a limiter with the given window. A zero window disables it.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: HashMap::new(),
        }
    }

    /// Decide whether `event` observed at `now` should be delivered now.
    ///
    /// A throttled change replaces any change already held for its location.
    pub fn allow(&mut self, event: &MonitorEvent, now: Instant) -> bool {
        if self.window.is_zero() {
            return true;
        }

        match event.kind {
            ChangeKind::Changed | ChangeKind::AttributeChanged => {}
            ChangeKind::Deleted | ChangeKind::Moved => {
                self.slots.remove(&event.location);
                return true;
            }
            ChangeKind::Created => return true,
        }

        if let Some(slot) = self.slots.get_mut(&event.location) {
            if now.saturating_duration_since(slot.last_sent) < self.window {
                slot.pending = Some(event.clone());
                return false;
            }
        }

        if self.slots.len() >= RATE_LIMIT_PRUNE_THRESHOLD {
            let window = self.window;
            self.slots.retain(|_, slot| {
                slot.pending.is_some() || now.saturating_duration_since(slot.last_sent) < window
            });
        }
        self.slots.insert(
            event.location.clone(),
            Slot {
                last_sent: now,
                pending: None,
            },
        );
        true
    }

    /// Earliest time a held-back change becomes deliverable.
    pub fn next_due(&self) -> Option<Instant> {
        self.slots
            .values()
            .filter_map(|slot| slot.due(self.window))
            .min()
    }

    /// Take every held-back change whose window has closed by `now`.
    ///
    /// Each delivery opens a new window for its location.
    pub fn take_due(&mut self, now: Instant) -> Vec<MonitorEvent> {
        let window = self.window;
        let mut due = Vec::new();
        for slot in self.slots.values_mut() {
            if slot.due(window).is_some_and(|at| at <= now) {
                if let Some(event) = slot.pending.take() {
                    slot.last_sent = now;
                    due.push(event);
                }
            }
        }
        due
    }
}
