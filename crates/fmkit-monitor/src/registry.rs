//! The process-wide monitor registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use fmkit_core::Location;
use parking_lot::Mutex;

use crate::backend::{NotifyBackend, WatchBackend};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::event::EventSink;
use crate::handle::{Monitor, MonitorHandle, Watch, WatchKind};

/// Live entry counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Locations with a live native watch.
    pub native: usize,
    /// Locations with a live dummy watch.
    pub dummy: usize,
}

#[derive(Default)]
struct Tables {
    native: HashMap<Location, Weak<Monitor>>,
    dummy: HashMap<Location, Weak<Monitor>>,
    shut_down: bool,
}

impl Tables {
    fn table(&mut self, kind: WatchKind) -> &mut HashMap<Location, Weak<Monitor>> {
        match kind {
            WatchKind::Native => &mut self.native,
            WatchKind::Dummy => &mut self.dummy,
        }
    }

    fn upgrade(
        table: &HashMap<Location, Weak<Monitor>>,
        location: &Location,
    ) -> Option<MonitorHandle> {
        table
            .get(location)
            .and_then(Weak::upgrade)
            .map(MonitorHandle::from_arc)
    }

    /// Native table first, then the dummy table for non-native locations.
    fn find(&self, location: &Location) -> Option<MonitorHandle> {
        Self::upgrade(&self.native, location).or_else(|| {
            if location.is_native() {
                None
            } else {
                Self::upgrade(&self.dummy, location)
            }
        })
    }
}

pub(crate) struct RegistryShared {
    config: MonitorConfig,
    backend: Box<dyn WatchBackend>,
    tables: Mutex<Tables>,
}

impl RegistryShared {
    /// Forget `location` if its entry of `kind` has no live handle left.
    ///
    /// A racing request may already have replaced a dead entry with a new
    /// watch; that entry is live and stays.
    pub(crate) fn purge(&self, location: &Location, kind: WatchKind) {
        let mut tables = self.tables.lock();
        let table = tables.table(kind);
        if table
            .get(location)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            table.remove(location);
            tracing::debug!("purged {} monitor for {}", kind, location);
        }
    }
}

/// Shared registry of directory monitors.
///
/// Cloning is cheap; clones share the same tables. Create one at startup
/// with [`new`](Self::new), hand it to whatever needs to watch or notify,
/// and call [`shutdown`](Self::shutdown) on teardown.
#[derive(Clone)]
pub struct MonitorRegistry {
    shared: Arc<RegistryShared>,
}

impl MonitorRegistry {
    /// Create a registry backed by the platform `notify` watcher.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_backend(config, NotifyBackend)
    }

    /// Create a registry with a custom watch backend.
    pub fn with_backend(config: MonitorConfig, backend: impl WatchBackend + 'static) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                config,
                backend: Box::new(backend),
                tables: Mutex::new(Tables::default()),
            }),
        }
    }

    /// The registry configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Get or create the watch for a directory.
    ///
    /// Existing handles are shared. When the backend reports that the
    /// location cannot be watched natively, a dummy handle is created and
    /// returned instead; that fallback is not an error. Any other backend
    /// failure is returned and leaves the registry unchanged.
    ///
    /// The backend runs under the registry lock, so two requests for the
    /// same new location never create two watches. A location that already
    /// fell back to a dummy gets that dummy again without asking the backend.
    pub fn directory_watch(&self, location: &Location) -> Result<MonitorHandle, MonitorError> {
        let mut tables = self.shared.tables.lock();
        if tables.shut_down {
            return Err(MonitorError::ShutDown);
        }
        if let Some(handle) = tables.find(location) {
            return Ok(handle);
        }
        // A native location that fell back earlier keeps its dummy.
        if let Some(handle) = Tables::upgrade(&tables.dummy, location) {
            return Ok(handle);
        }

        let sink = EventSink::new(self.shared.config.channel_capacity);
        let result = self.shared.backend.watch_directory(
            location,
            self.shared.config.rate_limit,
            sink.clone(),
        );

        match result {
            Ok(native) => {
                tracing::debug!("created native monitor for {}", location);
                let watch = Watch::Native(Mutex::new(Some(native)));
                Ok(self.register(&mut tables, location, watch, sink))
            }
            Err(MonitorError::NotSupported { .. }) => {
                tracing::debug!("native watch unsupported for {}, using dummy", location);
                Ok(self.register(&mut tables, location, Watch::Dummy, sink))
            }
            Err(err) => {
                tracing::warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Return an existing handle for `location` without creating anything.
    pub fn lookup_existing(&self, location: &Location) -> Option<MonitorHandle> {
        let tables = self.shared.tables.lock();
        if tables.shut_down {
            return None;
        }
        tables.find(location)
    }

    /// Return the dummy handle for a non-native location, creating it if needed.
    ///
    /// Native locations and the schemes listed in
    /// [`MonitorConfig::no_dummy_schemes`] never get a dummy.
    pub fn lookup_or_create_dummy(&self, location: &Location) -> Option<MonitorHandle> {
        if location.is_native() || self.shared.config.skips_dummy(location.scheme()) {
            return None;
        }

        let mut tables = self.shared.tables.lock();
        if tables.shut_down {
            return None;
        }
        if let Some(handle) = Tables::upgrade(&tables.dummy, location) {
            return Some(handle);
        }

        tracing::debug!("created dummy monitor for {}", location);
        let sink = EventSink::new(self.shared.config.channel_capacity);
        Some(self.register(&mut tables, location, Watch::Dummy, sink))
    }

    /// Live entry counts.
    pub fn stats(&self) -> RegistryStats {
        let tables = self.shared.tables.lock();
        let live = |table: &HashMap<Location, Weak<Monitor>>| {
            table.values().filter(|weak| weak.strong_count() > 0).count()
        };
        RegistryStats {
            native: live(&tables.native),
            dummy: live(&tables.dummy),
        }
    }

    /// Number of live entries of either kind.
    pub fn len(&self) -> usize {
        let stats = self.stats();
        stats.native + stats.dummy
    }

    /// Check if no location is being watched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear the registry down.
    ///
    /// Forgets every entry and refuses new requests. Handles already given
    /// out keep working until their owners drop them.
    pub fn shutdown(&self) {
        let mut tables = self.shared.tables.lock();
        tables.shut_down = true;
        tables.native.clear();
        tables.dummy.clear();
        tracing::debug!("monitor registry shut down");
    }

    /// Check if [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.tables.lock().shut_down
    }

    fn register(
        &self,
        tables: &mut Tables,
        location: &Location,
        watch: Watch,
        sink: EventSink,
    ) -> MonitorHandle {
        let monitor = Monitor::new(
            location.clone(),
            watch,
            sink,
            Arc::downgrade(&self.shared),
        );
        let kind = monitor.kind();
        let handle = MonitorHandle::from_arc(Arc::new(monitor));
        tables
            .table(kind)
            .insert(location.clone(), handle.downgrade());
        handle
    }
}

impl fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
