//! Directory monitor registry for fmkit.
//!
//! The registry is the single authority over who is watching what. It
//! hands out shared [`MonitorHandle`]s, keeps at most one live handle per
//! location and kind, and substitutes a *dummy* handle when the backend
//! cannot watch a location natively. Dummy handles never fire by
//! themselves; file-operation jobs inject synthetic events into them so
//! subscribers still see changes on virtual filesystems.
//!
//! # Example
//!
//! ```rust,no_run
//! use fmkit_core::Location;
//! use fmkit_monitor::{MonitorConfig, MonitorRegistry};
//!
//! let registry = MonitorRegistry::new(MonitorConfig::default());
//! let handle = registry
//!     .directory_watch(&Location::from_path("/tmp"))
//!     .unwrap();
//! let mut events = handle.subscribe();
//!
//! // Dropping the last handle removes the registry entry.
//! drop(handle);
//! # let _ = events.try_recv();
//! ```

mod backend;
mod config;
mod error;
mod event;
mod handle;
mod registry;

pub use backend::{NativeWatch, NotifyBackend, RateLimiter, WatchBackend};
pub use config::{MonitorConfig, MonitorConfigBuilder};
pub use error::MonitorError;
pub use event::{ChangeKind, EventSink, MonitorEvent};
pub use handle::{MonitorHandle, WatchKind};
pub use registry::{MonitorRegistry, RegistryStats};

// Re-export core types for convenience
pub use fmkit_core::Location;
