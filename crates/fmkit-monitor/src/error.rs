//! Errors for watch creation.

use std::io;

use fmkit_core::Location;
use thiserror::Error;

/// Errors that can occur while creating a directory watch.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The backend cannot watch this location natively.
    ///
    /// [`MonitorRegistry::directory_watch`](crate::MonitorRegistry::directory_watch)
    /// recovers from this by handing out a dummy monitor.
    #[error("Watching is not supported for {location}")]
    NotSupported { location: Location },

    /// The location does not exist.
    #[error("Cannot watch {location}: not found")]
    NotFound { location: Location },

    /// The OS refused to add another watch.
    #[error("Cannot watch {location}: too many watches")]
    TooManyWatches { location: Location },

    /// Any other backend failure.
    #[error("Cannot watch {location}: {message}")]
    Backend { location: Location, message: String },

    /// The registry was shut down.
    #[error("Monitor registry has been shut down")]
    ShutDown,
}

impl MonitorError {
    /// Convert a `notify` error for `location`.
    pub fn from_notify(location: &Location, error: notify::Error) -> Self {
        let location = location.clone();
        match error.kind {
            notify::ErrorKind::PathNotFound => Self::NotFound { location },
            notify::ErrorKind::MaxFilesWatch => Self::TooManyWatches { location },
            notify::ErrorKind::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => Self::NotFound { location },
                io::ErrorKind::Unsupported => Self::NotSupported { location },
                _ => Self::Backend {
                    location,
                    message: e.to_string(),
                },
            },
            notify::ErrorKind::Generic(message) => Self::Backend { location, message },
            other => Self::Backend {
                location,
                message: format!("{other:?}"),
            },
        }
    }
}
