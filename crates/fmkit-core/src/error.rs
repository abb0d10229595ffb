//! Error types for locations and filesystem access.

use std::io;

use thiserror::Error;

use crate::Location;

/// Errors produced while parsing a [`Location`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The input was empty.
    #[error("Location cannot be empty")]
    Empty,

    /// A plain path that is not absolute.
    #[error("Path must be absolute: {input}")]
    Relative { input: String },

    /// The URI scheme contains characters outside `[A-Za-z0-9+.-]`.
    #[error("Invalid URI scheme in {input}")]
    InvalidScheme { input: String },

    /// A `file://` URI naming a remote host.
    #[error("file URI with a remote host is not supported: {input}")]
    RemoteFileUri { input: String },
}

/// Errors returned by [`Vfs`](crate::Vfs) implementations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The location does not exist.
    #[error("Not found: {location}")]
    NotFound { location: Location },

    /// Permission denied.
    #[error("Permission denied: {location}")]
    PermissionDenied { location: Location },

    /// The backend cannot perform this operation on this location.
    #[error("Operation not supported: {location}")]
    NotSupported { location: Location },

    /// Generic I/O error.
    #[error("I/O error at {location}: {source}")]
    Io {
        location: Location,
        #[source]
        source: io::Error,
    },
}

impl VfsError {
    /// Create an error from an [`io::Error`], classifying well-known kinds.
    pub fn io(location: impl Into<Location>, source: io::Error) -> Self {
        let location = location.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { location },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { location },
            io::ErrorKind::Unsupported => Self::NotSupported { location },
            _ => Self::Io { location, source },
        }
    }

    /// The location the error refers to.
    pub fn location(&self) -> &Location {
        match self {
            Self::NotFound { location }
            | Self::PermissionDenied { location }
            | Self::NotSupported { location }
            | Self::Io { location, .. } => location,
        }
    }

    /// Whether this error means the operation is unavailable rather than failed.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_error_io_classifies_kinds() {
        let err = VfsError::io(
            Location::from_path("/test/path"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, VfsError::PermissionDenied { .. }));

        let err = VfsError::io(
            Location::from_path("/test/path"),
            io::Error::new(io::ErrorKind::Unsupported, "nope"),
        );
        assert!(err.is_not_supported());

        let err = VfsError::io(Location::from_path("/test/path"), io::Error::other("boom"));
        assert!(matches!(err, VfsError::Io { .. }));
        assert_eq!(err.location().to_string(), "/test/path");
    }
}
