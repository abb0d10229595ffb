//! Per-entry job errors.

use fmkit_core::{Location, VfsError};
use thiserror::Error;

/// A filesystem call that failed while a job processed one entry.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Cannot read information for {location}: {source}")]
    Query {
        location: Location,
        #[source]
        source: VfsError,
    },

    #[error("Cannot list directory {location}: {source}")]
    Enumerate {
        location: Location,
        #[source]
        source: VfsError,
    },

    #[error("Cannot change owner of {location}: {source}")]
    SetOwner {
        location: Location,
        #[source]
        source: VfsError,
    },

    #[error("Cannot change group of {location}: {source}")]
    SetGroup {
        location: Location,
        #[source]
        source: VfsError,
    },

    #[error("Cannot change permissions of {location}: {source}")]
    SetMode {
        location: Location,
        #[source]
        source: VfsError,
    },

    #[error("Cannot delete {location}: {source}")]
    Delete {
        location: Location,
        #[source]
        source: VfsError,
    },
}

impl JobError {
    /// The entry being processed when the error occurred.
    pub fn location(&self) -> &Location {
        match self {
            Self::Query { location, .. }
            | Self::Enumerate { location, .. }
            | Self::SetOwner { location, .. }
            | Self::SetGroup { location, .. }
            | Self::SetMode { location, .. }
            | Self::Delete { location, .. } => location,
        }
    }

    /// The underlying filesystem error.
    pub fn vfs_error(&self) -> &VfsError {
        match self {
            Self::Query { source, .. }
            | Self::Enumerate { source, .. }
            | Self::SetOwner { source, .. }
            | Self::SetGroup { source, .. }
            | Self::SetMode { source, .. }
            | Self::Delete { source, .. } => source,
        }
    }
}
