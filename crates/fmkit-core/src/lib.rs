//! Core types and traits for fmkit.
//!
//! This crate provides the location identifier shared by the monitor
//! registry and the file-operation jobs, the file metadata snapshot those
//! jobs walk with, and the [`Vfs`] trait every filesystem backend
//! implements.

mod error;
mod info;
mod local;
mod location;
mod vfs;

pub use error::{LocationError, VfsError};
pub use info::{DeepCount, FileInfo, FileKind};
pub use local::LocalFs;
pub use location::{Location, NATIVE_SCHEME};
pub use vfs::Vfs;
