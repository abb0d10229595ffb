//! Filesystem location identifiers.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::LocationError;

/// Scheme of locations backed by the local filesystem.
pub const NATIVE_SCHEME: &str = "file";

/// A hashable identifier for a file or directory, local or virtual.
///
/// Local paths use the `file` scheme and are *native*: the OS can watch
/// them for changes. Everything else (`sftp://host/dir`, `trash:///`, ...)
/// is non-native and relies on synthetic change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    scheme: CompactString,
    authority: CompactString,
    path: PathBuf,
}

impl Location {
    /// Create a native location for a local path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            scheme: CompactString::new(NATIVE_SCHEME),
            authority: CompactString::default(),
            path: path.into(),
        }
    }

    /// Create a location from its URI parts.
    pub fn from_parts(
        scheme: impl AsRef<str>,
        authority: impl AsRef<str>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let path = if path.as_os_str().is_empty() {
            PathBuf::from("/")
        } else {
            path
        };
        Self {
            scheme: CompactString::new(scheme.as_ref().to_ascii_lowercase()),
            authority: CompactString::new(authority.as_ref()),
            path,
        }
    }

    /// Parse an absolute path or a `scheme://authority/path` URI.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        if input.is_empty() {
            return Err(LocationError::Empty);
        }

        let Some((scheme, rest)) = input.split_once("://") else {
            if !Path::new(input).is_absolute() {
                return Err(LocationError::Relative {
                    input: input.to_string(),
                });
            }
            return Ok(Self::from_path(input));
        };

        let valid_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(LocationError::InvalidScheme {
                input: input.to_string(),
            });
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        if scheme.eq_ignore_ascii_case(NATIVE_SCHEME) {
            if !authority.is_empty() && authority != "localhost" {
                return Err(LocationError::RemoteFileUri {
                    input: input.to_string(),
                });
            }
            return Ok(Self::from_path(path));
        }

        Ok(Self::from_parts(scheme, authority, path))
    }

    /// The URI scheme, lowercase.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The URI authority (host, user@host:port), empty for native locations.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The path component.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the location lives on the local filesystem.
    pub fn is_native(&self) -> bool {
        self.scheme == NATIVE_SCHEME
    }

    /// The local path, if the location is native.
    pub fn as_path(&self) -> Option<&Path> {
        self.is_native().then_some(self.path.as_path())
    }

    /// The containing directory, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(|parent| Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: parent.to_path_buf(),
        })
    }

    /// A child of this location.
    pub fn child(&self, name: impl AsRef<OsStr>) -> Self {
        Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: self.path.join(name.as_ref()),
        }
    }

    /// The final path component, if any.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// A human-readable name for progress reporting.
    pub fn display_name(&self) -> String {
        match self.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.to_string(),
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Self::from_path(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "{}", self.path.display())
        } else {
            write!(
                f,
                "{}://{}{}",
                self.scheme,
                self.authority,
                self.path.display()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let loc = Location::parse("/home/user").unwrap();
        assert!(loc.is_native());
        assert_eq!(loc.as_path(), Some(Path::new("/home/user")));
        assert_eq!(loc.to_string(), "/home/user");
    }

    #[test]
    fn test_parse_file_uri_is_native() {
        let loc = Location::parse("file:///tmp/x").unwrap();
        assert_eq!(loc, Location::from_path("/tmp/x"));

        let loc = Location::parse("file://localhost/tmp/x").unwrap();
        assert_eq!(loc, Location::from_path("/tmp/x"));
    }

    #[test]
    fn test_parse_remote_uri() {
        let loc = Location::parse("sftp://me@host:22/srv/data").unwrap();
        assert!(!loc.is_native());
        assert_eq!(loc.scheme(), "sftp");
        assert_eq!(loc.authority(), "me@host:22");
        assert_eq!(loc.path(), Path::new("/srv/data"));
        assert_eq!(loc.as_path(), None);
        assert_eq!(loc.to_string(), "sftp://me@host:22/srv/data");
    }

    #[test]
    fn test_parse_uri_without_path() {
        let loc = Location::parse("trash://").unwrap();
        assert_eq!(loc.scheme(), "trash");
        assert_eq!(loc.path(), Path::new("/"));
        assert!(loc.parent().is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Location::parse(""), Err(LocationError::Empty));
        assert!(matches!(
            Location::parse("relative/dir"),
            Err(LocationError::Relative { .. })
        ));
        assert!(matches!(
            Location::parse("1bad://host/"),
            Err(LocationError::InvalidScheme { .. })
        ));
        assert!(matches!(
            Location::parse("file://elsewhere/tmp"),
            Err(LocationError::RemoteFileUri { .. })
        ));
    }

    #[test]
    fn test_parent_and_child_keep_scheme() {
        let dir = Location::parse("smb://server/share/dir").unwrap();
        let child = dir.child("file.txt");
        assert_eq!(child.to_string(), "smb://server/share/dir/file.txt");
        assert_eq!(child.parent(), Some(dir));
        assert_eq!(child.display_name(), "file.txt");
    }
}
