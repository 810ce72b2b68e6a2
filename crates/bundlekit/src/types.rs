//! Core types for bundle identity and listings.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Suffix every bundle archive carries.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Name of the current-version symlink inside a bundle directory.
pub const CURRENT: &str = "current";

/// A bundle name paired with one of its versions.
///
/// The name is everything before the last `-`, the version is the rest, so
/// versions never contain a hyphen while names may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BundleId {
    pub name: String,
    pub version: String,
}

impl BundleId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Recover identity from an archive file name such as `web-20240101.tar.gz`.
    ///
    /// Leading directories are ignored.
    pub fn from_archive_name(file_name: &str) -> Result<Self> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);

        let stem = base
            .strip_suffix(ARCHIVE_SUFFIX)
            .ok_or_else(|| Error::InvalidArchiveName(base.to_string()))?;

        Self::from_dir_name(stem).ok_or_else(|| Error::InvalidArchiveName(base.to_string()))
    }

    /// Recover identity from a version directory name such as `web-20240101`.
    pub fn from_dir_name(dir_name: &str) -> Option<Self> {
        let (name, version) = dir_name.rsplit_once('-')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }

    /// Directory name of this version inside the bundle directory.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// One bundle in a store-wide listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleEntry {
    pub name: String,
    /// Resolved current version, `None` when the pointer is absent.
    pub current: Option<String>,
}

/// One installed version in a per-bundle listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub version: String,
    pub current: bool,
    /// Seconds since the Unix epoch of the version directory's mtime.
    pub installed_at: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_archive_name() {
        let id = BundleId::from_archive_name("web-20240101.tar.gz").unwrap();
        assert_eq!(id.name, "web");
        assert_eq!(id.version, "20240101");
    }

    #[test]
    fn test_from_archive_name_hyphenated_bundle() {
        let id = BundleId::from_archive_name("my-cool-app-1.2.3.tar.gz").unwrap();
        assert_eq!(id.name, "my-cool-app");
        assert_eq!(id.version, "1.2.3");
    }

    #[test]
    fn test_from_archive_name_with_directories() {
        let id = BundleId::from_archive_name("/var/tmp/dl/web-2.tar.gz").unwrap();
        assert_eq!(id, BundleId::new("web", "2"));
    }

    #[test]
    fn test_from_archive_name_rejects_bad_names() {
        assert!(BundleId::from_archive_name("web-1.zip").is_err());
        assert!(BundleId::from_archive_name("web.tar.gz").is_err());
        assert!(BundleId::from_archive_name("-1.tar.gz").is_err());
        assert!(BundleId::from_archive_name("web-.tar.gz").is_err());
    }

    #[test]
    fn test_from_dir_name() {
        assert_eq!(
            BundleId::from_dir_name("web-20240101"),
            Some(BundleId::new("web", "20240101"))
        );
        assert_eq!(BundleId::from_dir_name("current"), None);
        assert_eq!(BundleId::from_dir_name("lost+found"), None);
    }

    #[test]
    fn test_names_round_trip() {
        let id = BundleId::new("web", "20240101");
        assert_eq!(id.dir_name(), "web-20240101");
        assert_eq!(id.to_string(), "web 20240101");
    }
}
