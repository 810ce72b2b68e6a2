//! Bundle Store: name-and-version addressing of installed trees.
//!
//! ```text
//! <root>/<bundle>/current -> <bundle>-<version>
//! <root>/<bundle>/<bundle>-<version>/{bin,lib,etc,init,binfiles}
//! ```

use crate::error::{Error, IoContext, Result};
use crate::lock::{BundleLock, LOCKS_DIR};
use crate::types::{BundleId, CURRENT};
use std::fs;
use std::path::{Path, PathBuf};

/// Version string accepted by [`Store::basedir`] to mean the current pointer.
pub const CURRENT_VERSION: &str = CURRENT;

/// On-disk bundle store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open the store at `root`. The directory need not exist yet.
    ///
    /// Relative roots are made absolute so rendered `bin` paths are usable
    /// from anywhere on the host.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject names that would escape the store or collide with its metadata.
    pub fn validate_name(name: &str) -> Result<()> {
        let bad = name.is_empty()
            || name.starts_with('.')
            || name == CURRENT
            || name.contains(['/', '\\', '\0']);
        if bad {
            return Err(Error::InvalidBundleName(name.to_string()));
        }
        Ok(())
    }

    /// Reject versions that would leave the bundle directory or not parse back
    /// from `<bundle>-<version>`.
    pub fn validate_version(version: &str) -> Result<()> {
        let bad = version.is_empty()
            || version == "."
            || version == ".."
            || version.contains(['-', '/', '\\', '\0']);
        if bad {
            return Err(Error::InvalidVersion(version.to_string()));
        }
        Ok(())
    }

    pub fn bundle_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn version_dir(&self, id: &BundleId) -> PathBuf {
        self.bundle_dir(&id.name).join(id.dir_name())
    }

    pub fn current_link(&self, name: &str) -> PathBuf {
        self.bundle_dir(name).join(CURRENT)
    }

    /// Resolve a version tree, dereferencing `"current"` to its concrete version.
    pub fn basedir(&self, name: &str, version: &str) -> Result<PathBuf> {
        let version = if version == CURRENT_VERSION {
            self.read_current(name)?
        } else {
            Self::validate_version(version)?;
            version.to_string()
        };
        Ok(self.version_dir(&BundleId::new(name, version)))
    }

    /// Whether the `current` symlink exists.
    ///
    /// A dangling link still counts as installed.
    pub fn installed(&self, name: &str) -> bool {
        fs::symlink_metadata(self.current_link(name)).is_ok()
    }

    /// Whether the `current` symlink exists but its target does not.
    pub fn is_dangling(&self, name: &str) -> bool {
        self.installed(name) && !self.current_link(name).exists()
    }

    /// Point `current` at `version`.
    ///
    /// The old link is removed before the new one is created, so concurrent
    /// readers may briefly see no pointer; callers hold the bundle lock.
    pub fn set_current(&self, name: &str, version: &str) -> Result<()> {
        let link = self.current_link(name);
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link).at(&link)?;
        }

        let target = BundleId::new(name, version).dir_name();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link).at(&link)?;
        #[cfg(windows)]
        std::os::windows::fs::symlink_dir(&target, &link).at(&link)?;

        log::debug!("{} -> {}", link.display(), target);
        Ok(())
    }

    /// Version the `current` pointer names, `None` when the pointer is absent.
    ///
    /// Fails when the bundle directory itself does not exist.
    pub fn current_version(&self, name: &str) -> Result<Option<String>> {
        if !self.bundle_dir(name).is_dir() {
            return Err(Error::BundleNotFound(name.to_string()));
        }
        if !self.installed(name) {
            return Ok(None);
        }
        self.read_current(name).map(Some)
    }

    fn read_current(&self, name: &str) -> Result<String> {
        let link = self.current_link(name);
        if !self.installed(name) {
            return Err(Error::NotInstalled(name.to_string()));
        }
        let target = fs::read_link(&link).at(&link)?;
        let dir_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let version = match BundleId::from_dir_name(&dir_name) {
            Some(id) if id.name == name => id.version,
            _ => dir_name
                .strip_prefix(&format!("{name}-"))
                .unwrap_or(&dir_name)
                .to_string(),
        };
        Ok(version)
    }

    /// Whether `version` of `name` is the current one.
    pub fn is_current(&self, name: &str, version: &str) -> bool {
        self.installed(name)
            && self
                .read_current(name)
                .map(|current| current == version)
                .unwrap_or(false)
    }

    /// Bundle directory names, sorted.
    pub fn bundles(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).at(&self.root)? {
            let entry = entry.at(&self.root)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || name == LOCKS_DIR {
                continue;
            }
            if entry.path().is_dir() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Installed versions of `name`, sorted.
    ///
    /// Only directories whose own name parses back to this bundle count.
    pub fn versions(&self, name: &str) -> Result<Vec<BundleId>> {
        let dir = self.bundle_dir(name);
        if !dir.is_dir() {
            return Err(Error::BundleNotFound(name.to_string()));
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir).at(&dir)? {
            let entry = entry.at(&dir)?;
            let file_type = entry.file_type().at(entry.path())?;
            if !file_type.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            match BundleId::from_dir_name(&dir_name) {
                Some(id) if id.name == name => versions.push(id),
                _ => log::debug!("Ignoring unrelated directory {}", entry.path().display()),
            }
        }
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(versions)
    }

    /// Delete one version tree.
    pub fn remove_version(&self, id: &BundleId) -> Result<()> {
        let dir = self.version_dir(id);
        fs::remove_dir_all(&dir).at(&dir)?;
        log::info!("Removed {}", dir.display());
        Ok(())
    }

    /// Delete a bundle directory with every version in it.
    pub fn remove_bundle(&self, name: &str) -> Result<()> {
        let dir = self.bundle_dir(name);
        fs::remove_dir_all(&dir).at(&dir)?;
        log::info!("Removed {}", dir.display());
        Ok(())
    }

    /// Take the advisory lock for `name`.
    pub fn lock(&self, name: &str) -> Result<BundleLock> {
        BundleLock::acquire(&self.root, name)
    }
}
