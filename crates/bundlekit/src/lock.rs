//! Per-bundle advisory locking.
//!
//! Mutating operations hold an exclusive lock on
//! `<root>/.locks/<bundle>.lock` until the guard is dropped. Readers
//! (`list`, `status`) never take it.

use crate::error::{Error, IoContext, Result};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Directory under the store root holding lock files.
pub const LOCKS_DIR: &str = ".locks";

/// RAII guard for an exclusively-held bundle lock.
#[derive(Debug)]
pub struct BundleLock {
    file: File,
    path: PathBuf,
}

impl BundleLock {
    /// Block until the lock for `bundle` is held.
    pub fn acquire(root: &Path, bundle: &str) -> Result<Self> {
        let dir = root.join(LOCKS_DIR);
        fs::create_dir_all(&dir).at(&dir)?;

        let path = dir.join(format!("{bundle}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .at(&path)?;

        FileExt::lock_exclusive(&file).map_err(|source| Error::Lock {
            path: path.clone(),
            source,
        })?;

        log::debug!("Locked {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BundleLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::debug!("Failed to unlock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let tmp = TempDir::new().unwrap();
        let lock = BundleLock::acquire(tmp.path(), "web").unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path(), tmp.path().join(".locks").join("web.lock"));
    }

    #[test]
    fn test_lock_excludes_second_holder() {
        let tmp = TempDir::new().unwrap();
        let lock = BundleLock::acquire(tmp.path(), "web").unwrap();

        let other = OpenOptions::new().read(true).write(true).open(lock.path()).unwrap();
        assert!(!FileExt::try_lock_exclusive(&other).unwrap());

        // Other bundles are independent.
        let api = BundleLock::acquire(tmp.path(), "api");
        assert!(api.is_ok());

        drop(lock);
        assert!(FileExt::try_lock_exclusive(&other).unwrap());
        FileExt::unlock(&other).unwrap();
    }

    #[test]
    fn test_lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        {
            let _lock = BundleLock::acquire(tmp.path(), "web").unwrap();
        }
        // Would block forever if the first guard leaked its lock.
        let again = BundleLock::acquire(tmp.path(), "web");
        assert!(again.is_ok());
    }
}
