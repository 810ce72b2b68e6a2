//! Per-invocation scratch space, removed on drop.

use crate::error::{IoContext, Result};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Private temporary directory for downloads and rendered templates.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
    next: Cell<usize>,
}

impl Scratch {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("bundler-")
            .tempdir()
            .at(std::env::temp_dir())?;
        log::trace!("Scratch directory {}", dir.path().display());
        Ok(Self {
            dir,
            next: Cell::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh path inside the scratch directory ending in `name`.
    pub fn file(&self, name: &str) -> PathBuf {
        let n = self.next.get();
        self.next.set(n + 1);
        self.dir.path().join(format!("{n:04}-{name}"))
    }
}
