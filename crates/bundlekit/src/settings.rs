//! Immutable run configuration.
//!
//! A [`Settings`] value is built once from parsed arguments and passed by
//! reference into every operation.

use std::path::{Path, PathBuf};

/// Default bundle store root.
pub const DEFAULT_ROOT: &str = "/opt/bundler";

/// Token replaced with the version's absolute `bin` directory in templates.
pub const BUNDLE_BIN_TOKEN: &str = "@BUNDLE_BIN@";

/// Host directories that receive materialized files and links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    /// Destination for `etc/` templates.
    pub etc_dir: PathBuf,
    /// Destination for `init/` templates.
    pub init_dir: PathBuf,
    /// Destination for executable symlinks.
    pub bin_dir: PathBuf,
}

impl HostLayout {
    /// Layout rooted at `prefix` (`/` for the real host).
    pub fn under(prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        Self {
            etc_dir: prefix.join("etc"),
            init_dir: prefix.join("etc").join("init.d"),
            bin_dir: prefix.join("bin"),
        }
    }
}

impl Default for HostLayout {
    fn default() -> Self {
        Self::under("/")
    }
}

/// Options shared by every lifecycle operation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bundle store root.
    pub root: PathBuf,
    /// Host paths for activation side effects.
    pub host: HostLayout,
    /// Overwrite host files, remove edited files, delete whole bundles.
    pub force: bool,
    /// Install without activating.
    pub quiet: bool,
    /// Start and stop services during (de)activation.
    pub services: bool,
}

impl Settings {
    /// Settings with default flags for the given store root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: HostLayout::default(),
            force: false,
            quiet: false,
            services: true,
        }
    }

    pub fn host(mut self, host: HostLayout) -> Self {
        self.host = host;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn services(mut self, services: bool) -> Self {
        self.services = services;
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}
