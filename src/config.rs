//! Settings resolution.
//!
//! Order: command-line flag, environment variable (handled by clap), config
//! file, built-in default. The result is a single immutable
//! [`bundlekit::Settings`] built once per invocation.

use anyhow::{Context, Result};
use bundlekit::{HostLayout, Settings};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Config file consulted when none is given explicitly.
pub const DEFAULT_CONFIG: &str = "/etc/bundler.toml";

/// Contents of `bundler.toml`.
///
/// ```toml
/// root = "/srv/bundles"
/// host_root = "/"
/// services = false
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<String>,
    pub host_root: Option<String>,
    pub services: Option<bool>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config format")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Load the explicit config, or `fallback` when it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing fallback is not.
    pub fn discover(explicit: Option<&Path>, fallback: &Path) -> Result<Option<Self>> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None if fallback.is_file() => {
                log::debug!("Using config {}", fallback.display());
                Self::load(fallback).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Build settings from global flags, the config file and defaults.
pub fn settings(args: &GlobalArgs) -> Result<Settings> {
    let file = FileConfig::discover(args.config.as_deref(), Path::new(DEFAULT_CONFIG))?
        .unwrap_or_default();
    resolve(args, &file)
}

fn resolve(args: &GlobalArgs, file: &FileConfig) -> Result<Settings> {
    let root = match (&args.root, &file.root) {
        (Some(root), _) => root.clone(),
        (None, Some(root)) => expand(root)?,
        (None, None) => PathBuf::from(bundlekit::DEFAULT_ROOT),
    };

    let host = match (&args.host_root, &file.host_root) {
        (Some(prefix), _) => HostLayout::under(prefix),
        (None, Some(prefix)) => HostLayout::under(expand(prefix)?),
        (None, None) => HostLayout::default(),
    };

    let services = !args.no_services && file.services.unwrap_or(true);

    Ok(Settings::new(root)
        .host(host)
        .force(args.force)
        .quiet(args.quiet)
        .services(services))
}

/// Expand `~` and `$VAR` in a configured path.
fn expand(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Could not expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
