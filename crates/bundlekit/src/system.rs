//! System effects port.
//!
//! Everything that reaches outside the bundle store (network fetches, the
//! service manager, ELF patching) goes through [`SystemEffects`] so the
//! lifecycle sequencing can be tested with [`MockSystem`].
//!
//! ```
//! use bundlekit::system::{MockSystem, ServiceAction, SystemCall, SystemEffects};
//! use std::path::Path;
//!
//! let mock = MockSystem::new();
//! mock.service("webd", Path::new("/etc/init.d/webd"), ServiceAction::Start).unwrap();
//! assert_eq!(
//!     mock.calls(),
//!     vec![SystemCall::Service { name: "webd".into(), action: ServiceAction::Start }]
//! );
//! ```

use crate::error::{Error, IoContext, Result};
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

/// Upper bound for a downloaded archive.
const MAX_DOWNLOAD_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Service manager verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects outside the bundle store.
pub trait SystemEffects {
    /// Download `url` to `dest`.
    ///
    /// Implementations may succeed without producing a file; callers check.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;

    /// Start or stop the service whose init script is `script`.
    fn service(&self, name: &str, script: &Path, action: ServiceAction) -> Result<()>;

    /// Rewrite the runtime library search path of a dynamic ELF file.
    fn set_rpath(&self, binary: &Path, rpath: &Path) -> Result<()>;
}

// =============================================================================
// Host implementation
// =============================================================================

/// Real host: `ureq`/`curl` for downloads, `service` for init scripts,
/// `patchelf` for RPATH rewrites.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl HostSystem {
    pub fn new() -> Self {
        Self
    }

    fn fetch_http(url: &str, dest: &Path) -> Result<()> {
        let agent = ureq::Agent::new_with_defaults();
        let mut response = agent
            .get(url)
            .header("User-Agent", concat!("bundler/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| Error::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let mut file = File::create(dest).at(dest)?;
        let reader = response.body_mut().as_reader();
        let copied = copy_limited(reader, &mut file, MAX_DOWNLOAD_SIZE).map_err(|e| {
            Error::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let Some(copied) = copied else {
            drop(file);
            fs::remove_file(dest).at(dest)?;
            return Err(Error::FetchFailed {
                url: url.to_string(),
                message: format!("archive is larger than {MAX_DOWNLOAD_SIZE} bytes"),
            });
        };

        log::debug!("Downloaded {copied} bytes from {url}");
        Ok(())
    }

    fn fetch_ftp(url: &str, dest: &Path) -> Result<()> {
        let curl = which::which("curl").map_err(|_| Error::ToolMissing("curl".to_string()))?;
        run_checked(
            &curl,
            &[
                OsStr::new("-fsSL"),
                OsStr::new("-o"),
                dest.as_os_str(),
                OsStr::new(url),
            ],
        )
        .map_err(|e| Error::FetchFailed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl SystemEffects for HostSystem {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::fetch_http(url, dest)
        } else if lower.starts_with("ftp://") {
            Self::fetch_ftp(url, dest)
        } else {
            Err(Error::UnsupportedUrl(url.to_string()))
        }
    }

    fn service(&self, name: &str, script: &Path, action: ServiceAction) -> Result<()> {
        match which::which("service") {
            Ok(service) => run_checked(&service, &[OsStr::new(name), OsStr::new(action.as_str())]),
            Err(_) => run_checked(script, &[OsStr::new(action.as_str())]),
        }
    }

    fn set_rpath(&self, binary: &Path, rpath: &Path) -> Result<()> {
        let patchelf =
            which::which("patchelf").map_err(|_| Error::ToolMissing("patchelf".to_string()))?;
        run_checked(
            &patchelf,
            &[OsStr::new("--set-rpath"), rpath.as_os_str(), binary.as_os_str()],
        )
    }
}

/// Copy at most `limit` bytes; `None` when the reader holds more than that.
fn copy_limited<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    limit: u64,
) -> io::Result<Option<u64>> {
    let mut limited = reader.take(limit);
    let copied = io::copy(&mut limited, writer)?;
    if copied < limit {
        return Ok(Some(copied));
    }

    let mut probe = [0u8; 1];
    let more = limited.into_inner().read(&mut probe)?;
    Ok((more == 0).then_some(copied))
}

/// Run a command, capturing output, and fail on a non-zero exit.
fn run_checked(program: &Path, args: &[&OsStr]) -> Result<()> {
    let command_line = std::iter::once(program.as_os_str())
        .chain(args.iter().copied())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    log::debug!("Running: {command_line}");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::CommandFailed {
            command: command_line.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed {
            command: command_line,
            message: if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                stderr.trim().to_string()
            },
        });
    }
    Ok(())
}

// =============================================================================
// Mock implementation
// =============================================================================

/// A recorded call into the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCall {
    Fetch { url: String },
    Service { name: String, action: ServiceAction },
    SetRpath { binary: PathBuf, rpath: PathBuf },
}

/// In-memory port for tests.
///
/// Clones share the call log, so a test can hand one clone to the
/// controller and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MockSystem {
    calls: Arc<Mutex<Vec<SystemCall>>>,
    downloads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing_services: Arc<Mutex<HashSet<String>>>,
}

impl MockSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` when `url` is fetched. Unknown URLs produce no file.
    pub fn add_download(&self, url: impl Into<String>, data: Vec<u8>) {
        let mut downloads = self.downloads.lock().unwrap();
        downloads.insert(url.into(), data);
    }

    /// Make every action on `name` fail.
    pub fn fail_service(&self, name: impl Into<String>) {
        let mut failing = self.failing_services.lock().unwrap();
        failing.insert(name.into());
    }

    /// Snapshot of recorded calls, oldest first.
    pub fn calls(&self) -> Vec<SystemCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded service calls as `(name, action)` pairs.
    pub fn service_calls(&self) -> Vec<(String, ServiceAction)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SystemCall::Service { name, action } => Some((name, action)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SystemCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SystemEffects for MockSystem {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(SystemCall::Fetch {
            url: url.to_string(),
        });
        let downloads = self.downloads.lock().unwrap();
        if let Some(data) = downloads.get(url) {
            fs::write(dest, data).at(dest)?;
        }
        Ok(())
    }

    fn service(&self, name: &str, script: &Path, action: ServiceAction) -> Result<()> {
        self.record(SystemCall::Service {
            name: name.to_string(),
            action,
        });
        if self.failing_services.lock().unwrap().contains(name) {
            return Err(Error::CommandFailed {
                command: format!("service {name} {action}"),
                message: format!("mock failure for {}", script.display()),
            });
        }
        Ok(())
    }

    fn set_rpath(&self, binary: &Path, rpath: &Path) -> Result<()> {
        self.record(SystemCall::SetRpath {
            binary: binary.to_path_buf(),
            rpath: rpath.to_path_buf(),
        });
        Ok(())
    }
}
