//! Error types for bundle store operations.
//!
//! Errors are categorized so the CLI can print actionable advice. Every
//! failure is terminal for the invocation; there is no retry logic.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for bundle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of bundle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or malformed input (archive names, URLs).
    Usage,
    /// The store is not in a state that allows the operation.
    Precondition,
    /// Bundle, version or file does not exist.
    NotFound,
    /// Network fetch failed.
    Network,
    /// Permission denied.
    Permission,
    /// Archive or binary format problem.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Usage => "Invalid input",
            Self::Precondition => "Operation not allowed in current state",
            Self::NotFound => "Not found",
            Self::Network => "Network connectivity issue",
            Self::Permission => "Permission denied",
            Self::Format => "Invalid file format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Usage => "Archives must be named <bundle>-<version>.tar.gz",
            Self::Precondition => "Check `bundler list <bundle>` and adjust the requested action",
            Self::NotFound => "Verify the bundle name and version with `bundler list`",
            Self::Network => "Check the URL and your network connection, then try again",
            Self::Permission => "Run with appropriate access to the store and host paths",
            Self::Format => "The archive or file may be corrupted, rebuild it and try again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during bundle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Archive file name does not follow `<bundle>-<version>.tar.gz`.
    #[error("invalid archive name '{0}': expected <bundle>-<version>.tar.gz")]
    InvalidArchiveName(String),

    /// Bundle name cannot address a store directory.
    #[error("invalid bundle name '{0}'")]
    InvalidBundleName(String),

    /// Version string cannot address a version directory.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// Archive file does not exist.
    #[error("archive not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    /// Fetching a remote archive failed.
    #[error("failed to fetch {url}: {message}")]
    FetchFailed {
        /// Requested URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// URL scheme is not supported.
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// No bundle directory exists under the store root.
    #[error("bundle '{0}' not found")]
    BundleNotFound(String),

    /// The bundle has no `current` pointer.
    #[error("bundle '{0}' is not installed")]
    NotInstalled(String),

    /// The requested version directory does not exist.
    #[error("version {version} of '{bundle}' not found")]
    VersionNotFound {
        /// Bundle name.
        bundle: String,
        /// Requested version.
        version: String,
    },

    /// Destructive operation refused on the current version.
    #[error(
        "version {version} of '{bundle}' is current; activate another version before removing it"
    )]
    VersionIsCurrent {
        /// Bundle name.
        bundle: String,
        /// Current version.
        version: String,
    },

    /// Removing a whole bundle requires `--force`.
    #[error("removing every version of '{bundle}' requires --force (or name a version)")]
    ForceRequired {
        /// Bundle name.
        bundle: String,
    },

    /// Executables would shadow existing files in the host bin directory.
    #[error("binary link conflicts in {}: {}", .dir.display(), .names.join(", "))]
    BinaryConflicts {
        /// Host bin directory.
        dir: PathBuf,
        /// Conflicting executable names.
        names: Vec<String>,
    },

    /// Extraction did not produce `<bundle>-<version>/`.
    #[error("archive {} did not contain {}", .archive.display(), .expected.display())]
    ExtractedTreeMissing {
        /// Archive that was extracted.
        archive: PathBuf,
        /// Directory that was expected afterwards.
        expected: PathBuf,
    },

    /// Archive could not be decompressed or unpacked.
    #[error("failed to extract {}: {message}", .archive.display())]
    ExtractionFailed {
        /// Archive path.
        archive: PathBuf,
        /// Error message.
        message: String,
    },

    /// Advisory lock could not be taken.
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A required external tool is not on PATH.
    #[error("required tool not found: {0}")]
    ToolMissing(String),

    /// External command exited unsuccessfully.
    #[error("command failed: {command}: {message}")]
    CommandFailed {
        /// Command line that was run.
        command: String,
        /// Captured stderr or failure reason.
        message: String,
    },

    /// IO error during file operations.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidArchiveName(_)
            | Error::InvalidBundleName(_)
            | Error::InvalidVersion(_)
            | Error::UnsupportedUrl(_) => ErrorCategory::Usage,
            Error::VersionIsCurrent { .. }
            | Error::ForceRequired { .. }
            | Error::BinaryConflicts { .. }
            | Error::NotInstalled(_)
            | Error::Lock { .. } => ErrorCategory::Precondition,
            Error::ArchiveNotFound(_)
            | Error::BundleNotFound(_)
            | Error::VersionNotFound { .. }
            | Error::ToolMissing(_) => ErrorCategory::NotFound,
            Error::FetchFailed { .. } => ErrorCategory::Network,
            Error::ExtractedTreeMissing { .. } | Error::ExtractionFailed { .. } => {
                ErrorCategory::Format
            }
            Error::Io { source, .. } => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    ErrorCategory::Permission
                } else {
                    ErrorCategory::Other
                }
            }
            Error::CommandFailed { .. } => ErrorCategory::Other,
        }
    }
}

/// Attach a path to an IO result.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::io(path, source))
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::other("directory walk failed"));
        Self::Io { path, source }
    }
}
