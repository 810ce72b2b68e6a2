//! # bundlekit
//!
//! Versioned bundle store with host activation.
//!
//! A bundle is a `<name>-<version>.tar.gz` archive holding a single
//! `<name>-<version>/` tree. This crate provides:
//! - A store of extracted versions with a `current` pointer per bundle
//! - Activation: templated `etc/` and `init/` files rendered onto the host,
//!   executables linked into the host `bin` directory, services started
//! - Deactivation that only removes host files still matching their template
//! - RPATH fixup so extracted binaries find their bundled libraries
//! - A per-bundle advisory lock around every mutation
//!
//! ## Example
//!
//! ```no_run
//! use bundlekit::{Controller, HostLayout, Settings};
//!
//! let settings = Settings::new("/opt/bundler").host(HostLayout::under("/"));
//! let controller = Controller::new(settings).expect("scratch space");
//!
//! let outcome = controller
//!     .install("https://example.com/dist/web-20240101.tar.gz")
//!     .expect("install failed");
//! println!("Installed {} to {}", outcome.id, outcome.path.display());
//!
//! for bundle in controller.list().unwrap() {
//!     println!("{} {:?}", bundle.name, bundle.current);
//! }
//! ```
//!
//! ## Host effects
//!
//! Downloads, service control and ELF patching go through
//! [`system::SystemEffects`]. [`system::MockSystem`] records those calls
//! instead of performing them:
//!
//! ```no_run
//! use bundlekit::{Controller, Settings};
//! use bundlekit::system::MockSystem;
//!
//! let mock = MockSystem::new();
//! let controller =
//!     Controller::with_system(Settings::new("/tmp/store"), Box::new(mock.clone())).unwrap();
//! controller.install("/tmp/web-1.tar.gz").unwrap();
//! println!("{:?}", mock.service_calls());
//! ```

#![warn(clippy::all)]

pub mod archive;
pub mod binlinks;
pub mod error;
pub mod lifecycle;
pub mod lock;
pub mod rpath;
pub mod scratch;
pub mod settings;
pub mod status;
pub mod store;
pub mod system;
pub mod template;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use lifecycle::{
    ActivationReport, Controller, DeactivationReport, InstallOutcome, StatusReport,
    UninstallOutcome,
};
pub use settings::{BUNDLE_BIN_TOKEN, DEFAULT_ROOT, HostLayout, Settings};
pub use status::ActivationStatus;
pub use store::Store;
pub use types::{BundleEntry, BundleId, VersionEntry};
