//! Lifecycle Controller.
//!
//! Per bundle: absent → installed-inactive (quiet install) → active →
//! installed-inactive (deactivate) → absent (uninstall). Every mutating
//! operation holds the bundle's advisory lock and fails fast: a failing step
//! aborts the operation with whatever earlier steps already did left in
//! place.
//!
//! Activation order is fixed: init files, etc files, binary links, then
//! services. Deactivation stops services first, then removes init files,
//! etc files and binary links.

use crate::archive;
use crate::binlinks::BinLinks;
use crate::error::{Error, Result};
use crate::rpath;
use crate::scratch::Scratch;
use crate::settings::Settings;
use crate::status::{self, ActivationStatus, Observations};
use crate::store::Store;
use crate::system::{HostSystem, ServiceAction, SystemEffects};
use crate::template::{Reconciler, TemplateTree};
use crate::types::{BundleEntry, BundleId, VersionEntry};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Mode for rendered init scripts.
const INIT_MODE: u32 = 0o755;

/// Result of [`Controller::install`].
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub id: BundleId,
    pub path: PathBuf,
    /// Version that was current before the install, if any.
    pub previous: Option<String>,
    pub deactivated: Option<DeactivationReport>,
    pub rpath_patched: Vec<PathBuf>,
    /// `None` for quiet installs.
    pub activation: Option<ActivationReport>,
}

/// Host changes made while activating a version.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    pub installed: Vec<PathBuf>,
    /// Host files that already existed and were left alone.
    pub preserved: Vec<PathBuf>,
    pub linked: Vec<PathBuf>,
    pub started: Vec<String>,
}

/// Host changes made while deactivating a version.
#[derive(Debug, Clone, Default)]
pub struct DeactivationReport {
    pub version: String,
    pub stopped: Vec<String>,
    pub removed: Vec<PathBuf>,
    /// Host-edited files that were kept.
    pub modified: Vec<PathBuf>,
    pub unlinked: Vec<PathBuf>,
}

/// Result of [`Controller::uninstall`].
#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    pub removed: PathBuf,
    pub deactivated: Option<DeactivationReport>,
}

/// Result of [`Controller::status`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub version: Option<String>,
    pub status: ActivationStatus,
    /// `current` exists but its target does not.
    pub dangling: bool,
    pub templates: (usize, usize),
    pub links: (usize, usize),
}

/// Drives install, activate, deactivate, uninstall and listing.
pub struct Controller {
    settings: Settings,
    store: Store,
    system: Box<dyn SystemEffects>,
    scratch: Scratch,
}

impl Controller {
    /// Controller acting on the real host.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_system(settings, Box::new(HostSystem::new()))
    }

    /// Controller with a custom effects port (useful for testing).
    pub fn with_system(settings: Settings, system: Box<dyn SystemEffects>) -> Result<Self> {
        let store = Store::new(&settings.root);
        Ok(Self {
            settings,
            store,
            system,
            scratch: Scratch::new()?,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Install an archive from a local path or an http/https/ftp URL.
    pub fn install(&self, source: &str) -> Result<InstallOutcome> {
        let archive_path = self.resolve_source(source)?;
        let file_name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let id = BundleId::from_archive_name(&file_name)?;
        Store::validate_name(&id.name)?;
        Store::validate_version(&id.version)?;

        let lock = self.store.lock(&id.name)?;
        log::info!("Installing {} from {}", id, archive_path.display());
        log::debug!("Holding {}", lock.path().display());

        let previous = self.current_of(&id.name)?;
        let mut deactivated = None;
        if !self.settings.quiet
            && let Some(prev) = &previous
        {
            deactivated = self.deactivate_unlocked(&id.name, prev)?;
        }

        let bundle_dir = self.store.bundle_dir(&id.name);
        archive::extract(&archive_path, &bundle_dir)?;

        let version_dir = self.store.version_dir(&id);
        if !version_dir.is_dir() {
            return Err(Error::ExtractedTreeMissing {
                archive: archive_path,
                expected: version_dir,
            });
        }

        self.store.set_current(&id.name, &id.version)?;
        let rpath_patched = rpath::fixup(self.system.as_ref(), &version_dir)?;

        let activation = if self.settings.quiet {
            log::info!("Quiet install, skipping activation of {id}");
            None
        } else {
            Some(self.activate_unlocked(&id)?)
        };

        Ok(InstallOutcome {
            id,
            path: version_dir,
            previous,
            deactivated,
            rpath_patched,
            activation,
        })
    }

    /// Make an already-extracted version current and activate it.
    pub fn activate(&self, name: &str, version: &str) -> Result<ActivationReport> {
        Store::validate_name(name)?;
        Store::validate_version(version)?;
        let id = BundleId::new(name, version);
        let _lock = self.store.lock(name)?;

        if !self.store.version_dir(&id).is_dir() {
            return Err(Error::VersionNotFound {
                bundle: name.to_string(),
                version: version.to_string(),
            });
        }

        if let Some(current) = self.current_of(name)? {
            self.deactivate_unlocked(name, &current)?;
        }
        self.store.set_current(name, version)?;
        self.activate_unlocked(&id)
    }

    /// Deactivate `version` if it is the current one; otherwise do nothing.
    pub fn deactivate(&self, name: &str, version: &str) -> Result<Option<DeactivationReport>> {
        Store::validate_name(name)?;
        Store::validate_version(version)?;
        let _lock = self.store.lock(name)?;
        self.deactivate_unlocked(name, version)
    }

    /// Deactivate whichever version is current.
    pub fn deactivate_current(&self, name: &str) -> Result<Option<DeactivationReport>> {
        Store::validate_name(name)?;
        let _lock = self.store.lock(name)?;
        let current = self
            .current_of(name)?
            .ok_or_else(|| Error::NotInstalled(name.to_string()))?;
        self.deactivate_unlocked(name, &current)
    }

    /// Remove one version, or with `version = None` (and force) the whole bundle.
    ///
    /// The current version is never removed on its own.
    pub fn uninstall(&self, name: &str, version: Option<&str>) -> Result<UninstallOutcome> {
        Store::validate_name(name)?;

        let Some(version) = version else {
            if !self.settings.force {
                return Err(Error::ForceRequired {
                    bundle: name.to_string(),
                });
            }
            let bundle_dir = self.store.bundle_dir(name);
            if !bundle_dir.is_dir() {
                return Err(Error::BundleNotFound(name.to_string()));
            }

            let _lock = self.store.lock(name)?;
            let deactivated = match self.current_of(name)? {
                Some(current) => self.deactivate_unlocked(name, &current)?,
                None => None,
            };
            self.store.remove_bundle(name)?;
            return Ok(UninstallOutcome {
                removed: bundle_dir,
                deactivated,
            });
        };

        Store::validate_version(version)?;
        let id = BundleId::new(name, version);
        let _lock = self.store.lock(name)?;

        if self.current_of(name)?.as_deref() == Some(version) {
            return Err(Error::VersionIsCurrent {
                bundle: name.to_string(),
                version: version.to_string(),
            });
        }
        let version_dir = self.store.version_dir(&id);
        if !version_dir.is_dir() {
            return Err(Error::VersionNotFound {
                bundle: name.to_string(),
                version: version.to_string(),
            });
        }

        self.store.remove_version(&id)?;
        Ok(UninstallOutcome {
            removed: version_dir,
            deactivated: None,
        })
    }

    /// Every bundle under the root with its resolved current version.
    pub fn list(&self) -> Result<Vec<BundleEntry>> {
        self.store
            .bundles()?
            .into_iter()
            .map(|name| {
                let current = self.store.current_version(&name)?;
                Ok(BundleEntry { name, current })
            })
            .collect()
    }

    /// Installed versions of one bundle, flagging the current one.
    pub fn list_versions(&self, name: &str) -> Result<Vec<VersionEntry>> {
        Store::validate_name(name)?;
        let current = self.store.current_version(name)?;
        Ok(self
            .store
            .versions(name)?
            .into_iter()
            .map(|id| {
                let installed_at = fs::metadata(self.store.version_dir(&id))
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs());
                VersionEntry {
                    current: current.as_deref() == Some(id.version.as_str()),
                    version: id.version,
                    installed_at,
                }
            })
            .collect())
    }

    /// Derived activation status of a bundle's current version.
    pub fn status(&self, name: &str) -> Result<StatusReport> {
        Store::validate_name(name)?;
        let Some(version) = self.store.current_version(name)? else {
            return Ok(StatusReport {
                name: name.to_string(),
                version: None,
                status: ActivationStatus::NotInstalled,
                dangling: false,
                templates: (0, 0),
                links: (0, 0),
            });
        };

        let id = BundleId::new(name, &version);
        let obs = self.observe(&id)?;
        Ok(StatusReport {
            name: name.to_string(),
            status: status::derive(&obs),
            dangling: self.store.is_dangling(name),
            templates: (obs.templates_present, obs.templates_expected),
            links: (obs.links_present, obs.links_expected),
            version: Some(version),
        })
    }

    // =========================================================================
    // Sequences (caller holds the lock)
    // =========================================================================

    fn activate_unlocked(&self, id: &BundleId) -> Result<ActivationReport> {
        log::info!("Activating {id}");
        let reconciler = Reconciler::new(&self.scratch, self.settings.force);
        let mut report = ActivationReport::default();

        for tree in self.template_trees(id) {
            let installed = reconciler.install(&tree)?;
            report.installed.extend(installed.installed);
            report.preserved.extend(installed.preserved);
        }

        let bundle_dir = self.store.bundle_dir(&id.name);
        let version_dir = self.store.version_dir(id);
        report.linked = self.bin_links(&bundle_dir, &version_dir).install()?;

        if self.settings.services {
            for service in self.services(id)? {
                let script = self.settings.host.init_dir.join(&service);
                self.system
                    .service(&service, &script, ServiceAction::Start)?;
                log::info!("Started {service}");
                report.started.push(service);
            }
        }

        Ok(report)
    }

    fn deactivate_unlocked(&self, name: &str, version: &str) -> Result<Option<DeactivationReport>> {
        if self.current_of(name)?.as_deref() != Some(version) {
            log::debug!("{name} {version} is not current, nothing to deactivate");
            return Ok(None);
        }

        let id = BundleId::new(name, version);
        log::info!("Deactivating {id}");
        let mut report = DeactivationReport {
            version: version.to_string(),
            ..Default::default()
        };

        if self.settings.services {
            for service in self.services(&id)? {
                let script = self.settings.host.init_dir.join(&service);
                match self.system.service(&service, &script, ServiceAction::Stop) {
                    Ok(()) => {
                        log::info!("Stopped {service}");
                        report.stopped.push(service);
                    }
                    Err(e) => log::warn!("Failed to stop {service}: {e}"),
                }
            }
        }

        let reconciler = Reconciler::new(&self.scratch, self.settings.force);
        for tree in self.template_trees(&id) {
            let removed = reconciler.remove_unchanged(&tree)?;
            report.removed.extend(removed.removed);
            report.modified.extend(removed.modified);
        }

        let bundle_dir = self.store.bundle_dir(name);
        let version_dir = self.store.version_dir(&id);
        report.unlinked = self.bin_links(&bundle_dir, &version_dir).remove()?;

        Ok(Some(report))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Local archive path, fetching remote sources into scratch space first.
    fn resolve_source(&self, source: &str) -> Result<PathBuf> {
        if archive::is_url(source) {
            let file_name = archive::url_file_name(source)?;
            let dest = self.scratch.path().join(&file_name);
            log::info!("Fetching {source}");
            self.system.fetch(source, &dest)?;
            if !dest.is_file() {
                return Err(Error::FetchFailed {
                    url: source.to_string(),
                    message: "no file was produced".to_string(),
                });
            }
            return Ok(dest);
        }

        let path = PathBuf::from(source);
        if !path.is_file() {
            return Err(Error::ArchiveNotFound(path));
        }
        Ok(path)
    }

    /// Current version, `None` when the bundle has no directory or no pointer.
    ///
    /// An unreadable pointer is an error, never "no current version".
    fn current_of(&self, name: &str) -> Result<Option<String>> {
        if !self.store.bundle_dir(name).is_dir() {
            return Ok(None);
        }
        self.store.current_version(name)
    }

    /// Init templates first, then etc templates.
    fn template_trees(&self, id: &BundleId) -> [TemplateTree; 2] {
        let version_dir = self.store.version_dir(id);
        let bin_dir = version_dir.join("bin");
        [
            TemplateTree {
                source: version_dir.join("init"),
                dest: self.settings.host.init_dir.clone(),
                bin_dir: bin_dir.clone(),
                mode: Some(INIT_MODE),
            },
            TemplateTree {
                source: version_dir.join("etc"),
                dest: self.settings.host.etc_dir.clone(),
                bin_dir,
                mode: None,
            },
        ]
    }

    /// Service names: the top-level files of the version's `init/` tree.
    fn services(&self, id: &BundleId) -> Result<Vec<String>> {
        let [init, _] = self.template_trees(id);
        Ok(init
            .files()?
            .into_iter()
            .filter(|relative| relative.components().count() == 1)
            .map(|relative| relative.to_string_lossy().to_string())
            .collect())
    }

    fn bin_links<'a>(&'a self, bundle_dir: &'a Path, version_dir: &'a Path) -> BinLinks<'a> {
        BinLinks {
            bundle_dir,
            version_dir,
            bin_dir: &self.settings.host.bin_dir,
            force: self.settings.force,
        }
    }

    fn observe(&self, id: &BundleId) -> Result<Observations> {
        let version_dir = self.store.version_dir(id);
        let mut obs = Observations {
            is_current: self.store.is_current(&id.name, &id.version),
            tree_present: version_dir.is_dir(),
            ..Default::default()
        };
        if !obs.tree_present {
            return Ok(obs);
        }

        for tree in self.template_trees(id) {
            for dest in tree.destinations()? {
                obs.templates_expected += 1;
                if dest.is_file() {
                    obs.templates_present += 1;
                }
            }
        }

        let bundle_dir = self.store.bundle_dir(&id.name);
        let (linked, expected) = self.bin_links(&bundle_dir, &version_dir).link_counts()?;
        obs.links_present = linked;
        obs.links_expected = expected;
        Ok(obs)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::archive::tests::build_targz;
    use crate::settings::HostLayout;
    use crate::system::{MockSystem, SystemCall};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct Env {
        tmp: TempDir,
        mock: MockSystem,
    }

    impl Env {
        fn new() -> Self {
            Self {
                tmp: TempDir::new().unwrap(),
                mock: MockSystem::new(),
            }
        }

        fn root(&self) -> PathBuf {
            self.tmp.path().join("store")
        }

        fn host(&self) -> HostLayout {
            HostLayout::under(self.tmp.path().join("host"))
        }

        fn settings(&self) -> Settings {
            Settings::new(self.root()).host(self.host())
        }

        fn controller(&self, settings: Settings) -> Controller {
            Controller::with_system(settings, Box::new(self.mock.clone())).unwrap()
        }

        /// Write `web-<version>.tar.gz` with a server, a config template and an init script.
        fn web_archive(&self, version: &str) -> String {
            let top = format!("web-{version}");
            let conf = format!("version={version}\nbin=@BUNDLE_BIN@\n");
            let data = build_targz(&[
                (&format!("{top}/bin/serve"), b"#!/bin/sh\n", 0o755),
                (&format!("{top}/etc/app.conf"), conf.as_bytes(), 0o644),
                (&format!("{top}/init/webd"), b"#!/bin/sh\n", 0o644),
            ]);
            let path = self.tmp.path().join(format!("{top}.tar.gz"));
            fs::write(&path, data).unwrap();
            path.to_string_lossy().to_string()
        }

        fn etc(&self, name: &str) -> PathBuf {
            self.host().etc_dir.join(name)
        }

        fn bin(&self, name: &str) -> PathBuf {
            self.host().bin_dir.join(name)
        }

        fn init(&self, name: &str) -> PathBuf {
            self.host().init_dir.join(name)
        }
    }

    #[test]
    fn test_install_scenario() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        let outcome = ctl.install(&env.web_archive("20240101")).unwrap();

        let version_dir = env.root().join("web").join("web-20240101");
        assert_eq!(outcome.id, BundleId::new("web", "20240101"));
        assert_eq!(outcome.path, version_dir);
        assert_eq!(
            ctl.store().current_version("web").unwrap(),
            Some("20240101".to_string())
        );
        assert_eq!(
            ctl.store().basedir("web", "current").unwrap(),
            ctl.store().basedir("web", "20240101").unwrap()
        );

        assert_eq!(
            fs::read_link(env.bin("serve")).unwrap(),
            version_dir.join("bin/serve")
        );
        assert_eq!(
            fs::read_to_string(env.etc("app.conf")).unwrap(),
            format!(
                "version=20240101\nbin={}\n",
                version_dir.join("bin").display()
            )
        );
        let mode = fs::metadata(env.init("webd")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        assert_eq!(
            env.mock.service_calls(),
            vec![("webd".to_string(), ServiceAction::Start)]
        );
        assert_eq!(ctl.status("web").unwrap().status, ActivationStatus::Active);
    }

    #[test]
    fn test_quiet_install_skips_activation() {
        let env = Env::new();
        let ctl = env.controller(env.settings().quiet(true));
        let outcome = ctl.install(&env.web_archive("1")).unwrap();

        assert!(outcome.activation.is_none());
        assert!(ctl.store().installed("web"));
        assert!(!env.etc("app.conf").exists());
        assert!(!env.bin("serve").exists());
        assert!(env.mock.service_calls().is_empty());
        assert_eq!(ctl.status("web").unwrap().status, ActivationStatus::Inactive);
    }

    #[test]
    fn test_install_over_previous_deactivates_first() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        let outcome = ctl.install(&env.web_archive("2")).unwrap();

        assert_eq!(outcome.previous.as_deref(), Some("1"));
        let deactivated = outcome.deactivated.unwrap();
        assert_eq!(deactivated.version, "1");
        assert_eq!(deactivated.stopped, vec!["webd"]);

        // Old rendering was removed, so the new one was installed fresh.
        assert!(
            fs::read_to_string(env.etc("app.conf"))
                .unwrap()
                .starts_with("version=2")
        );
        assert_eq!(
            fs::read_link(env.bin("serve")).unwrap(),
            env.root().join("web/web-2/bin/serve")
        );
        assert_eq!(
            env.mock.service_calls(),
            vec![
                ("webd".to_string(), ServiceAction::Start),
                ("webd".to_string(), ServiceAction::Stop),
                ("webd".to_string(), ServiceAction::Start),
            ]
        );
    }

    #[test]
    fn test_install_from_url() {
        let env = Env::new();
        let local = env.web_archive("7");
        env.mock
            .add_download("https://dl.example.com/web-7.tar.gz", fs::read(local).unwrap());

        let ctl = env.controller(env.settings());
        let outcome = ctl.install("https://dl.example.com/web-7.tar.gz").unwrap();
        assert_eq!(outcome.id.version, "7");
        assert_eq!(
            env.mock.calls()[0],
            SystemCall::Fetch {
                url: "https://dl.example.com/web-7.tar.gz".to_string()
            }
        );
    }

    #[test]
    fn test_install_fetch_without_file_fails() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        let result = ctl.install("http://dl.example.com/web-7.tar.gz");
        assert!(matches!(result, Err(Error::FetchFailed { .. })));
        assert!(!env.root().join("web").exists());
    }

    #[test]
    fn test_install_missing_archive() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        let missing = env.tmp.path().join("web-1.tar.gz");
        let result = ctl.install(&missing.to_string_lossy());
        assert!(matches!(result, Err(Error::ArchiveNotFound(_))));
    }

    #[test]
    fn test_install_bad_name() {
        let env = Env::new();
        let path = env.tmp.path().join("web.tgz");
        fs::write(&path, b"x").unwrap();
        let ctl = env.controller(env.settings());
        assert!(matches!(
            ctl.install(&path.to_string_lossy()),
            Err(Error::InvalidArchiveName(_))
        ));
    }

    #[test]
    fn test_install_archive_without_expected_tree() {
        let env = Env::new();
        let path = env.tmp.path().join("web-1.tar.gz");
        fs::write(&path, build_targz(&[("other/bin/x", b"x", 0o755)])).unwrap();
        let ctl = env.controller(env.settings());
        assert!(matches!(
            ctl.install(&path.to_string_lossy()),
            Err(Error::ExtractedTreeMissing { .. })
        ));
        assert!(!ctl.store().installed("web"));
    }

    #[test]
    fn test_install_patches_dynamic_binaries() {
        let env = Env::new();
        let elf = crate::rpath::tests::elf64(2);
        let path = env.tmp.path().join("web-1.tar.gz");
        fs::write(
            &path,
            build_targz(&[
                ("web-1/bin/serve", &elf, 0o755),
                ("web-1/lib/libweb.so", &elf, 0o644),
            ]),
        )
        .unwrap();

        let ctl = env.controller(env.settings());
        let outcome = ctl.install(&path.to_string_lossy()).unwrap();
        assert_eq!(outcome.rpath_patched.len(), 2);
        assert!(env.mock.calls().contains(&SystemCall::SetRpath {
            binary: env.root().join("web/web-1/bin/serve"),
            rpath: env.root().join("web/web-1/lib"),
        }));
    }

    #[test]
    fn test_activate_switches_versions_in_order() {
        let env = Env::new();
        let quiet = env.controller(env.settings().quiet(true));
        quiet.install(&env.web_archive("20240101")).unwrap();

        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("20240102")).unwrap();
        assert_eq!(
            fs::read_link(env.bin("serve")).unwrap(),
            env.root().join("web/web-20240102/bin/serve")
        );

        let report = ctl.activate("web", "20240101").unwrap();
        assert_eq!(report.started, vec!["webd"]);
        assert_eq!(
            ctl.store().current_version("web").unwrap().as_deref(),
            Some("20240101")
        );
        assert_eq!(
            fs::read_link(env.bin("serve")).unwrap(),
            env.root().join("web/web-20240101/bin/serve")
        );
        assert!(
            fs::read_to_string(env.etc("app.conf"))
                .unwrap()
                .starts_with("version=20240101")
        );

        let calls = env.mock.service_calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[
                ("webd".to_string(), ServiceAction::Stop),
                ("webd".to_string(), ServiceAction::Start),
            ]
        );
    }

    #[test]
    fn test_activate_unknown_version() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        assert!(matches!(
            ctl.activate("web", "9"),
            Err(Error::VersionNotFound { .. })
        ));
        assert_eq!(ctl.store().current_version("web").unwrap().as_deref(), Some("1"));
        assert!(env.bin("serve").exists());
    }

    #[test]
    fn test_activate_binary_conflict_creates_no_links() {
        let env = Env::new();
        fs::create_dir_all(env.host().bin_dir).unwrap();
        fs::write(env.bin("serve"), "host serve").unwrap();

        let ctl = env.controller(env.settings());
        let result = ctl.install(&env.web_archive("1"));
        assert!(matches!(result, Err(Error::BinaryConflicts { .. })));
        assert_eq!(fs::read_to_string(env.bin("serve")).unwrap(), "host serve");
        assert!(env.mock.service_calls().is_empty());
    }

    #[test]
    fn test_deactivate_non_current_is_noop() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        assert!(ctl.deactivate("web", "0").unwrap().is_none());
        assert!(env.etc("app.conf").exists());
    }

    #[test]
    fn test_deactivate_keeps_host_edits() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        fs::write(env.etc("app.conf"), "tuned by ops\n").unwrap();

        let report = ctl.deactivate("web", "1").unwrap().unwrap();
        assert_eq!(report.modified, vec![env.etc("app.conf")]);
        assert_eq!(report.removed, vec![env.init("webd")]);
        assert_eq!(report.unlinked, vec![env.bin("serve")]);
        assert_eq!(
            fs::read_to_string(env.etc("app.conf")).unwrap(),
            "tuned by ops\n"
        );
        assert!(!env.init("webd").exists());
        assert!(!env.bin("serve").exists());
        assert_eq!(ctl.status("web").unwrap().status, ActivationStatus::Partial);
    }

    #[test]
    fn test_deactivate_stop_failure_is_soft() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        env.mock.fail_service("webd");

        let report = ctl.deactivate_current("web").unwrap().unwrap();
        assert!(report.stopped.is_empty());
        assert!(!env.etc("app.conf").exists());
    }

    #[test]
    fn test_services_disabled() {
        let env = Env::new();
        let ctl = env.controller(env.settings().services(false));
        ctl.install(&env.web_archive("1")).unwrap();
        ctl.deactivate_current("web").unwrap();
        assert!(env.mock.service_calls().is_empty());
    }

    #[test]
    fn test_uninstall_current_version_refused() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();

        assert!(matches!(
            ctl.uninstall("web", Some("1")),
            Err(Error::VersionIsCurrent { .. })
        ));
        assert!(env.root().join("web/web-1").is_dir());
        assert!(env.etc("app.conf").exists());
    }

    #[test]
    fn test_uninstall_whole_bundle_requires_force() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();

        assert!(matches!(
            ctl.uninstall("web", None),
            Err(Error::ForceRequired { .. })
        ));
        assert!(env.root().join("web/web-1").is_dir());
        assert!(env.bin("serve").exists());
    }

    #[test]
    fn test_uninstall_old_version() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        ctl.install(&env.web_archive("2")).unwrap();

        let outcome = ctl.uninstall("web", Some("1")).unwrap();
        assert_eq!(outcome.removed, env.root().join("web/web-1"));
        assert!(!outcome.removed.exists());
        assert!(env.root().join("web/web-2").is_dir());
        assert!(matches!(
            ctl.uninstall("web", Some("1")),
            Err(Error::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_uninstall_forced_removes_everything() {
        let env = Env::new();
        let ctl = env.controller(env.settings().force(true));
        ctl.install(&env.web_archive("1")).unwrap();
        fs::write(env.etc("app.conf"), "edited\n").unwrap();

        let outcome = ctl.uninstall("web", None).unwrap();
        assert!(outcome.deactivated.is_some());
        assert!(!env.root().join("web").exists());
        // Forced deactivation removes edited files too.
        assert!(!env.etc("app.conf").exists());
        assert!(!env.bin("serve").exists());
    }

    #[test]
    fn test_list_empty_root() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        assert!(ctl.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_bundles_and_versions() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        ctl.install(&env.web_archive("1")).unwrap();
        ctl.install(&env.web_archive("2")).unwrap();
        fs::create_dir_all(env.root().join("web/unrelated")).unwrap();
        fs::create_dir_all(env.root().join("empty")).unwrap();

        let bundles = ctl.list().unwrap();
        assert_eq!(
            bundles,
            vec![
                BundleEntry {
                    name: "empty".to_string(),
                    current: None
                },
                BundleEntry {
                    name: "web".to_string(),
                    current: Some("2".to_string())
                },
            ]
        );

        let versions = ctl.list_versions("web").unwrap();
        let flags: Vec<(&str, bool)> = versions
            .iter()
            .map(|v| (v.version.as_str(), v.current))
            .collect();
        assert_eq!(flags, vec![("1", false), ("2", true)]);
        assert!(versions[0].installed_at.is_some());
    }

    #[test]
    fn test_list_versions_unknown_bundle() {
        let env = Env::new();
        let ctl = env.controller(env.settings());
        assert!(matches!(
            ctl.list_versions("ghost"),
            Err(Error::BundleNotFound(_))
        ));
    }

    #[test]
    fn test_status_not_installed() {
        let env = Env::new();
        fs::create_dir_all(env.root().join("web")).unwrap();
        let ctl = env.controller(env.settings());
        let report = ctl.status("web").unwrap();
        assert_eq!(report.status, ActivationStatus::NotInstalled);
        assert_eq!(report.version, None);
    }

    #[test]
    fn test_status_dangling_pointer() {
        let env = Env::new();
        let ctl = env.controller(env.settings().quiet(true));
        ctl.install(&env.web_archive("1")).unwrap();
        fs::remove_dir_all(env.root().join("web/web-1")).unwrap();

        assert!(ctl.store().installed("web"));
        let report = ctl.status("web").unwrap();
        assert!(report.dangling);
        assert_eq!(report.status, ActivationStatus::Inactive);
    }

    #[test]
    fn test_escaping_version_rejected() {
        let env = Env::new();
        let ctl = env.controller(env.settings().quiet(true));
        ctl.install(&env.web_archive("1")).unwrap();
        ctl.install(&env.web_archive("2")).unwrap();
        let victim = env.root().join("victim");
        fs::create_dir_all(victim.join("precious")).unwrap();

        assert!(matches!(
            ctl.uninstall("web", Some("1/../../victim")),
            Err(Error::InvalidVersion(_))
        ));
        assert!(matches!(
            ctl.activate("web", "1/../../victim"),
            Err(Error::InvalidVersion(_))
        ));
        assert!(matches!(
            ctl.deactivate("web", ".."),
            Err(Error::InvalidVersion(_))
        ));
        assert!(matches!(
            ctl.activate("web", "1-2"),
            Err(Error::InvalidVersion(_))
        ));
        assert!(victim.join("precious").is_dir());
        assert_eq!(ctl.store().current_version("web").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_unreadable_current_pointer_aborts() {
        let env = Env::new();
        fs::create_dir_all(env.root().join("web/web-1")).unwrap();
        // A plain file where the symlink belongs: it exists but cannot be read as a link.
        fs::write(env.root().join("web/current"), "web-1").unwrap();

        let ctl = env.controller(env.settings());
        assert!(matches!(
            ctl.install(&env.web_archive("2")),
            Err(Error::Io { .. })
        ));
        assert!(!env.root().join("web/web-2").exists());
        assert!(matches!(
            ctl.activate("web", "1"),
            Err(Error::Io { .. })
        ));
        assert!(matches!(
            ctl.uninstall("web", Some("1")),
            Err(Error::Io { .. })
        ));
        assert!(env.root().join("web/web-1").is_dir());
    }

    #[test]
    fn test_invalid_bundle_name_rejected() {
        let env = Env::new();
        let ctl = env.controller(env.settings().force(true));
        assert!(matches!(
            ctl.uninstall("../etc", None),
            Err(Error::InvalidBundleName(_))
        ));
    }
}
