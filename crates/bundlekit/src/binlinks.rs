//! Binary Symlink Manager.
//!
//! Links a version's executables into the host `bin` directory. Candidates
//! come from the version's `binfiles` manifest when present, otherwise from
//! every file in its `bin/` directory.

use crate::error::{Error, IoContext, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Optional manifest listing executables, one path per line.
pub const BINFILES: &str = "binfiles";

/// An executable that may be linked into the host `bin` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Link name under the host `bin` directory.
    pub name: String,
    /// Absolute path inside the version tree.
    pub source: PathBuf,
}

impl Candidate {
    fn from_path(source: PathBuf) -> Option<Self> {
        let name = source.file_name()?.to_string_lossy().to_string();
        Some(Self { name, source })
    }

    /// Whether the candidate is a file with an execute bit set.
    pub fn is_executable(&self) -> bool {
        fs::metadata(&self.source)
            .map(|m| m.is_file() && is_exec_mode(&m))
            .unwrap_or(false)
    }
}

#[cfg(unix)]
fn is_exec_mode(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_exec_mode(_meta: &fs::Metadata) -> bool {
    true
}

/// Binary links for one version of one bundle.
#[derive(Debug, Clone)]
pub struct BinLinks<'a> {
    /// `<root>/<bundle>`; links into it belong to this bundle.
    pub bundle_dir: &'a Path,
    /// `<root>/<bundle>/<bundle>-<version>`.
    pub version_dir: &'a Path,
    /// Host `bin` directory.
    pub bin_dir: &'a Path,
    pub force: bool,
}

impl BinLinks<'_> {
    /// Executables this version offers, in manifest or directory order.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let manifest = self.version_dir.join(BINFILES);
        if manifest.is_file() {
            let content = fs::read_to_string(&manifest).at(&manifest)?;
            return Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .filter(|line| {
                    let inside = stays_inside(line);
                    if !inside {
                        log::warn!("Ignoring {BINFILES} entry outside the version: {line}");
                    }
                    inside
                })
                .filter_map(|line| Candidate::from_path(self.version_dir.join(line)))
                .collect());
        }

        let bin = self.version_dir.join("bin");
        if !bin.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&bin).at(&bin)? {
            let path = entry.at(&bin)?.path();
            if !path.is_dir() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths.into_iter().filter_map(Candidate::from_path).collect())
    }

    fn link_path(&self, candidate: &Candidate) -> PathBuf {
        self.bin_dir.join(&candidate.name)
    }

    /// Names whose host path is occupied by something other than this bundle's link.
    pub fn conflicts(&self, candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .filter(|c| self.is_conflict(&self.link_path(c)))
            .map(|c| c.name.clone())
            .collect()
    }

    fn is_conflict(&self, link: &Path) -> bool {
        let Ok(meta) = fs::symlink_metadata(link) else {
            return false;
        };
        if !meta.file_type().is_symlink() {
            return true;
        }
        match fs::read_link(link) {
            Ok(target) => !self.bin_dir.join(target).starts_with(self.bundle_dir),
            Err(_) => true,
        }
    }

    /// Link every executable candidate, all-or-nothing on conflicts.
    pub fn install(&self) -> Result<Vec<PathBuf>> {
        let candidates = self.candidates()?;

        let conflicts = self.conflicts(&candidates);
        if !conflicts.is_empty() {
            if !self.force {
                return Err(Error::BinaryConflicts {
                    dir: self.bin_dir.to_path_buf(),
                    names: conflicts,
                });
            }
            log::warn!("Replacing existing {}", conflicts.join(", "));
        }

        fs::create_dir_all(self.bin_dir).at(self.bin_dir)?;

        let mut linked = Vec::new();
        for candidate in &candidates {
            if !candidate.is_executable() {
                log::debug!("Skipping non-executable {}", candidate.source.display());
                continue;
            }

            let link = self.link_path(candidate);
            if fs::symlink_metadata(&link).is_ok() {
                fs::remove_file(&link).at(&link)?;
            }
            symlink_file(&candidate.source, &link)?;

            log::info!("Linked {} -> {}", link.display(), candidate.source.display());
            linked.push(link);
        }
        Ok(linked)
    }

    /// Remove candidate links; real files with the same name are never touched.
    pub fn remove(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for candidate in self.candidates()? {
            let link = self.link_path(&candidate);
            if link.is_symlink() {
                fs::remove_file(&link).at(&link)?;
                log::info!("Unlinked {}", link.display());
                removed.push(link);
            }
        }
        Ok(removed)
    }

    /// `(linked, expected)`: links pointing at this version vs. executables offered.
    pub fn link_counts(&self) -> Result<(usize, usize)> {
        let mut linked = 0;
        let mut expected = 0;
        for candidate in self.candidates()? {
            if !candidate.is_executable() {
                continue;
            }
            expected += 1;
            let link = self.link_path(&candidate);
            if fs::read_link(&link).is_ok_and(|target| self.bin_dir.join(target) == candidate.source)
            {
                linked += 1;
            }
        }
        Ok((linked, expected))
    }
}

/// A manifest entry that names only paths below the version directory.
fn stays_inside(entry: &str) -> bool {
    Path::new(entry)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn symlink_file(source: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(source, link).at(link)?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_file(source, link).at(link)?;
    Ok(())
}
