//! Templated File Reconciler.
//!
//! Templates under a version's `etc/` and `init/` trees are rendered into
//! host paths with [`BUNDLE_BIN_TOKEN`] replaced by the version's absolute
//! `bin` directory. Existing host files are never overwritten unless forced,
//! and on removal a host file is only deleted when it still matches a fresh
//! rendering of its template, so local edits survive a deactivate.

use crate::error::{IoContext, Result};
use crate::scratch::Scratch;
use crate::settings::BUNDLE_BIN_TOKEN;
use similar::TextDiff;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A template subtree and where it materializes on the host.
#[derive(Debug, Clone)]
pub struct TemplateTree {
    /// `<version>/etc` or `<version>/init`.
    pub source: PathBuf,
    /// Host directory receiving the rendered files.
    pub dest: PathBuf,
    /// Absolute `bin` directory substituted for the token.
    pub bin_dir: PathBuf,
    /// Mode applied to installed files; template mode is kept when `None`.
    pub mode: Option<u32>,
}

impl TemplateTree {
    /// Plain files under `source`, as sorted paths relative to it.
    ///
    /// A missing subtree has no templates.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.source.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.source).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.source) {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Host paths the templates materialize to.
    pub fn destinations(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .files()?
            .into_iter()
            .map(|relative| self.dest.join(relative))
            .collect())
    }
}

/// Outcome of [`Reconciler::install`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<PathBuf>,
    /// Host files left alone because they already existed.
    pub preserved: Vec<PathBuf>,
}

/// Outcome of [`Reconciler::remove_unchanged`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    pub removed: Vec<PathBuf>,
    /// Host files kept because they differ from their template.
    pub modified: Vec<PathBuf>,
}

/// Installs and removes template trees, rendering through scratch space.
#[derive(Debug)]
pub struct Reconciler<'a> {
    scratch: &'a Scratch,
    force: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(scratch: &'a Scratch, force: bool) -> Self {
        Self { scratch, force }
    }

    /// Materialize every template whose destination is missing (or all, if forced).
    pub fn install(&self, tree: &TemplateTree) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        for relative in tree.files()? {
            let template = tree.source.join(&relative);
            let dest = tree.dest.join(&relative);

            let exists = dest.exists() || dest.is_symlink();
            if exists && !self.force {
                log::debug!("Keeping existing {}", dest.display());
                report.preserved.push(dest);
                continue;
            }

            let rendered = self.render_to_scratch(&template, &tree.bin_dir)?;

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).at(parent)?;
            }
            if dest.is_symlink() {
                fs::remove_file(&dest).at(&dest)?;
            }
            fs::copy(&rendered, &dest).at(&dest)?;

            if let Some(mode) = tree.mode {
                set_mode(&dest, mode)?;
            }

            log::info!("Installed {}", dest.display());
            report.installed.push(dest);
        }

        Ok(report)
    }

    /// Delete host files that still match their rendered template.
    ///
    /// Diverging files are kept and reported, unless forced.
    pub fn remove_unchanged(&self, tree: &TemplateTree) -> Result<RemoveReport> {
        let mut report = RemoveReport::default();

        for relative in tree.files()? {
            let template = tree.source.join(&relative);
            let dest = tree.dest.join(&relative);

            if !dest.is_file() {
                continue;
            }

            let rendered = self.render_to_scratch(&template, &tree.bin_dir)?;
            let unchanged = content_hash(&rendered)? == content_hash(&dest)?;

            if unchanged || self.force {
                fs::remove_file(&dest).at(&dest)?;
                log::info!("Removed {}", dest.display());
                report.removed.push(dest);
            } else {
                log::warn!(
                    "{} has local modifications, leaving it in place",
                    dest.display()
                );
                log_diff(&rendered, &dest);
                report.modified.push(dest);
            }
        }

        Ok(report)
    }

    fn render_to_scratch(&self, template: &Path, bin_dir: &Path) -> Result<PathBuf> {
        let name = template
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "template".to_string());
        let out = self.scratch.file(&name);
        render(template, bin_dir, &out)?;
        Ok(out)
    }
}

/// Render `template` into `out`, substituting the bin token.
///
/// The rendered file keeps the template's permissions.
pub fn render(template: &Path, bin_dir: &Path, out: &Path) -> Result<()> {
    let content = fs::read(template).at(template)?;
    let bin = bin_dir.to_string_lossy();
    let rendered = substitute(&content, BUNDLE_BIN_TOKEN.as_bytes(), bin.as_bytes());
    fs::write(out, rendered).at(out)?;

    let permissions = fs::metadata(template).at(template)?.permissions();
    fs::set_permissions(out, permissions).at(out)?;
    Ok(())
}

/// Replace every occurrence of `token` in `content`.
fn substitute(content: &[u8], token: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut rest = content;
    while let Some(pos) = rest.windows(token.len()).position(|w| w == token) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + token.len()..];
    }
    out.extend_from_slice(rest);
    out
}

/// BLAKE3 hash of a file's content.
pub fn content_hash(path: &Path) -> Result<blake3::Hash> {
    let mut file = File::open(path).at(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).at(path)?;
    Ok(hasher.finalize())
}

fn log_diff(rendered: &Path, live: &Path) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let (Ok(expected), Ok(actual)) = (fs::read_to_string(rendered), fs::read_to_string(live))
    else {
        return;
    };
    let diff = TextDiff::from_lines(&expected, &actual)
        .unified_diff()
        .header("template", &live.to_string_lossy())
        .to_string();
    log::debug!("Local changes to {}:\n{}", live.display(), diff);
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).at(path)
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
