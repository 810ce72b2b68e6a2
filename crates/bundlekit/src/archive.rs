//! Archive handling: remote sources and `.tar.gz` extraction.

use crate::error::{Error, IoContext, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::Path;
use tar::Archive;

/// URL schemes that are fetched before installing.
const REMOTE_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

/// Whether `source` names a remote archive rather than a local path.
pub fn is_url(source: &str) -> bool {
    REMOTE_SCHEMES.iter().any(|scheme| {
        source
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// File name component of a URL, ignoring query and fragment.
pub fn url_file_name(url: &str) -> Result<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    // The first segment is the host.
    let name = path
        .split_once('/')
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.rsplit('/').next())
        .unwrap_or_default();

    if name.is_empty() {
        return Err(Error::UnsupportedUrl(url.to_string()));
    }
    Ok(name.to_string())
}

/// Unpack a gzip-compressed tarball into `dest`, creating it if needed.
///
/// Entries that would escape `dest` are skipped by `tar`.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).at(dest)?;
    let file = File::open(archive_path).at(archive_path)?;

    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::ExtractionFailed {
            archive: archive_path.to_path_buf(),
            message: e.to_string(),
        })?;

    log::debug!("Extracted {} into {}", archive_path.display(), dest.display());
    Ok(())
}
