//! On-disk cache of extracted artifacts.

use crate::{LoaderError, LoaderResult};
use aploader_bundle::{BundleError, ResourceEntry, ResourceProvider};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A version-scoped extraction directory.
///
/// Files are named by artifact kind only, so a directory must never hold
/// artifacts of two versions; [`LoaderConfig::extraction_directory`]
/// guarantees that by putting the version in the directory name.
///
/// [`LoaderConfig::extraction_directory`]: crate::LoaderConfig::extraction_directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCache {
    dir: PathBuf,
}

impl ExtractionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Where `entry` lives once extracted.
    #[must_use]
    pub fn target_path(&self, entry: &ResourceEntry) -> PathBuf {
        self.dir.join(entry.cache_file_name())
    }

    /// Extract `entry` unless it is already present, and return its path.
    ///
    /// An existing file is trusted without reading it. New files are written
    /// under a temporary name and renamed into place, so other threads and
    /// processes sharing the directory only ever see complete files.
    pub fn materialize(
        &self,
        provider: &dyn ResourceProvider,
        entry: &ResourceEntry,
    ) -> LoaderResult<PathBuf> {
        let target = self.target_path(entry);
        if target.exists() {
            debug!(path = %target.display(), "artifact already extracted");
            return Ok(target);
        }

        let resource = entry.resource_path();
        let mut reader = provider
            .open(&resource)?
            .ok_or(LoaderError::Bundle(BundleError::MissingFile(resource)))?;

        fs::create_dir_all(&self.dir).map_err(extraction_error(&self.dir))?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}", entry.cache_file_name()))
            .tempfile_in(&self.dir)
            .map_err(extraction_error(&target))?;
        io::copy(&mut reader, temp.as_file_mut()).map_err(extraction_error(&target))?;
        temp.as_file().sync_all().map_err(extraction_error(&target))?;
        set_mode(temp.path(), entry.kind().is_executable()).map_err(extraction_error(&target))?;

        // rename replaces a file another process may have persisted meanwhile;
        // both copies come from the same bundle
        temp.persist(&target)
            .map_err(|e| extraction_error(&target)(e.error))?;

        info!(kind = %entry.kind(), path = %target.display(), "extracted artifact");
        Ok(target)
    }

    /// Remove the whole directory. A directory that does not exist is fine.
    pub fn clear(&self) -> LoaderResult<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(path = %self.dir.display(), "cleared extraction directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(extraction_error(&self.dir)(e)),
        }
    }
}

fn extraction_error(path: &Path) -> impl Fn(io::Error) -> LoaderError + '_ {
    move |source| LoaderError::Extraction {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}
