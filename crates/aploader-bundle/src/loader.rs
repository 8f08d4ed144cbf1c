//! Reading bundles from disk.
//!
//! A bundle is either a zip archive (the distributed form) or a directory
//! containing the unpacked `libs/` tree.

use crate::{BundleResult, DirectoryBundle, ResourceProvider};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// A bundle stored as a zip archive.
///
/// # Example
///
/// ```no_run
/// use aploader_bundle::{ResourceProvider, ZipBundle};
///
/// let bundle = ZipBundle::open("ap-loader-all.zip")?;
/// for name in bundle.list("libs/")? {
///     println!("{name}");
/// }
/// # Ok::<(), aploader_bundle::BundleError>(())
/// ```
pub struct ZipBundle {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

impl ZipBundle {
    /// Open a bundle archive for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> BundleResult<Self> {
        let path = path.as_ref();
        let archive = ZipArchive::new(File::open(path)?)?;
        debug!(path = %path.display(), entries = archive.len(), "opened bundle archive");

        Ok(Self {
            path: path.to_path_buf(),
            archive: Mutex::new(archive),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for ZipBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipBundle").field("path", &self.path).finish()
    }
}

impl ResourceProvider for ZipBundle {
    // A zip entry reader borrows the archive, so the entry is buffered whole
    // and the lock is released before the caller copies it out.
    fn open(&self, name: &str) -> BundleResult<Option<Box<dyn Read + Send>>> {
        let mut archive = self.archive.lock();
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut contents = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut contents)?;
        Ok(Some(Box::new(Cursor::new(contents)) as Box<dyn Read + Send>))
    }

    fn list(&self, prefix: &str) -> BundleResult<Vec<String>> {
        let archive = self.archive.lock();
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with(prefix) && !name.ends_with('/'))
            .map(String::from)
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Open a bundle at `path`: a directory is read in place, anything else is
/// treated as a zip archive.
pub fn open_bundle<P: AsRef<Path>>(path: P) -> BundleResult<Arc<dyn ResourceProvider>> {
    let path = path.as_ref();
    if path.is_dir() {
        debug!(path = %path.display(), "using unpacked bundle directory");
        return Ok(Arc::new(DirectoryBundle::new(path)));
    }
    Ok(Arc::new(ZipBundle::open(path)?))
}
