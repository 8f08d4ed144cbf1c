//! Bundle creation utilities.
//!
//! The [`BundleBuilder`] assembles the `libs/` tree of a bundle: artifact
//! payloads plus the `libs/index` listing them.

use crate::{ArtifactName, BundleError, BundleResult, INDEX_FILE, MemoryBundle, RESOURCE_DIR};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Builder for ap-loader bundles.
///
/// # Example
///
/// ```no_run
/// use aploader_bundle::BundleBuilder;
///
/// BundleBuilder::new()
///     .add_artifact_file("build/libasyncProfiler-3.0-linux-x64.so")?
///     .add_artifact_file("build/jattach-3.0-linux-x64")?
///     .write("ap-loader-bundle.zip")?;
/// # Ok::<(), aploader_bundle::BundleError>(())
/// ```
#[derive(Debug, Default)]
pub struct BundleBuilder {
    artifacts: Vec<String>,
    files: Vec<BundleFile>,
}

/// A file to include in the bundle.
#[derive(Debug)]
struct BundleFile {
    /// Path within the bundle.
    archive_path: String,
    contents: Vec<u8>,
    executable: bool,
}

impl BundleBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact under `libs/` and list it in the index.
    ///
    /// The name must follow the artifact naming scheme, e.g.
    /// `jattach-3.0-linux-x64`.
    pub fn add_artifact(mut self, file_name: &str, contents: Vec<u8>) -> BundleResult<Self> {
        let name = ArtifactName::parse(file_name).ok_or_else(|| {
            BundleError::InvalidArtifactName(file_name.to_string())
        })?;

        self.artifacts.push(file_name.to_string());
        self.files.push(BundleFile {
            archive_path: format!("{RESOURCE_DIR}/{file_name}"),
            contents,
            executable: name.kind.is_executable(),
        });
        Ok(self)
    }

    /// Add an artifact read from disk; the file name is kept.
    pub fn add_artifact_file<P: AsRef<Path>>(self, path: P) -> BundleResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BundleError::InvalidArtifactName(path.display().to_string()))?;
        let contents = fs::read(path)?;

        self.add_artifact(&file_name, contents)
    }

    /// Add raw bytes at an arbitrary path, outside the index.
    #[must_use]
    pub fn add_bytes(mut self, archive_path: &str, contents: Vec<u8>) -> Self {
        self.files.push(BundleFile {
            archive_path: archive_path.to_string(),
            contents,
            executable: false,
        });
        self
    }

    /// Contents of `libs/index` for the artifacts added so far.
    #[must_use]
    pub fn index_text(&self) -> String {
        self.artifacts.iter().map(|name| format!("{name}\n")).collect()
    }

    /// Write the bundle as a zip archive.
    pub fn write<P: AsRef<Path>>(self, output_path: P) -> BundleResult<()> {
        let file = File::create(output_path.as_ref())?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(INDEX_FILE, options)?;
        zip.write_all(self.index_text().as_bytes())?;

        for bundle_file in &self.files {
            let options = if bundle_file.executable {
                options.unix_permissions(0o755)
            } else {
                options
            };
            zip.start_file(bundle_file.archive_path.as_str(), options)?;
            zip.write_all(&bundle_file.contents)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the bundle as an unpacked directory tree.
    pub fn write_to_directory<P: AsRef<Path>>(self, root: P) -> BundleResult<()> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(RESOURCE_DIR))?;
        fs::write(root.join(INDEX_FILE), self.index_text())?;

        for bundle_file in &self.files {
            let path = root.join(&bundle_file.archive_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &bundle_file.contents)?;

            #[cfg(unix)]
            if bundle_file.executable {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
            }
        }
        Ok(())
    }

    /// Keep the bundle in memory.
    #[must_use]
    pub fn into_memory(self) -> MemoryBundle {
        let mut bundle = MemoryBundle::new().with_resource(INDEX_FILE, self.index_text());
        for bundle_file in self.files {
            bundle.insert(&bundle_file.archive_path, bundle_file.contents);
        }
        bundle
    }
}
