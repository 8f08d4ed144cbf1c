//! The resource index: which artifacts a bundle carries, and its version.

use crate::{
    ArtifactKind, ArtifactName, BundleError, BundleResult, INDEX_FILE, RESOURCE_DIR,
    ResourceProvider,
};
use std::io::Read;
use tracing::debug;

/// One artifact listed in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Parsed form of the file name.
    pub name: ArtifactName,
    /// File name as listed in the index.
    pub file_name: String,
}

impl ResourceEntry {
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.name.kind
    }

    /// Path of the payload inside the bundle.
    #[must_use]
    pub fn resource_path(&self) -> String {
        format!("{RESOURCE_DIR}/{}", self.file_name)
    }

    /// File name the artifact gets in the extraction directory.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        self.name.kind.cache_file_name(self.name.extension.as_deref())
    }
}

/// Read-only catalogue of the artifacts in a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIndex {
    entries: Vec<ResourceEntry>,
}

impl ResourceIndex {
    /// Parse index text: one file name per line, `#` comments allowed.
    /// Lines that are not artifact names are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut index = Self::default();
        index.extend_from_text(text);
        index
    }

    /// Read the index of every bundle the provider exposes.
    ///
    /// A provider without an index falls back to listing `libs/`.
    pub fn load(provider: &dyn ResourceProvider) -> BundleResult<Self> {
        let readers = provider.open_all(INDEX_FILE)?;
        let mut index = Self::default();

        if readers.is_empty() {
            debug!("no {INDEX_FILE} in bundle, listing {RESOURCE_DIR}/");
            let prefix = format!("{RESOURCE_DIR}/");
            for name in provider.list(&prefix)? {
                if let Some(file_name) = name.strip_prefix(&prefix) {
                    index.push(file_name);
                }
            }
            if index.is_empty() {
                return Err(BundleError::MissingFile(INDEX_FILE.to_string()));
            }
            return Ok(index);
        }

        for mut reader in readers {
            let mut text = String::new();
            reader.read_to_string(&mut text)?;
            index.extend_from_text(&text);
        }
        Ok(index)
    }

    fn extend_from_text(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.push(line);
        }
    }

    fn push(&mut self, file_name: &str) {
        if let Some(name) = ArtifactName::parse(file_name) {
            self.entries.push(ResourceEntry {
                name,
                file_name: file_name.to_string(),
            });
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct versions of the platform-specific artifacts, in first-seen
    /// order. The converter jar is versioned separately and never counts.
    #[must_use]
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = Vec::new();
        let platform_specific = self.entries.iter().filter(|e| e.kind().is_platform_specific());
        for version in platform_specific.filter_map(|e| e.name.version.as_ref()) {
            if !versions.contains(version) {
                versions.push(version.clone());
            }
        }
        versions
    }

    /// The single version embedded in the bundle.
    pub fn version(&self) -> BundleResult<String> {
        let mut versions = self.versions();
        match versions.len() {
            0 => Err(BundleError::MissingVersion),
            1 => Ok(versions.remove(0)),
            _ => Err(BundleError::AmbiguousVersion(versions)),
        }
    }
}
