//! Sources of bundle resources.
//!
//! The core never reaches for files or archives directly; it goes through a
//! [`ResourceProvider`], so a bundle can live in a zip archive, an unpacked
//! directory, in memory, or any stack of those.

use crate::BundleResult;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Read access to the named resources of a bundle.
pub trait ResourceProvider: Send + Sync + fmt::Debug {
    /// Open a resource for reading, `None` if the bundle has no such name.
    fn open(&self, name: &str) -> BundleResult<Option<Box<dyn Read + Send>>>;

    /// Names of all resources starting with `prefix`.
    fn list(&self, prefix: &str) -> BundleResult<Vec<String>>;

    /// Every copy of a resource, for providers that merge several bundles.
    fn open_all(&self, name: &str) -> BundleResult<Vec<Box<dyn Read + Send>>> {
        Ok(self.open(name)?.into_iter().collect())
    }
}

/// Resources held in memory.
///
/// Useful for embedding artifacts with `include_bytes!` and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    resources: BTreeMap<String, Arc<[u8]>>,
}

impl MemoryBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from static data, e.g. `&[("libs/index", include_bytes!(...))]`.
    #[must_use]
    pub fn from_static(resources: &[(&str, &'static [u8])]) -> Self {
        resources
            .iter()
            .fold(Self::new(), |bundle, (name, bytes)| {
                bundle.with_resource(name, bytes.to_vec())
            })
    }

    #[must_use]
    pub fn with_resource(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: &str, contents: impl Into<Vec<u8>>) {
        let contents: Vec<u8> = contents.into();
        self.resources.insert(name.to_string(), Arc::from(contents));
    }
}

impl ResourceProvider for MemoryBundle {
    fn open(&self, name: &str) -> BundleResult<Option<Box<dyn Read + Send>>> {
        Ok(self
            .resources
            .get(name)
            .map(|bytes| Box::new(Cursor::new(Arc::clone(bytes))) as Box<dyn Read + Send>))
    }

    fn list(&self, prefix: &str) -> BundleResult<Vec<String>> {
        Ok(self
            .resources
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// An unpacked bundle rooted at a directory.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.root.join(relative))
    }
}

impl ResourceProvider for DirectoryBundle {
    fn open(&self, name: &str) -> BundleResult<Option<Box<dyn Read + Send>>> {
        let Some(path) = self.resolve(name) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(path)?;
        Ok(Some(Box::new(file) as Box<dyn Read + Send>))
    }

    fn list(&self, prefix: &str) -> BundleResult<Vec<String>> {
        let (dir, file_prefix) = match prefix.rsplit_once('/') {
            Some((dir, file_prefix)) => (format!("{dir}/"), file_prefix),
            None => (String::new(), prefix),
        };
        let Some(path) = self.resolve(dir.trim_end_matches('/')) else {
            return Ok(Vec::new());
        };
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with(file_prefix) {
                names.push(format!("{dir}{file_name}"));
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Several bundles merged into one; earlier layers win on name clashes.
#[derive(Debug, Clone, Default)]
pub struct LayeredBundle {
    layers: Vec<Arc<dyn ResourceProvider>>,
}

impl LayeredBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Arc<dyn ResourceProvider>) -> Self {
        self.layers.push(layer);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ResourceProvider for LayeredBundle {
    fn open(&self, name: &str) -> BundleResult<Option<Box<dyn Read + Send>>> {
        for layer in &self.layers {
            if let Some(reader) = layer.open(name)? {
                return Ok(Some(reader));
            }
        }
        Ok(None)
    }

    fn list(&self, prefix: &str) -> BundleResult<Vec<String>> {
        let mut names = Vec::new();
        for layer in &self.layers {
            for name in layer.list(prefix)? {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn open_all(&self, name: &str) -> BundleResult<Vec<Box<dyn Read + Send>>> {
        let mut readers = Vec::new();
        for layer in &self.layers {
            readers.extend(layer.open_all(name)?);
        }
        Ok(readers)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use tempfile::TempDir;

    fn read_all(provider: &dyn ResourceProvider, name: &str) -> Option<Vec<u8>> {
        provider.open(name).unwrap().map(|mut reader| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).unwrap();
            buf
        })
    }

    #[test]
    fn MemoryBundle___open___returns_contents() {
        let bundle = MemoryBundle::new().with_resource("libs/index", "jattach-3.0-linux-x64\n");

        assert_eq!(
            read_all(&bundle, "libs/index").unwrap(),
            b"jattach-3.0-linux-x64\n"
        );
        assert!(read_all(&bundle, "libs/missing").is_none());
    }

    #[test]
    fn MemoryBundle___list___filters_by_prefix() {
        let bundle = MemoryBundle::from_static(&[
            ("libs/index", &b""[..]),
            ("libs/jattach-3.0-linux-x64", &b"bin"[..]),
            ("docs/README.md", &b"docs"[..]),
        ]);

        let names = bundle.list("libs/").unwrap();

        assert_eq!(names, vec!["libs/index", "libs/jattach-3.0-linux-x64"]);
    }

    #[test]
    fn DirectoryBundle___open___reads_files_under_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("libs")).unwrap();
        fs::write(temp_dir.path().join("libs/index"), b"converter.jar\n").unwrap();

        let bundle = DirectoryBundle::new(temp_dir.path());

        assert_eq!(read_all(&bundle, "libs/index").unwrap(), b"converter.jar\n");
        assert!(read_all(&bundle, "libs/converter.jar").is_none());
    }

    #[test]
    fn DirectoryBundle___open___refuses_to_escape_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("bundle");
        fs::create_dir_all(&root).unwrap();
        fs::write(temp_dir.path().join("secret"), b"nope").unwrap();

        let bundle = DirectoryBundle::new(&root);

        assert!(read_all(&bundle, "../secret").is_none());
        assert!(read_all(&bundle, "/etc/passwd").is_none());
    }

    #[test]
    fn DirectoryBundle___list___returns_prefixed_names() {
        let temp_dir = TempDir::new().unwrap();
        let libs = temp_dir.path().join("libs");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("jattach-3.0-linux-x64"), b"a").unwrap();
        fs::write(libs.join("libasyncProfiler-3.0-linux-x64.so"), b"b").unwrap();

        let bundle = DirectoryBundle::new(temp_dir.path());

        assert_eq!(
            bundle.list("libs/jattach").unwrap(),
            vec!["libs/jattach-3.0-linux-x64"]
        );
        assert_eq!(bundle.list("libs/").unwrap().len(), 2);
        assert!(bundle.list("missing/").unwrap().is_empty());
    }

    #[test]
    fn LayeredBundle___open___first_layer_wins() {
        let first = MemoryBundle::new().with_resource("libs/a", "first");
        let second = MemoryBundle::new()
            .with_resource("libs/a", "second")
            .with_resource("libs/b", "only-second");

        let layered = LayeredBundle::new()
            .with_layer(Arc::new(first))
            .with_layer(Arc::new(second));

        assert_eq!(read_all(&layered, "libs/a").unwrap(), b"first");
        assert_eq!(read_all(&layered, "libs/b").unwrap(), b"only-second");
        assert_eq!(layered.list("libs/").unwrap(), vec!["libs/a", "libs/b"]);
    }

    #[test]
    fn LayeredBundle___open_all___returns_every_copy() {
        let layered = LayeredBundle::new()
            .with_layer(Arc::new(MemoryBundle::new().with_resource("libs/index", "a")))
            .with_layer(Arc::new(MemoryBundle::new()))
            .with_layer(Arc::new(MemoryBundle::new().with_resource("libs/index", "b")));

        assert_eq!(layered.open_all("libs/index").unwrap().len(), 2);
        assert_eq!(layered.len(), 3);
    }
}
