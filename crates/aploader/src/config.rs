//! Loader configuration

use crate::{LoaderError, LoaderResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Path of the bundle (zip archive or unpacked directory)
pub const BUNDLE_ENV: &str = "AP_LOADER_BUNDLE";

/// Root directory under which artifacts are extracted
pub const EXTRACTION_DIR_ENV: &str = "AP_LOADER_EXTRACTION_DIR";

/// Pins the async-profiler version the bundle must contain
pub const VERSION_ENV: &str = "AP_LOADER_VERSION";

/// JDK used to run the converter
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";

/// Loader configuration
///
/// Every field has a default, so an empty JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Application identity, used to name the extraction directory
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Bundle location; searched next to the executable when unset
    #[serde(default)]
    pub bundle_path: Option<PathBuf>,

    /// Extraction root override
    ///
    /// The version-scoped directory `<app_name>-<version>` is created below it.
    #[serde(default)]
    pub extraction_dir: Option<PathBuf>,

    /// Version to use instead of the one the bundle index names
    #[serde(default)]
    pub version: Option<String>,

    /// Name shown in place of the cached launcher path in rewritten output
    #[serde(default = "default_program_name")]
    pub program_name: String,

    /// JDK home for the converter; `java` from `PATH` when unset
    #[serde(default)]
    pub java_home: Option<PathBuf>,
}

fn default_app_name() -> String {
    "ap-loader".to_string()
}

fn default_program_name() -> String {
    "ap-loader".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            bundle_path: None,
            extraction_dir: None,
            version: None,
            program_name: default_program_name(),
            java_home: None,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Read the `AP_LOADER_*` and `JAVA_HOME` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            bundle_path: get(BUNDLE_ENV).map(PathBuf::from),
            extraction_dir: get(EXTRACTION_DIR_ENV).map(PathBuf::from),
            version: get(VERSION_ENV),
            java_home: get(JAVA_HOME_ENV).map(PathBuf::from),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[must_use]
    pub fn with_bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundle_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_extraction_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.extraction_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_program_name(mut self, program_name: impl Into<String>) -> Self {
        self.program_name = program_name.into();
        self
    }

    #[must_use]
    pub fn with_java_home(mut self, java_home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(java_home.into());
        self
    }

    /// Directory under which version-scoped extraction directories live.
    ///
    /// The override if set, else the user's local data directory, else the
    /// system temp directory.
    #[must_use]
    pub fn extraction_root(&self) -> PathBuf {
        self.extraction_dir
            .clone()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// The version-scoped extraction directory, `<root>/<app_name>-<version>`.
    #[must_use]
    pub fn extraction_directory(&self, version: &str) -> PathBuf {
        self.extraction_root()
            .join(format!("{}-{version}", self.app_name))
    }

    /// Check that an existing extraction override is a writable directory.
    ///
    /// A missing override is fine; it is created on first extraction.
    pub fn validate_extraction_root(&self) -> LoaderResult<()> {
        let Some(root) = &self.extraction_dir else {
            return Ok(());
        };
        if !root.exists() {
            return Ok(());
        }
        if !root.is_dir() {
            return Err(LoaderError::Config(format!(
                "{EXTRACTION_DIR_ENV} {} is not a directory",
                root.display()
            )));
        }
        tempfile::Builder::new()
            .prefix(".ap-loader-probe")
            .tempfile_in(root)
            .map(drop)
            .map_err(|e| {
                LoaderError::Config(format!(
                    "{EXTRACTION_DIR_ENV} {} is not writable: {e}",
                    root.display()
                ))
            })
    }

    /// The `java` executable used to run the converter.
    #[must_use]
    pub fn java_executable(&self) -> PathBuf {
        match &self.java_home {
            Some(home) => home.join("bin").join("java"),
            None => Path::new("java").to_path_buf(),
        }
    }
}

#[cfg(test)]
#[path = "config/config_tests.rs"]
mod config_tests;
