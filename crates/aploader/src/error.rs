//! Error types for ap-loader operations

use crate::config::EXTRACTION_DIR_ENV;
use aploader_bundle::{BundleError, Unsupported};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Error type for loader operations
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The host has no matching artifact in the bundle
    #[error("async-profiler is not supported on os={os} arch={arch} libc={libc}: {reason}")]
    UnsupportedPlatform {
        os: String,
        arch: String,
        libc: String,
        reason: String,
    },

    /// The bundle index names more than one version
    #[error("multiple versions of async-profiler found in bundle: {}", .versions.join(", "))]
    AmbiguousBundleVersion { versions: Vec<String> },

    /// Copying an artifact out of the bundle or setting its permissions failed
    #[error("failed to extract {}: {source}", .path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A delegated tool exited with a non-zero status
    #[error("{tool} exited with code {code}: {}", .stderr.trim())]
    Subprocess {
        tool: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// Waiting on a delegated tool was interrupted.
    ///
    /// std already retries `wait` and pipe reads on `EINTR`, so this is only
    /// produced when an `Interrupted` error escapes those retries.
    #[error("interrupted while waiting for {tool}")]
    Interrupted { tool: String },

    /// A delegated tool could not be started
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The extracted native library could not be loaded into this process
    #[error(
        "failed to load {}: {message}; the extraction directory {} may not allow executing \
         native code, set {} to relocate it",
        .path.display(),
        .extraction_dir.display(),
        EXTRACTION_DIR_ENV
    )]
    LibraryLoad {
        path: PathBuf,
        extraction_dir: PathBuf,
        message: String,
    },

    /// A platform-neutral artifact is absent from the bundle
    #[error("bundle has no {name}")]
    ArtifactMissing { name: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other failure reading the bundle
    #[error("bundle error: {0}")]
    Bundle(#[source] BundleError),
}

impl LoaderError {
    /// Process exit code for this failure: the child's own code for a
    /// subprocess failure, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            LoaderError::Subprocess { code, .. } => *code,
            _ => 1,
        }
    }

    /// Whether the failure means the host platform is not supported.
    #[must_use]
    pub fn is_unsupported_platform(&self) -> bool {
        matches!(self, LoaderError::UnsupportedPlatform { .. })
    }
}

impl From<BundleError> for LoaderError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::AmbiguousVersion(versions) => {
                LoaderError::AmbiguousBundleVersion { versions }
            }
            other => LoaderError::Bundle(other),
        }
    }
}

impl From<Unsupported> for LoaderError {
    fn from(err: Unsupported) -> Self {
        LoaderError::UnsupportedPlatform {
            os: err.os,
            arch: err.arch,
            libc: err.libc,
            reason: err.reason,
        }
    }
}
