//! Error types for bundle operations.

use thiserror::Error;

/// Errors that can occur while reading a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Missing required file in bundle.
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// The bundle lists no versioned artifact at all.
    #[error("No async-profiler version found in bundle")]
    MissingVersion,

    /// The bundle lists artifacts of more than one version.
    #[error("Multiple versions of async-profiler found: {}", .0.join(", "))]
    AmbiguousVersion(Vec<String>),

    /// A version string that is not a dotted list of numbers.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// A file name that does not follow the artifact naming scheme.
    #[error("Not an artifact name: {0}")]
    InvalidArtifactName(String),
}
