//! Bundle format and artifact resolution for ap-loader
//!
//! This crate knows how the platform-specific async-profiler artifacts are
//! laid out inside a bundle, how the current host maps onto one of those
//! artifacts, and how to read the bytes back out.
//!
//! # Bundle Structure
//!
//! ```text
//! ap-loader-all.zip
//! └── libs/
//!     ├── index                              # one resource name per line
//!     ├── libasyncProfiler-3.0-linux-x64.so
//!     ├── libasyncProfiler-3.0-macos.so
//!     ├── jattach-3.0-linux-x64
//!     ├── profiler-3.0-linux-x64.sh
//!     └── converter-3.0.jar
//! ```
//!
//! Every platform-specific resource is named
//! `<kind>-<version>-<platform>[.<ext>]`. Exactly one version may appear in a
//! bundle.
//!
//! # Example
//!
//! ```no_run
//! use aploader_bundle::{ArtifactKind, BundleVersion, HostInfo, Locator, Lookup, ResourceIndex, open_bundle};
//!
//! let bundle = open_bundle("ap-loader-all.zip")?;
//! let index = ResourceIndex::load(bundle.as_ref())?;
//! let version = BundleVersion::parse(&index.version()?)?;
//! let key = aploader_bundle::resolve(HostInfo::current()).expect("supported host");
//!
//! match Locator::new(&index, &version).locate(ArtifactKind::NativeLibrary, &key) {
//!     Lookup::Found(entry) => println!("{}", entry.resource_path()),
//!     Lookup::NotFound { expected } => println!("missing {expected}"),
//!     Lookup::Unsupported(reason) => println!("{reason}"),
//! }
//! # Ok::<(), aploader_bundle::BundleError>(())
//! ```

mod artifact;
mod error;
mod index;
mod platform;
mod provider;

pub mod builder;
pub mod loader;
pub mod locator;

pub use artifact::{ArtifactKind, ArtifactName};
pub use builder::BundleBuilder;
pub use error::BundleError;
pub use index::{ResourceEntry, ResourceIndex};
pub use loader::{ZipBundle, open_bundle};
pub use locator::{Locator, Lookup};
pub use platform::{
    Arch, BundleVersion, HostInfo, Libc, Os, PlatformKey, PlatformMatrix, Unsupported,
    classify_libc, resolve,
};
pub use provider::{DirectoryBundle, LayeredBundle, MemoryBundle, ResourceProvider};

/// Result type for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Directory inside the bundle holding every artifact.
pub const RESOURCE_DIR: &str = "libs";

/// Index resource listing the bundled artifacts.
pub const INDEX_FILE: &str = "libs/index";
