//! aploader - Extract and run the bundled async-profiler
//!
//! A bundle carries async-profiler builds for several platforms. This crate
//! picks the one matching the running host, extracts it into a
//! version-scoped directory and runs it:
//! - [`ProfilerLoader`] is the façade: artifact paths, `load`, `attach`, and
//!   the `execute_*` delegates
//! - [`LoaderConfig`] for the bundle location and extraction directory
//! - [`ExtractionCache`] for the on-disk copies
//! - [`ArgumentRewriter`] and [`OutputRewriter`] hide cache paths from users
//! - [`LoaderError`] for error handling
//!
//! # Example
//!
//! ```no_run
//! use aploader::ProfilerLoader;
//!
//! let loader = ProfilerLoader::global()?;
//! let args = vec!["1234".to_string(), "load".into(), "libasyncProfiler.so".into(), "false".into()];
//! let result = loader.execute_attach(&args)?;
//! print!("{}", result.stdout);
//! # Ok::<(), aploader::LoaderError>(())
//! ```

mod cache;
mod config;
mod delegate;
mod error;
mod loader;
mod rewrite;

pub use cache::ExtractionCache;
pub use config::{BUNDLE_ENV, EXTRACTION_DIR_ENV, JAVA_HOME_ENV, LoaderConfig, VERSION_ENV};
pub use delegate::{
    CapturedOutput, ExecutionResult, Invocation, capture, run_captured, run_inherited,
    run_interactive,
};
pub use error::{LoaderError, LoaderResult};
pub use loader::{BUNDLE_FILE_NAME, LoadedProfiler, ProfilerLoader};
pub use rewrite::{
    ATTACH_TOOL_ENV, ArgumentRewriter, NATIVE_LIBRARY_ENV, OutputRewriter, launcher_environment,
};

pub use aploader_bundle as bundle;
