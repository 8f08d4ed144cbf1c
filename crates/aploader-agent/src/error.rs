//! Error types for agent start-up.

use aploader::LoaderError;
use thiserror::Error;

/// Errors that can occur while handing over to the bundled agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Resolving, extracting or loading the bundled library failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// The bundled library lacks a JVMTI entry point.
    #[error("Symbol not found in {library}: {symbol}")]
    SymbolNotFound { library: String, symbol: String },

    /// The bundled agent returned a non-zero status.
    #[error("async-profiler agent failed with status {0}")]
    AgentFailed(i32),
}
