//! Error types for the ctfront binary.
//!
//! [`AppError`] is the top-level error type that wraps all possible
//! failure modes during startup and the run itself.

use ctfront_core::config::ConfigError;
use ctfront_core::orchestrator::OrchestratorError;
use ctfront_sinks::error::SinkError;
use ctfront_sources::error::SourceError;

/// Top-level error for the ctfront binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The Source could not be selected or built.
    #[error("source error: {source}")]
    Source {
        /// The underlying source error.
        #[from]
        source: SourceError,
    },

    /// A Sink could not be built.
    #[error("sink error: {source}")]
    Sink {
        /// The underlying sink error.
        #[from]
        source: SinkError,
    },

    /// The Sink set was rejected.
    #[error("orchestrator error: {source}")]
    Orchestrator {
        /// The underlying orchestrator error.
        #[from]
        source: OrchestratorError,
    },

    /// One or more units ended with an error.
    #[error("{failed} unit(s) failed during the run")]
    RunFailed {
        /// Number of failed units.
        failed: usize,
    },
}
