//! Error types for scoreboard sources.
//!
//! Startup problems (unknown backend, missing URL, unreadable replay file)
//! and per-request failures share one enum. A running Source only logs
//! request failures and tries again on its next poll.

/// Errors that can occur while building or running a Source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {source}")]
    Http {
        /// The underlying client error.
        #[from]
        source: reqwest::Error,
    },

    /// The platform answered, but not the way its API promises.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The Source configuration is invalid or incomplete.
    #[error("config error: {0}")]
    Config(String),

    /// A local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A response body or file did not contain the expected JSON.
    #[error("parse error: {source}")]
    Parse {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
