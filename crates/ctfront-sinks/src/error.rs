//! Error types for event sinks.

/// Errors that can occur while building or running a Sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing to or controlling the terminal failed.
    #[error("terminal I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The Sink configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
}
