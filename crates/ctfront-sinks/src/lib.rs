//! Event Sinks for ctfront.
//!
//! Every Sink implements [`Sink`] and is collected behind the [`SinkBackend`]
//! enum, so the orchestrator runs one concrete type whatever the
//! configuration lists.
//!
//! # Modules
//!
//! - [`board`] -- Live ranking in the terminal (modal).
//! - [`debug`] -- One line per event on stdout (background).
//! - [`error`] -- [`SinkError`].
//! - [`sanitize`] -- Stripping escapes and combining marks from team names.
//!
//! [`Sink`]: ctfront_core::unit::Sink
//! [`SinkError`]: error::SinkError

use ctfront_core::config::SinkConfig;
use ctfront_core::dispatch::Mailbox;
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Sink;

pub mod board;
pub mod debug;
pub mod error;
pub mod sanitize;

use crate::board::BoardSink;
use crate::debug::DebugSink;
use crate::error::SinkError;

// ---------------------------------------------------------------------------
// Unified sink enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// Any configured Sink.
#[derive(Debug)]
pub enum SinkBackend {
    /// Line-per-event log.
    Debug(DebugSink),
    /// Live ranking table.
    Board(BoardSink),
}

impl Sink for SinkBackend {
    type Error = SinkError;

    fn name(&self) -> &str {
        match self {
            Self::Debug(sink) => sink.name(),
            Self::Board(sink) => sink.name(),
        }
    }

    fn is_modal(&self) -> bool {
        match self {
            Self::Debug(sink) => sink.is_modal(),
            Self::Board(sink) => sink.is_modal(),
        }
    }

    async fn run(self, mailbox: Mailbox, stop: StopSignal) -> Result<(), SinkError> {
        match self {
            Self::Debug(sink) => sink.run(mailbox, stop).await,
            Self::Board(sink) => sink.run(mailbox, stop).await,
        }
    }
}

/// Build the Sink described by one configuration entry.
///
/// # Errors
///
/// Returns [`SinkError::Config`] when the entry's options are invalid.
pub fn create_sink(config: &SinkConfig) -> Result<SinkBackend, SinkError> {
    match config {
        SinkConfig::Debug => Ok(SinkBackend::Debug(DebugSink::new())),
        SinkConfig::Board(board) => BoardSink::new(board).map(SinkBackend::Board),
    }
}

/// Build every configured Sink, in order.
///
/// # Errors
///
/// Returns the first [`SinkError`] encountered.
pub fn create_sinks(configs: &[SinkConfig]) -> Result<Vec<SinkBackend>, SinkError> {
    configs.iter().map(create_sink).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ctfront_core::config::BoardConfig;

    use super::*;

    #[test]
    fn create_sink_dispatches_correctly() {
        let debug = create_sink(&SinkConfig::Debug).unwrap();
        assert_eq!(debug.name(), "debug");
        assert!(!debug.is_modal());

        let board = create_sink(&SinkConfig::Board(BoardConfig::default())).unwrap();
        assert_eq!(board.name(), "board");
        assert!(board.is_modal());
    }

    #[test]
    fn bad_board_options_fail_the_whole_list() {
        let configs = [
            SinkConfig::Debug,
            SinkConfig::Board(BoardConfig {
                focus_teams: vec!["[".to_owned()],
                ..BoardConfig::default()
            }),
        ];
        assert!(matches!(
            create_sinks(&configs),
            Err(SinkError::Config(_))
        ));
    }
}
