//! Source that plays back recorded snapshots.
//!
//! A recording is a JSON array of raw snapshots:
//!
//! ```json
//! [
//!   {"kind": "challenges", "payload": [{"challenge_id": 1, "name": "warmup"}]},
//!   {"kind": "scoreboard", "payload": [{"team_id": 7, "name": "hxp", "place": 1}]}
//! ]
//! ```
//!
//! Records are submitted untyped through [`SnapshotFeed::submit_raw`], so a
//! bad record is logged and skipped like any other malformed snapshot. Once
//! the recording is exhausted the Source idles until stopped, leaving the
//! Sinks on screen.

use std::time::Duration;

use ctfront_core::config::SourceConfig;
use ctfront_core::feed::SnapshotFeed;
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Source;
use ctfront_types::RawSnapshot;
use tracing::info;

use crate::error::SourceError;

/// Parse a recording.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] when the text is not an array of
/// `{kind, payload}` records.
pub fn parse_recording(text: &str) -> Result<Vec<RawSnapshot>, SourceError> {
    Ok(serde_json::from_str(text)?)
}

/// Replays a recording at a fixed pace.
#[derive(Debug)]
pub struct ReplaySource {
    records: Vec<RawSnapshot>,
    interval: Duration,
}

impl ReplaySource {
    /// Load the recording named by `replay_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] without a path, [`SourceError::Io`]
    /// when the file cannot be read, and [`SourceError::Parse`] when it is
    /// not a recording.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let Some(path) = config.replay_path.as_deref() else {
            return Err(SourceError::Config(
                "the replay backend requires replay_path".to_owned(),
            ));
        };
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::from_records(
            parse_recording(&text)?,
            config.replay_interval(),
        ))
    }

    /// Replay records already in memory.
    pub const fn from_records(records: Vec<RawSnapshot>, interval: Duration) -> Self {
        Self { records, interval }
    }

    /// Number of records left to play.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the recording is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Source for ReplaySource {
    type Error = SourceError;

    fn name(&self) -> &str {
        "replay"
    }

    async fn run(self, mut feed: SnapshotFeed, stop: StopSignal) -> Result<(), SourceError> {
        info!(records = self.records.len(), "Replaying recording");

        for (index, record) in self.records.into_iter().enumerate() {
            if index > 0 && stop.sleep(self.interval).await {
                info!(played = index, "Replay stopped early");
                return Ok(());
            }
            feed.submit_raw(record);
        }

        info!(
            accepted = feed.accepted(),
            rejected = feed.rejected(),
            "Replay finished, idling until stopped"
        );
        stop.stopped().await;
        Ok(())
    }
}
