//! The Source-facing entry point into the engine.
//!
//! A [`SnapshotFeed`] bundles the [`DiffEngine`] and the [`Dispatcher`] and is
//! moved into the Source's task. Submitting a snapshot runs the diff and the
//! fan-out synchronously on that task, so the entity store has exactly one
//! writer and needs no locking.

use ctfront_types::{ChallengeRow, RawSnapshot, Snapshot, SnapshotKind, Team};
use tracing::{debug, warn};

use crate::diff::DiffEngine;
use crate::dispatch::Dispatcher;

/// Errors raised while decoding an untyped snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The kind name is not one the engine understands.
    #[error("unrecognized snapshot kind {kind:?}")]
    UnknownKind {
        /// The kind name as submitted.
        kind: String,
    },

    /// The payload does not match the rows expected for its kind.
    #[error("malformed {kind} payload: {source}")]
    Payload {
        /// The kind whose rows failed to decode.
        kind: SnapshotKind,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// Decode an untyped snapshot into a typed one.
///
/// # Errors
///
/// Returns [`SnapshotError::UnknownKind`] for an unrecognized kind name and
/// [`SnapshotError::Payload`] when the rows do not decode.
pub fn decode_snapshot(raw: RawSnapshot) -> Result<Snapshot, SnapshotError> {
    let Some(kind) = SnapshotKind::parse(&raw.kind) else {
        return Err(SnapshotError::UnknownKind { kind: raw.kind });
    };
    let payload_error = |source: serde_json::Error| SnapshotError::Payload { kind, source };

    match kind {
        SnapshotKind::Scoreboard => {
            let teams: Vec<Team> = serde_json::from_value(raw.payload).map_err(payload_error)?;
            Ok(Snapshot::Scoreboard { teams })
        }
        SnapshotKind::Challenges => {
            let challenges: Vec<ChallengeRow> =
                serde_json::from_value(raw.payload).map_err(payload_error)?;
            Ok(Snapshot::Challenges { challenges })
        }
    }
}

/// Handle through which a Source submits snapshots.
#[derive(Debug)]
pub struct SnapshotFeed {
    engine: DiffEngine,
    dispatcher: Dispatcher,
    /// Snapshots accepted so far.
    accepted: u64,
    /// Snapshots dropped because they could not be decoded.
    rejected: u64,
}

impl SnapshotFeed {
    /// Create a feed with a fresh engine that publishes through `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            engine: DiffEngine::new(),
            dispatcher,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Diff a snapshot and publish the resulting events.
    ///
    /// Returns the number of events produced.
    pub fn submit(&mut self, snapshot: Snapshot) -> usize {
        let kind = snapshot.kind();
        let rows = snapshot.len();
        let events = self.engine.handle_snapshot(snapshot);
        for event in &events {
            self.dispatcher.publish(event);
        }
        self.accepted = self.accepted.saturating_add(1);
        debug!(%kind, rows, events = events.len(), "Snapshot processed");
        events.len()
    }

    /// Decode and submit an untyped snapshot.
    ///
    /// A snapshot that cannot be decoded is logged and dropped; the engine
    /// keeps going. Returns the number of events produced.
    pub fn submit_raw(&mut self, raw: RawSnapshot) -> usize {
        match decode_snapshot(raw) {
            Ok(snapshot) => self.submit(snapshot),
            Err(e) => {
                self.rejected = self.rejected.saturating_add(1);
                warn!(error = %e, "Dropping snapshot");
                0
            }
        }
    }

    /// Read-only access to the engine and its store.
    pub const fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    /// Snapshots accepted so far.
    pub const fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Snapshots dropped as undecodable so far.
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }
}
