//! Shared type definitions for ctfront.
//!
//! This crate is the single source of truth for the records that flow from
//! Sources through the diff engine to Sinks.
//!
//! # Modules
//!
//! - [`ids`] -- Platform id wrappers with natural ordering
//! - [`structs`] -- Team and challenge records, plus the incoming challenge row
//! - [`snapshot`] -- Typed and raw snapshots submitted by Sources
//! - [`event`] -- Change events delivered to Sinks

pub mod event;
pub mod ids;
pub mod snapshot;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use event::{BootState, Event, EventKind, PlaceChange, ScoreChange, Solve};
pub use ids::{ChallengeId, TeamId};
pub use snapshot::{RawSnapshot, Snapshot, SnapshotKind};
pub use structs::{Challenge, ChallengeRow, PLACE_BASELINE, SCORE_BASELINE, Team};
