//! Snapshots submitted by Sources.
//!
//! A snapshot is a partial view: a scoreboard says nothing about challenges
//! and vice versa. Sources with typed data submit a [`Snapshot`]; Sources that
//! relay untyped payloads (recorded sessions, foreign feeds) submit a
//! [`RawSnapshot`] and let the engine decide whether it is usable.

use serde::{Deserialize, Serialize};

use crate::structs::{ChallengeRow, Team};

/// A typed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    /// Every team the Source currently sees.
    Scoreboard {
        /// Scoreboard rows in the order the platform lists them.
        teams: Vec<Team>,
    },
    /// Every challenge the Source currently sees.
    Challenges {
        /// Challenge rows in the order the platform lists them.
        challenges: Vec<ChallengeRow>,
    },
}

impl Snapshot {
    /// The snapshot's kind tag.
    pub const fn kind(&self) -> SnapshotKind {
        match self {
            Self::Scoreboard { .. } => SnapshotKind::Scoreboard,
            Self::Challenges { .. } => SnapshotKind::Challenges,
        }
    }

    /// Number of rows carried.
    pub fn len(&self) -> usize {
        match self {
            Self::Scoreboard { teams } => teams.len(),
            Self::Challenges { challenges } => challenges.len(),
        }
    }

    /// Whether the snapshot carries no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The recognized snapshot kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Team standings.
    Scoreboard,
    /// Challenge list with solvers.
    Challenges,
}

impl SnapshotKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scoreboard => "scoreboard",
            Self::Challenges => "challenges",
        }
    }

    /// Parse a wire name, returning `None` for unrecognized kinds.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "scoreboard" => Some(Self::Scoreboard),
            "challenges" => Some(Self::Challenges),
            _ => None,
        }
    }
}

impl core::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An untyped snapshot: a kind name and its row list.
///
/// The payload is expected to be a JSON array of rows matching the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Kind name as reported by the Source.
    pub kind: String,
    /// Row list for that kind.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_tagged_by_kind() {
        let snapshot = Snapshot::Scoreboard {
            teams: vec![Team::new("T1", "one")],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["kind"], "scoreboard");
        assert_eq!(json["teams"][0]["team_id"], "T1");
        assert_eq!(snapshot.kind(), SnapshotKind::Scoreboard);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn unknown_kinds_do_not_parse() {
        assert_eq!(SnapshotKind::parse("challenges"), Some(SnapshotKind::Challenges));
        assert_eq!(SnapshotKind::parse("awards"), None);
    }
}
