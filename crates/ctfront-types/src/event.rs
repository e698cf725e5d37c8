//! Change events delivered to Sinks.
//!
//! Every event is an owned value. The dispatcher hands each Sink its own
//! clone, so a Sink may mutate what it receives without affecting the engine
//! or any other Sink.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{ChallengeId, TeamId};
use crate::structs::{Challenge, Team};

/// A discrete change in competition state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Event {
    /// One-time dump of everything known when the first scoreboard arrived.
    Boot(BootState),
    /// A team appeared on the scoreboard.
    NewTeam(Team),
    /// A challenge appeared.
    NewChallenge(Challenge),
    /// A team's rank changed.
    Place(PlaceChange),
    /// A team's score changed.
    Score(ScoreChange),
    /// A team solved a challenge.
    Solve(Solve),
}

impl Event {
    /// The event's kind tag.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Boot(_) => EventKind::Boot,
            Self::NewTeam(_) => EventKind::NewTeam,
            Self::NewChallenge(_) => EventKind::NewChallenge,
            Self::Place(_) => EventKind::Place,
            Self::Score(_) => EventKind::Score,
            Self::Solve(_) => EventKind::Solve,
        }
    }

    /// Whether this is the boot event.
    pub const fn is_boot(&self) -> bool {
        matches!(self, Self::Boot(_))
    }
}

/// Event kind tags, used for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// See [`Event::Boot`].
    Boot,
    /// See [`Event::NewTeam`].
    NewTeam,
    /// See [`Event::NewChallenge`].
    NewChallenge,
    /// See [`Event::Place`].
    Place,
    /// See [`Event::Score`].
    Score,
    /// See [`Event::Solve`].
    Solve,
}

impl EventKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::NewTeam => "new_team",
            Self::NewChallenge => "new_challenge",
            Self::Place => "place",
            Self::Score => "score",
            Self::Solve => "solve",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full state carried by [`Event::Boot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootState {
    /// All teams, best place first.
    pub teams: Vec<Team>,
    /// All challenges in id order; absent when none were known at boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenges: Option<Vec<Challenge>>,
}

/// Payload of [`Event::Place`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceChange {
    /// The team that moved.
    pub team_id: TeamId,
    /// Previous place, or the out-of-range baseline if none was recorded.
    pub old_place: u32,
    /// New place.
    pub place: u32,
}

impl PlaceChange {
    /// Whether the team climbed the ranking.
    pub const fn is_climb(&self) -> bool {
        self.place < self.old_place
    }
}

/// Payload of [`Event::Score`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChange {
    /// The team whose score changed.
    pub team_id: TeamId,
    /// Previous score, or zero if none was recorded.
    pub old_score: Decimal,
    /// New score.
    pub score: Decimal,
}

/// Payload of [`Event::Solve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solve {
    /// The solving team.
    pub team_id: TeamId,
    /// The solved challenge.
    pub challenge_id: ChallengeId,
    /// First blood: the first solver observed on a previously unsolved challenge.
    pub first: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_are_adjacently_tagged() {
        let event = Event::Solve(Solve {
            team_id: TeamId::from("T1"),
            challenge_id: ChallengeId::from("cha1"),
            first: true,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "solve");
        assert_eq!(json["payload"]["first"], true);
        assert_eq!(event.kind().as_str(), "solve");
    }

    #[test]
    fn boot_omits_challenges_when_none_known() {
        let event = Event::Boot(BootState {
            teams: Vec::new(),
            challenges: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["payload"].get("challenges").is_none());
        assert!(event.is_boot());
    }

    #[test]
    fn climbing_means_a_smaller_place() {
        let change = PlaceChange {
            team_id: TeamId::from("T1"),
            old_place: 4,
            place: 2,
        };
        assert!(change.is_climb());
    }
}
