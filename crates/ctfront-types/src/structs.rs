//! Team and challenge records.
//!
//! [`Team`] doubles as the scoreboard row a Source submits: every field but
//! the id and name is optional, and a row only overwrites what it carries.
//! Challenges have a separate incoming shape ([`ChallengeRow`]) because the
//! stored record always has a solves list while a row may omit it entirely.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{ChallengeId, TeamId};

/// Score assumed for a team whose score was never recorded.
pub const SCORE_BASELINE: Decimal = Decimal::ZERO;

/// Place assumed for a team whose place was never recorded.
///
/// Deliberately out of range so that the first observed place always differs.
pub const PLACE_BASELINE: u32 = 1000;

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// A team on the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable platform-supplied key.
    pub team_id: TeamId,
    /// Display name, unsanitized.
    pub name: String,
    /// Current score, if the Source can observe it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Decimal>,
    /// Current rank (1 is best), if the Source can observe it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<u32>,
    /// Passthrough fields attached by the Source.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Team {
    /// Create a team row with only an id and a name.
    pub fn new(team_id: impl Into<TeamId>, name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            name: name.into(),
            score: None,
            place: None,
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style setter for the score.
    #[must_use]
    pub fn with_score(mut self, score: Decimal) -> Self {
        self.score = Some(score);
        self
    }

    /// Builder-style setter for the place.
    #[must_use]
    pub fn with_place(mut self, place: u32) -> Self {
        self.place = Some(place);
        self
    }

    /// Score to diff against, falling back to [`SCORE_BASELINE`].
    pub fn score_or_baseline(&self) -> Decimal {
        self.score.unwrap_or(SCORE_BASELINE)
    }

    /// Place to diff against, falling back to [`PLACE_BASELINE`].
    pub fn place_or_baseline(&self) -> u32 {
        self.place.unwrap_or(PLACE_BASELINE)
    }

    /// Overwrite every field the incoming row carries.
    ///
    /// Fields absent from `row` are left untouched. The id is never changed.
    pub fn merge(&mut self, row: Self) {
        self.name = row.name;
        if row.score.is_some() {
            self.score = row.score;
        }
        if row.place.is_some() {
            self.place = row.place;
        }
        self.extra.extend(row.extra);
    }
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// A challenge as held by the entity store and carried in events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Stable platform-supplied key.
    pub challenge_id: ChallengeId,
    /// Display name.
    pub name: String,
    /// Category tags (e.g. `pwn`, `web`).
    #[serde(default)]
    pub categories: Vec<String>,
    /// Point value.
    #[serde(default)]
    pub points: Decimal,
    /// Teams that solved the challenge, in the order they were observed.
    #[serde(default)]
    pub solves: Vec<TeamId>,
}

impl Challenge {
    /// Whether `team_id` is already recorded as a solver.
    pub fn solved_by(&self, team_id: &TeamId) -> bool {
        self.solves.contains(team_id)
    }

    /// Overwrite the descriptive fields the incoming row carries.
    ///
    /// Solves are not touched here; they are appended one at a time by the
    /// diff so that each new solver is announced.
    pub fn merge_details(&mut self, row: &ChallengeRow) {
        self.name.clone_from(&row.name);
        if let Some(categories) = &row.categories {
            self.categories.clone_from(categories);
        }
        if let Some(points) = row.points {
            self.points = points;
        }
    }
}

/// A challenge as submitted by a Source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRow {
    /// Stable platform-supplied key.
    pub challenge_id: ChallengeId,
    /// Display name.
    pub name: String,
    /// Category tags, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Point value, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Decimal>,
    /// Full solver list, if the Source can observe solves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solves: Option<Vec<TeamId>>,
}

impl ChallengeRow {
    /// Create a challenge row with only an id and a name.
    pub fn new(challenge_id: impl Into<ChallengeId>, name: impl Into<String>) -> Self {
        Self {
            challenge_id: challenge_id.into(),
            name: name.into(),
            categories: None,
            points: None,
            solves: None,
        }
    }

    /// Builder-style setter for the categories.
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Builder-style setter for the point value.
    #[must_use]
    pub fn with_points(mut self, points: Decimal) -> Self {
        self.points = Some(points);
        self
    }

    /// Builder-style setter for the solver list.
    #[must_use]
    pub fn with_solves<I, T>(mut self, solves: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TeamId>,
    {
        self.solves = Some(solves.into_iter().map(Into::into).collect());
        self
    }
}

impl From<ChallengeRow> for Challenge {
    fn from(row: ChallengeRow) -> Self {
        Self {
            challenge_id: row.challenge_id,
            name: row.name,
            categories: row.categories.unwrap_or_default(),
            points: row.points.unwrap_or_default(),
            solves: row.solves.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_missing_from_row() {
        let mut team = Team::new("T1", "Old Name")
            .with_score(Decimal::from(25))
            .with_place(2);
        team.merge(Team::new("T1", "New Name").with_place(3));

        assert_eq!(team.name, "New Name");
        assert_eq!(team.score, Some(Decimal::from(25)));
        assert_eq!(team.place, Some(3));
    }

    #[test]
    fn passthrough_fields_survive_a_round_trip() {
        let json = serde_json::json!({
            "team_id": 12,
            "name": "haxKLOWN",
            "score": 300,
            "place": 1,
            "country": "SE"
        });
        let team: Team = serde_json::from_value(json).unwrap();
        assert_eq!(team.team_id.as_str(), "12");
        assert_eq!(team.score, Some(Decimal::from(300)));
        assert_eq!(team.extra.get("country"), Some(&serde_json::json!("SE")));

        let back = serde_json::to_value(&team).unwrap();
        assert_eq!(back["country"], "SE");
    }

    #[test]
    fn baselines_apply_to_unrecorded_fields() {
        let team = Team::new("T1", "x");
        assert_eq!(team.score_or_baseline(), SCORE_BASELINE);
        assert_eq!(team.place_or_baseline(), PLACE_BASELINE);
    }

    #[test]
    fn challenge_row_without_solves_becomes_empty_list() {
        let row: ChallengeRow =
            serde_json::from_str(r#"{"challenge_id": "cha1", "name": "dummy 1", "points": 11}"#)
                .unwrap();
        assert!(row.solves.is_none());

        let challenge = Challenge::from(row);
        assert!(challenge.solves.is_empty());
        assert_eq!(challenge.points, Decimal::from(11));
    }

    #[test]
    fn merge_details_leaves_solves_alone() {
        let mut challenge = Challenge::from(
            ChallengeRow::new("cha1", "old")
                .with_points(Decimal::from(100))
                .with_solves(["T1"]),
        );
        challenge.merge_details(&ChallengeRow::new("cha1", "new").with_categories(["pwn"]));

        assert_eq!(challenge.name, "new");
        assert_eq!(challenge.categories, vec!["pwn".to_owned()]);
        assert_eq!(challenge.points, Decimal::from(100));
        assert!(challenge.solved_by(&TeamId::from("T1")));
    }
}
