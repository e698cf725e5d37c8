//! Canonical competition state.
//!
//! The [`EntityStore`] keys teams and challenges by their platform ids, so a
//! key can never appear twice. It has no behavior beyond lookup, merge, and
//! ordered listing; deciding what changed is the diff engine's job.

use std::collections::BTreeMap;

use ctfront_types::{BootState, Challenge, ChallengeId, ChallengeRow, Team, TeamId};

/// Outcome of [`EntityStore::upsert_challenge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeUpsert {
    /// The challenge was unknown and has been stored as given.
    Inserted(Challenge),
    /// The challenge was already known.
    Merged {
        /// Id of the merged challenge.
        challenge_id: ChallengeId,
        /// Solvers appended by this merge, in row order.
        new_solvers: Vec<TeamId>,
        /// Whether the stored solves list was empty before the merge.
        previously_unsolved: bool,
    },
}

/// Team and challenge records keyed by platform id.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    /// Team records keyed by id.
    teams: BTreeMap<TeamId, Team>,
    /// Presentation order of team ids; sorted by place on [`resort_teams`].
    ///
    /// [`resort_teams`]: EntityStore::resort_teams
    ranking: Vec<TeamId>,
    /// Challenge records; the map order is the stable id order.
    challenges: BTreeMap<ChallengeId, Challenge>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Teams
    // -----------------------------------------------------------------------

    /// Merge a scoreboard row into the stored team, or insert it.
    ///
    /// New teams are appended to the end of the ranking; call
    /// [`resort_teams`](Self::resort_teams) once a batch is complete.
    /// Returns `true` when the team was inserted.
    pub fn upsert_team(&mut self, row: Team) -> bool {
        if let Some(existing) = self.teams.get_mut(&row.team_id) {
            existing.merge(row);
            return false;
        }
        self.ranking.push(row.team_id.clone());
        self.teams.insert(row.team_id.clone(), row);
        true
    }

    /// Look up a team by id.
    pub fn find_team(&self, team_id: &TeamId) -> Option<&Team> {
        self.teams.get(team_id)
    }

    /// Teams in ranking order as of the last resort.
    pub fn list_teams_by_place(&self) -> impl Iterator<Item = &Team> {
        self.ranking.iter().filter_map(|id| self.teams.get(id))
    }

    /// Stable-sort the ranking by place, best first.
    ///
    /// Teams that never reported a place go last. Ties keep their previous
    /// relative order.
    pub fn resort_teams(&mut self) {
        let teams = &self.teams;
        self.ranking.sort_by_key(|id| {
            let place = teams.get(id).and_then(|team| team.place);
            (place.is_none(), place)
        });
    }

    /// Number of known teams.
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    // -----------------------------------------------------------------------
    // Challenges
    // -----------------------------------------------------------------------

    /// Merge a challenge row into the stored challenge, or insert it.
    ///
    /// For an existing challenge, unseen solvers are appended in row order
    /// and the descriptive fields are overwritten.
    pub fn upsert_challenge(&mut self, row: ChallengeRow) -> ChallengeUpsert {
        let Some(existing) = self.challenges.get_mut(&row.challenge_id) else {
            let challenge = Challenge::from(row);
            self.challenges
                .insert(challenge.challenge_id.clone(), challenge.clone());
            return ChallengeUpsert::Inserted(challenge);
        };

        let previously_unsolved = existing.solves.is_empty();
        let mut new_solvers = Vec::new();
        for team_id in row.solves.iter().flatten() {
            if !existing.solved_by(team_id) {
                existing.solves.push(team_id.clone());
                new_solvers.push(team_id.clone());
            }
        }
        existing.merge_details(&row);

        ChallengeUpsert::Merged {
            challenge_id: row.challenge_id,
            new_solvers,
            previously_unsolved,
        }
    }

    /// Look up a challenge by id.
    pub fn find_challenge(&self, challenge_id: &ChallengeId) -> Option<&Challenge> {
        self.challenges.get(challenge_id)
    }

    /// Challenges in stable id order.
    pub fn list_challenges_by_id(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.values()
    }

    /// Number of known challenges.
    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    // -----------------------------------------------------------------------
    // Snapshots of the whole state
    // -----------------------------------------------------------------------

    /// Copy the entire state into a boot payload.
    ///
    /// Challenges are included only when at least one is known.
    pub fn boot_state(&self) -> BootState {
        let challenges = if self.challenges.is_empty() {
            None
        } else {
            Some(self.list_challenges_by_id().cloned().collect())
        };
        BootState {
            teams: self.list_teams_by_place().cloned().collect(),
            challenges,
        }
    }
}
