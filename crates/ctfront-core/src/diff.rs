//! Snapshot diffing and event derivation.
//!
//! [`DiffEngine::handle_snapshot`] compares an incoming snapshot with the
//! [`EntityStore`], folds the snapshot into the store, and returns the events
//! that explain the transition, in the order they must be delivered.
//!
//! # Boot
//!
//! Nothing is announced until the first scoreboard snapshot has been folded
//! in. Events derived before that point are discarded, not queued: the store
//! started empty, so every row would be "new" and the one-time
//! [`Event::Boot`] already carries all of it.

use ctfront_types::{ChallengeRow, Event, PlaceChange, ScoreChange, Snapshot, SnapshotKind, Solve, Team};
use tracing::{debug, info};

use crate::store::{ChallengeUpsert, EntityStore};

/// Owns the canonical state and turns snapshots into events.
#[derive(Debug, Default)]
pub struct DiffEngine {
    store: EntityStore,
    booted: bool,
}

impl DiffEngine {
    /// Create an engine with an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the canonical state.
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Whether the boot event has been produced.
    pub const fn is_booted(&self) -> bool {
        self.booted
    }

    /// Fold a snapshot into the store and return the resulting events.
    ///
    /// Never fails: missing optional fields fall back to their baselines.
    pub fn handle_snapshot(&mut self, snapshot: Snapshot) -> Vec<Event> {
        let kind = snapshot.kind();
        let events = match snapshot {
            Snapshot::Scoreboard { teams } => self.diff_scoreboard(teams),
            Snapshot::Challenges { challenges } => self.diff_challenges(challenges),
        };

        if self.booted {
            return events;
        }

        if kind == SnapshotKind::Scoreboard {
            self.booted = true;
            let boot = self.store.boot_state();
            info!(
                teams = boot.teams.len(),
                challenges = boot.challenges.as_ref().map_or(0, Vec::len),
                superseded = events.len(),
                "First scoreboard processed, emitting boot"
            );
            return vec![Event::Boot(boot)];
        }

        debug!(
            %kind,
            discarded = events.len(),
            "Discarding events derived before boot"
        );
        Vec::new()
    }

    /// Diff scoreboard rows in the order given.
    ///
    /// For an existing team, score is compared before place. A value seen for
    /// the first time is always reported, with the baseline as the old value.
    fn diff_scoreboard(&mut self, rows: Vec<Team>) -> Vec<Event> {
        let mut events = Vec::new();

        for row in rows {
            let Some(existing) = self.store.find_team(&row.team_id) else {
                events.push(Event::NewTeam(row.clone()));
                self.store.upsert_team(row);
                continue;
            };

            if let Some(score) = row.score
                && existing.score != Some(score)
            {
                events.push(Event::Score(ScoreChange {
                    team_id: row.team_id.clone(),
                    old_score: existing.score_or_baseline(),
                    score,
                }));
            }

            if let Some(place) = row.place
                && existing.place != Some(place)
            {
                events.push(Event::Place(PlaceChange {
                    team_id: row.team_id.clone(),
                    old_place: existing.place_or_baseline(),
                    place,
                }));
            }

            self.store.upsert_team(row);
        }

        self.store.resort_teams();
        events
    }

    /// Diff challenge rows in the order given.
    ///
    /// Solvers missing from the stored list are announced in row order. Only
    /// the earliest of them can be first blood, and only when the challenge
    /// had no recorded solves before this batch.
    fn diff_challenges(&mut self, rows: Vec<ChallengeRow>) -> Vec<Event> {
        let mut events = Vec::new();

        for row in rows {
            match self.store.upsert_challenge(row) {
                ChallengeUpsert::Inserted(challenge) => {
                    events.push(Event::NewChallenge(challenge));
                }
                ChallengeUpsert::Merged {
                    challenge_id,
                    new_solvers,
                    previously_unsolved,
                } => {
                    let mut first = previously_unsolved;
                    for team_id in new_solvers {
                        events.push(Event::Solve(Solve {
                            team_id,
                            challenge_id: challenge_id.clone(),
                            first,
                        }));
                        first = false;
                    }
                }
            }
        }

        events
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ctfront_types::{ChallengeId, EventKind, TeamId};
    use rust_decimal::Decimal;

    use super::*;

    fn booted_engine(teams: Vec<Team>, challenges: Vec<ChallengeRow>) -> DiffEngine {
        let mut engine = DiffEngine::new();
        engine.handle_snapshot(Snapshot::Challenges { challenges });
        let boot = engine.handle_snapshot(Snapshot::Scoreboard { teams });
        assert_eq!(boot.len(), 1);
        engine
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(Event::kind).collect()
    }

    #[test]
    fn challenges_before_boot_are_silent() {
        let mut engine = DiffEngine::new();
        let events = engine.handle_snapshot(Snapshot::Challenges {
            challenges: vec![ChallengeRow::new("cha1", "dummy 1")],
        });
        assert!(events.is_empty());
        assert!(!engine.is_booted());
        assert_eq!(engine.store().challenge_count(), 1);
    }

    #[test]
    fn boot_is_produced_only_once() {
        let mut engine = DiffEngine::new();
        let teams = vec![Team::new("T1", "one").with_place(1)];

        let first = engine.handle_snapshot(Snapshot::Scoreboard { teams: teams.clone() });
        assert_eq!(kinds(&first), [EventKind::Boot]);

        let second = engine.handle_snapshot(Snapshot::Scoreboard { teams });
        assert!(second.is_empty());
    }

    #[test]
    fn score_is_reported_before_place() {
        let mut engine = booted_engine(
            vec![Team::new("T1", "one").with_place(1).with_score(Decimal::from(10))],
            Vec::new(),
        );
        let events = engine.handle_snapshot(Snapshot::Scoreboard {
            teams: vec![Team::new("T1", "one").with_place(2).with_score(Decimal::from(20))],
        });
        assert_eq!(kinds(&events), [EventKind::Score, EventKind::Place]);
    }

    #[test]
    fn first_observed_score_uses_zero_baseline() {
        let mut engine = booted_engine(vec![Team::new("T1", "one").with_place(1)], Vec::new());
        let events = engine.handle_snapshot(Snapshot::Scoreboard {
            teams: vec![Team::new("T1", "one").with_score(Decimal::ZERO)],
        });

        assert_eq!(
            events,
            vec![Event::Score(ScoreChange {
                team_id: TeamId::from("T1"),
                old_score: Decimal::ZERO,
                score: Decimal::ZERO,
            })]
        );
    }

    #[test]
    fn first_observed_place_uses_out_of_range_baseline() {
        let mut engine = booted_engine(vec![Team::new("T1", "one")], Vec::new());
        let events = engine.handle_snapshot(Snapshot::Scoreboard {
            teams: vec![Team::new("T1", "one").with_place(4)],
        });
        assert_eq!(
            events,
            vec![Event::Place(PlaceChange {
                team_id: TeamId::from("T1"),
                old_place: ctfront_types::PLACE_BASELINE,
                place: 4,
            })]
        );
    }

    #[test]
    fn new_challenge_carries_its_solves_without_solve_events() {
        let mut engine = booted_engine(vec![Team::new("T1", "one").with_place(1)], Vec::new());
        let events = engine.handle_snapshot(Snapshot::Challenges {
            challenges: vec![ChallengeRow::new("cha9", "late").with_solves(["T1"])],
        });
        assert_eq!(kinds(&events), [EventKind::NewChallenge]);
        assert!(matches!(
            events.first(),
            Some(Event::NewChallenge(challenge)) if challenge.solves == vec![TeamId::from("T1")]
        ));
    }

    #[test]
    fn row_without_solves_leaves_stored_solves_untouched() {
        let mut engine = booted_engine(
            vec![Team::new("T1", "one").with_place(1)],
            vec![ChallengeRow::new("cha1", "c").with_solves(["T1"])],
        );
        let events = engine.handle_snapshot(Snapshot::Challenges {
            challenges: vec![ChallengeRow::new("cha1", "renamed")],
        });
        assert!(events.is_empty());

        let challenge = engine
            .store()
            .find_challenge(&ChallengeId::from("cha1"))
            .unwrap();
        assert_eq!(challenge.name, "renamed");
        assert_eq!(challenge.solves, vec![TeamId::from("T1")]);
    }

    #[test]
    fn no_first_blood_on_a_challenge_solved_before_boot() {
        let mut engine = booted_engine(
            vec![Team::new("T1", "one").with_place(1)],
            vec![ChallengeRow::new("cha1", "c").with_solves(["T1"])],
        );
        let events = engine.handle_snapshot(Snapshot::Challenges {
            challenges: vec![ChallengeRow::new("cha1", "c").with_solves(["T1", "T2"])],
        });
        assert_eq!(
            events,
            vec![Event::Solve(Solve {
                team_id: TeamId::from("T2"),
                challenge_id: ChallengeId::from("cha1"),
                first: false,
            })]
        );
    }

    #[test]
    fn duplicate_solvers_in_one_row_are_announced_once() {
        let mut engine = booted_engine(
            vec![Team::new("T1", "one").with_place(1)],
            vec![ChallengeRow::new("cha1", "c").with_solves(Vec::<TeamId>::new())],
        );
        let events = engine.handle_snapshot(Snapshot::Challenges {
            challenges: vec![ChallengeRow::new("cha1", "c").with_solves(["T1", "T1"])],
        });
        assert_eq!(kinds(&events), [EventKind::Solve]);
    }
}
