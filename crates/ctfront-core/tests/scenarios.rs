//! End-to-end scenarios for the diff engine and dispatcher.
//!
//! Snapshots are submitted through a [`SnapshotFeed`] exactly as a Source
//! would, and the assertions are made on what a registered Sink receives.

#![allow(clippy::unwrap_used)]

use ctfront_core::dispatch::{Dispatcher, Mailbox};
use ctfront_core::feed::SnapshotFeed;
use ctfront_types::{
    ChallengeId, ChallengeRow, Event, PlaceChange, RawSnapshot, Snapshot, Solve, Team, TeamId,
};
use rust_decimal::Decimal;
use serde_json::json;

fn feed() -> (SnapshotFeed, Mailbox) {
    let mut dispatcher = Dispatcher::new();
    let mailbox = dispatcher.register("test");
    (SnapshotFeed::new(dispatcher), mailbox)
}

fn scoreboard(teams: Vec<Team>) -> Snapshot {
    Snapshot::Scoreboard { teams }
}

fn challenges(challenges: Vec<ChallengeRow>) -> Snapshot {
    Snapshot::Challenges { challenges }
}

fn team(id: &str, place: u32, score: i64) -> Team {
    Team::new(id, id).with_place(place).with_score(Decimal::from(score))
}

fn solve(team: &str, first: bool) -> Event {
    Event::Solve(Solve {
        team_id: TeamId::from(team),
        challenge_id: ChallengeId::from("cha1"),
        first,
    })
}

fn boot_count(events: &[Event]) -> usize {
    events.iter().filter(|e| e.is_boot()).count()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn boot_carries_challenges_seen_before_the_first_scoreboard() {
    let (mut feed, mut mailbox) = feed();

    assert_eq!(
        feed.submit(challenges(vec![ChallengeRow::new("cha1", "dummy 1")])),
        0
    );
    assert!(mailbox.drain().is_empty());

    feed.submit(scoreboard(vec![
        Team::new("teamB", "teamB").with_place(1),
        Team::new("teamA", "teamA").with_place(2),
    ]));

    let events = mailbox.drain();
    assert_eq!(events.len(), 1);
    let boot = events
        .iter()
        .find_map(|e| match e {
            Event::Boot(boot) => Some(boot),
            _ => None,
        })
        .unwrap();
    let ranking: Vec<&str> = boot.teams.iter().map(|t| t.team_id.as_str()).collect();
    assert_eq!(ranking, ["teamB", "teamA"]);
    let known: Vec<&str> = boot
        .challenges
        .as_deref()
        .unwrap()
        .iter()
        .map(|c| c.challenge_id.as_str())
        .collect();
    assert_eq!(known, ["cha1"]);
}

#[test]
fn new_team_and_place_change_are_reported_in_row_order() {
    let (mut feed, mut mailbox) = feed();
    feed.submit(scoreboard(vec![team("teamB", 1, 12), team("teamA", 2, 25)]));
    mailbox.drain();

    let team_c = team("teamC", 2, 27);
    feed.submit(scoreboard(vec![
        team("teamB", 1, 12),
        team_c.clone(),
        team("teamA", 3, 25),
    ]));

    assert_eq!(
        mailbox.drain(),
        vec![
            Event::NewTeam(team_c),
            Event::Place(PlaceChange {
                team_id: TeamId::from("teamA"),
                old_place: 2,
                place: 3,
            }),
        ]
    );

    let ranking: Vec<&str> = feed
        .engine()
        .store()
        .list_teams_by_place()
        .map(|t| t.team_id.as_str())
        .collect();
    assert_eq!(ranking, ["teamB", "teamC", "teamA"]);
}

#[test]
fn only_the_earliest_simultaneous_solver_gets_first_blood() {
    let (mut feed, mut mailbox) = feed();
    feed.submit(challenges(vec![ChallengeRow::new("cha1", "dummy 1")]));
    feed.submit(scoreboard(vec![
        team("teamA", 1, 0),
        team("teamB", 2, 0),
        team("teamC", 3, 0),
    ]));
    mailbox.drain();

    feed.submit(challenges(vec![
        ChallengeRow::new("cha1", "dummy 1").with_solves(["teamA", "teamB"]),
    ]));
    assert_eq!(mailbox.drain(), vec![solve("teamA", true), solve("teamB", false)]);

    feed.submit(challenges(vec![
        ChallengeRow::new("cha1", "dummy 1").with_solves(["teamA", "teamB", "teamC"]),
    ]));
    assert_eq!(mailbox.drain(), vec![solve("teamC", false)]);
}

#[test]
fn rows_without_score_only_produce_place_events() {
    let (mut feed, mut mailbox) = feed();
    feed.submit(scoreboard(vec![
        team("teamA", 1, 30),
        team("teamB", 2, 20),
        team("teamC", 3, 10),
    ]));
    mailbox.drain();

    feed.submit(scoreboard(vec![
        Team::new("teamC", "teamC").with_place(1),
        Team::new("teamA", "teamA").with_place(2),
        Team::new("teamB", "teamB").with_place(3),
    ]));

    let place = |id: &str, old_place: u32, place: u32| {
        Event::Place(PlaceChange {
            team_id: TeamId::from(id),
            old_place,
            place,
        })
    };
    assert_eq!(
        mailbox.drain(),
        vec![place("teamC", 3, 1), place("teamA", 1, 2), place("teamB", 2, 3)]
    );
    let team_c = feed.engine().store().find_team(&TeamId::from("teamC")).unwrap();
    assert_eq!(team_c.score, Some(Decimal::from(10)));
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn identical_snapshots_are_idempotent() {
    let (mut feed, mut mailbox) = feed();
    let board = vec![team("teamA", 1, 100), team("teamB", 2, 50)];
    let chals = vec![
        ChallengeRow::new("cha1", "dummy 1")
            .with_points(Decimal::from(100))
            .with_solves(["teamA"]),
    ];

    feed.submit(scoreboard(board.clone()));
    feed.submit(challenges(chals.clone()));
    mailbox.drain();

    assert_eq!(feed.submit(scoreboard(board)), 0);
    assert_eq!(feed.submit(challenges(chals)), 0);
    assert!(mailbox.drain().is_empty());
}

#[test]
fn boot_is_emitted_exactly_once() {
    let (mut feed, mut mailbox) = feed();
    let mut seen = Vec::new();

    for place in 1..=4 {
        feed.submit(challenges(vec![ChallengeRow::new("cha1", "dummy 1")]));
        feed.submit(scoreboard(vec![team("teamA", place, i64::from(place))]));
        seen.extend(mailbox.drain());
    }

    assert_eq!(boot_count(&seen), 1);
    assert!(seen.first().is_some_and(Event::is_boot));
}

#[test]
fn first_blood_is_unique_over_a_challenge_lifetime() {
    let (mut feed, mut mailbox) = feed();
    feed.submit(scoreboard(vec![team("teamA", 1, 0)]));
    feed.submit(challenges(vec![ChallengeRow::new("cha1", "dummy 1")]));

    let mut solvers: Vec<String> = Vec::new();
    for id in ["teamC", "teamA", "teamD", "teamB"] {
        solvers.push(id.to_owned());
        feed.submit(challenges(vec![
            ChallengeRow::new("cha1", "dummy 1").with_solves(solvers.clone()),
        ]));
    }

    let firsts: Vec<Event> = mailbox
        .drain()
        .into_iter()
        .filter(|e| matches!(e, Event::Solve(s) if s.first))
        .collect();
    assert_eq!(firsts, vec![solve("teamC", true)]);
}

#[test]
fn ranking_stays_sorted_with_unplaced_teams_last() {
    let (mut feed, _mailbox) = feed();
    feed.submit(scoreboard(vec![
        Team::new("ghost", "ghost"),
        team("teamB", 2, 10),
        team("teamA", 1, 20),
    ]));
    feed.submit(scoreboard(vec![
        Team::new("late", "late"),
        team("teamB", 1, 30),
        team("teamA", 2, 20),
    ]));

    let ranking: Vec<&str> = feed
        .engine()
        .store()
        .list_teams_by_place()
        .map(|t| t.team_id.as_str())
        .collect();
    assert_eq!(ranking, ["teamB", "teamA", "ghost", "late"]);
    assert_eq!(feed.engine().store().team_count(), 4);
}

#[test]
fn raw_snapshots_with_unknown_kinds_are_skipped() {
    let (mut feed, mut mailbox) = feed();
    feed.submit_raw(RawSnapshot {
        kind: "awards".to_owned(),
        payload: json!([]),
    });
    feed.submit_raw(RawSnapshot {
        kind: "scoreboard".to_owned(),
        payload: json!([{"team_id": 7, "name": "seven", "place": 1, "country": "DE"}]),
    });

    let events = mailbox.drain();
    assert_eq!(boot_count(&events), 1);
    let team = feed.engine().store().find_team(&TeamId::from(7_u64)).unwrap();
    assert_eq!(team.extra.get("country"), Some(&json!("DE")));
    assert_eq!(feed.rejected(), 1);
}
