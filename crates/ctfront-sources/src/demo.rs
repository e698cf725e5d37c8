//! Attractor-mode Source that invents a competition as it goes.
//!
//! The [`DemoWorld`] starts with two teams and three challenges. Every
//! interval it performs one random action (a team signs up, a challenge is
//! released, or a team solves something) and re-ranks the teams by score.
//! A tie keeps the previous order. After each action the whole world is
//! submitted, challenges first, then the scoreboard.
//!
//! Some team names are deliberately hostile (combining marks, terminal
//! escapes, shell syntax) so display Sinks get to prove their sanitation.

use std::time::Duration;

use ctfront_core::config::SourceConfig;
use ctfront_core::feed::SnapshotFeed;
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Source;
use ctfront_types::{Challenge, ChallengeId, ChallengeRow, Snapshot, Team, TeamId};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::SourceError;

const TEAM_NAMES: &[&str] = &[
    "LuftensHjaltar",
    "ElectroH3xe",
    "Pappas Pojkar",
    "SpionFromage",
    "L33tF33t",
    "Ned Spandex",
    "True Pink",
    "x3",
    "haxKLOWN",
    "Sventon",
    "F-string",
    "buttHEX",
    "9neinNEIN",
    "Hell's Shells",
    "Twenty7",
    "constrict0r",
    "Mr.Hacker",
    "xXx420xXx",
    "Overfl0w",
    "_______",
    // Hostile names.
    "h\u{334}\u{33f}\u{356}a\u{335}\u{346}\u{319}x\u{338}\u{35c}\u{31f}h\u{338}\u{341}\u{33c}a\u{308}\u{335}\u{31f}x\u{338}\u{351}\u{327}",
    "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
    "{__globals__}",
    "\u{1b}[12;31mANSIholes",
    "$(/bin/sh)",
];

const CHALLENGE_NAMES: &[&str] = &[
    "Revvy's Revenge",
    "Wafflz",
    "PLIMby",
    "This isn't wha...",
    "Hanky",
    "NESbitt",
    "Kreislauf",
    "Schlumpf",
    "Rundfunk Röhmen",
    "0xROP",
    "SwitchBleyd",
    "Discombobulator",
    "EXCELsior",
    "Rusty Trombone",
    "strlen",
    "Vladimir Login",
    "Snoopy Cache",
    "Smeltdown",
    "Forky",
    "Y0 h0 and a bottle of Tschunk",
];

const CATEGORIES: &[&str] = &["pwn", "web", "rev", "misc", "baby", "troll", "crypto", "osint"];

const INITIAL_TEAMS: usize = 2;
const INITIAL_CHALLENGES: usize = 3;
const FIRST_TEAM_ID: u64 = 1000;
const FIRST_CHALLENGE_ID: u64 = 8000;

/// One random action the world can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoAction {
    /// A team signed up.
    NewTeam,
    /// A challenge was released.
    NewChallenge,
    /// A team solved a challenge.
    Solve,
}

/// The invented competition.
#[derive(Debug)]
pub struct DemoWorld {
    rng: SmallRng,
    team_pool: Vec<&'static str>,
    challenge_pool: Vec<&'static str>,
    last_team_id: u64,
    last_challenge_id: u64,
    /// Teams in sign-up order.
    teams: Vec<Team>,
    /// Challenges in release order.
    challenges: Vec<Challenge>,
}

impl DemoWorld {
    /// Create a world with the initial teams and challenges.
    pub fn new(rng: SmallRng) -> Self {
        let mut world = Self {
            rng,
            team_pool: TEAM_NAMES.to_vec(),
            challenge_pool: CHALLENGE_NAMES.to_vec(),
            last_team_id: FIRST_TEAM_ID,
            last_challenge_id: FIRST_CHALLENGE_ID,
            teams: Vec::new(),
            challenges: Vec::new(),
        };
        for _ in 0..INITIAL_TEAMS {
            world.add_team();
        }
        for _ in 0..INITIAL_CHALLENGES {
            world.add_challenge();
        }
        world
    }

    /// Create a world from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }

    /// Teams in sign-up order.
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Challenges in release order.
    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    /// Perform one random action and return which one was attempted.
    ///
    /// An action can be a no-op: the name pools run dry, and a team never
    /// solves the same challenge twice.
    pub fn step(&mut self) -> DemoAction {
        let action = match self.rng.random_range(0..3_u8) {
            0 => DemoAction::NewTeam,
            1 => DemoAction::NewChallenge,
            _ => DemoAction::Solve,
        };
        match action {
            DemoAction::NewTeam => {
                if self.add_team() {
                    self.rerank();
                }
            }
            DemoAction::NewChallenge => {
                self.add_challenge();
            }
            DemoAction::Solve => {
                if self.solve() {
                    self.rerank();
                }
            }
        }
        action
    }

    /// The current state as the pair of snapshots a poll would produce,
    /// challenges first.
    pub fn snapshots(&self) -> [Snapshot; 2] {
        let challenges = self
            .challenges
            .iter()
            .map(|c| {
                ChallengeRow::new(c.challenge_id.clone(), c.name.clone())
                    .with_categories(c.categories.iter().cloned())
                    .with_points(c.points)
                    .with_solves(c.solves.iter().cloned())
            })
            .collect();
        [
            Snapshot::Challenges { challenges },
            Snapshot::Scoreboard {
                teams: self.teams.clone(),
            },
        ]
    }

    fn add_team(&mut self) -> bool {
        let Some(name) = pop_random(&mut self.rng, &mut self.team_pool) else {
            return false;
        };
        self.last_team_id = self.last_team_id.saturating_add(1);
        let place = u32::try_from(self.teams.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        self.teams.push(
            Team::new(TeamId::from(self.last_team_id), name)
                .with_place(place)
                .with_score(Decimal::ZERO),
        );
        true
    }

    fn add_challenge(&mut self) -> bool {
        let Some(name) = pop_random(&mut self.rng, &mut self.challenge_pool) else {
            return false;
        };
        let picks = self.rng.random_range(1..=3_usize);
        let mut categories: Vec<String> = Vec::new();
        for _ in 0..picks {
            if let Some(category) = CATEGORIES.choose(&mut self.rng)
                && !categories.iter().any(|c| c == category)
            {
                categories.push((*category).to_owned());
            }
        }
        let points = Decimal::from(self.rng.random_range(1..=10_u32).saturating_mul(100));

        self.last_challenge_id = self.last_challenge_id.saturating_add(1);
        self.challenges.push(Challenge::from(
            ChallengeRow::new(ChallengeId::from(self.last_challenge_id), name)
                .with_categories(categories)
                .with_points(points)
                .with_solves(Vec::<TeamId>::new()),
        ));
        true
    }

    fn solve(&mut self) -> bool {
        let team_count = self.teams.len();
        let challenge_count = self.challenges.len();
        if team_count == 0 || challenge_count == 0 {
            return false;
        }
        let team_index = self.rng.random_range(0..team_count);
        let challenge_index = self.rng.random_range(0..challenge_count);
        let (Some(team), Some(challenge)) = (
            self.teams.get_mut(team_index),
            self.challenges.get_mut(challenge_index),
        ) else {
            return false;
        };

        if challenge.solved_by(&team.team_id) {
            return false;
        }
        challenge.solves.push(team.team_id.clone());
        team.score = Some(team.score_or_baseline().saturating_add(challenge.points));
        debug!(team = %team.name, challenge = %challenge.name, "Demo solve");
        true
    }

    /// Assign places by score, best first. Ties keep their previous order.
    fn rerank(&mut self) {
        let mut order: Vec<usize> = (0..self.teams.len()).collect();
        let teams = &self.teams;
        order.sort_by_key(|&i| teams.get(i).map_or(u32::MAX, Team::place_or_baseline));
        order.sort_by(|&a, &b| {
            let score = |i: usize| teams.get(i).map(Team::score_or_baseline);
            score(b).cmp(&score(a))
        });

        let mut place: u32 = 0;
        for index in order {
            place = place.saturating_add(1);
            if let Some(team) = self.teams.get_mut(index) {
                team.place = Some(place);
            }
        }
    }
}

/// Remove a random entry from `pool`.
fn pop_random(rng: &mut SmallRng, pool: &mut Vec<&'static str>) -> Option<&'static str> {
    if pool.is_empty() {
        return None;
    }
    let index = rng.random_range(0..pool.len());
    Some(pool.swap_remove(index))
}

/// Source that submits a [`DemoWorld`] once per interval.
#[derive(Debug)]
pub struct DemoSource {
    world: DemoWorld,
    interval: Duration,
}

impl DemoSource {
    /// Create a demo Source from its configuration.
    pub fn new(config: &SourceConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self {
            world: DemoWorld::new(rng),
            interval: config.demo_interval(),
        }
    }

    fn submit_world(&self, feed: &mut SnapshotFeed) {
        for snapshot in self.world.snapshots() {
            feed.submit(snapshot);
        }
    }
}

impl Source for DemoSource {
    type Error = SourceError;

    fn name(&self) -> &str {
        "demo"
    }

    async fn run(mut self, mut feed: SnapshotFeed, stop: StopSignal) -> Result<(), SourceError> {
        info!(
            teams = self.world.teams().len(),
            challenges = self.world.challenges().len(),
            interval_ms = self.interval.as_millis(),
            "Demo source started"
        );
        self.submit_world(&mut feed);

        while !stop.sleep(self.interval).await {
            let action = self.world.step();
            debug!(?action, "Demo step");
            self.submit_world(&mut feed);
        }

        info!("Demo source stopped");
        Ok(())
    }
}
