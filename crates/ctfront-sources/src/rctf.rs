//! Source for rCTF instances.
//!
//! The leaderboard (`/api/v1/leaderboard/now`) is public and handed out 100
//! teams per page. Challenges (`/api/v1/challs`) and their solvers
//! (`/api/v1/challs/{id}/solves`, 10 per page) need a session: the
//! configured team token is traded for a bearer token at
//! `/api/v1/auth/login` when the Source starts. Without a token, or when
//! the login is refused, only the leaderboard is polled.
//!
//! Every reply is a `{kind, message, data}` object whose `kind` names the
//! outcome (`goodLeaderboard`, `badToken`, ...), so replies are judged by
//! `kind` rather than by HTTP status.

use std::time::Duration;

use ctfront_core::config::SourceConfig;
use ctfront_core::feed::SnapshotFeed;
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Source;
use ctfront_types::{ChallengeId, ChallengeRow, Snapshot, Team, TeamId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::poll::instance_root;

/// Marker in the config blob embedded in every rCTF page.
const CONFIG_MARKER: &str = "rctf-config";

const LEADERBOARD_PAGE: usize = 100;
const SOLVES_PAGE: usize = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a fetched landing page was served by rCTF.
pub fn detect(page: &str) -> bool {
    page.contains(CONFIG_MARKER)
}

/// Reduce a user-supplied URL to the instance root, dropping everything
/// from `/scores` or `/login` onward.
pub fn base_url(url: &str) -> String {
    instance_root(url, &["/scores", "/login"])
}

// ---------------------------------------------------------------------------
// API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Reply {
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "authToken")]
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct LeaderboardPage {
    total: usize,
    leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardEntry {
    id: TeamId,
    name: String,
    #[serde(default)]
    score: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct ChallEntry {
    id: ChallengeId,
    name: String,
    #[serde(default)]
    points: Option<Decimal>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    solves: usize,
}

#[derive(Debug, Deserialize)]
struct SolvesPage {
    solves: Vec<SolveEntry>,
}

#[derive(Debug, Deserialize)]
struct SolveEntry {
    #[serde(rename = "userId")]
    user_id: TeamId,
}

fn expect_reply<T: DeserializeOwned>(body: &str, kind: &str) -> Result<T, SourceError> {
    let reply: Reply = serde_json::from_str(body)?;
    if reply.kind != kind {
        return Err(SourceError::Protocol(format!(
            "expected {kind}, got {}",
            reply.kind
        )));
    }
    Ok(serde_json::from_value(reply.data)?)
}

/// Parse a login reply into the bearer token.
///
/// # Errors
///
/// Returns [`SourceError::Protocol`] when the login was refused and
/// [`SourceError::Parse`] for malformed JSON.
pub fn parse_login(body: &str) -> Result<String, SourceError> {
    let data: LoginData = expect_reply(body, "goodLogin")?;
    Ok(data.auth_token)
}

/// Parse one leaderboard page that starts `offset` teams down.
///
/// Returns the page's teams, placed by their position in the full
/// leaderboard, and the total number of teams.
///
/// # Errors
///
/// Returns [`SourceError::Protocol`] for an unexpected reply kind and
/// [`SourceError::Parse`] for malformed JSON.
pub fn parse_leaderboard(body: &str, offset: usize) -> Result<(Vec<Team>, usize), SourceError> {
    let page: LeaderboardPage = expect_reply(body, "goodLeaderboard")?;
    let teams = page
        .leaderboard
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let place = u32::try_from(offset.saturating_add(index).saturating_add(1)).ok();
            Team {
                score: entry.score,
                place,
                ..Team::new(entry.id, entry.name)
            }
        })
        .collect();
    Ok((teams, page.total))
}

/// Parse the challenge list into rows without solves, each paired with the
/// number of solves rCTF reports for it.
///
/// # Errors
///
/// Returns [`SourceError::Protocol`] for an unexpected reply kind and
/// [`SourceError::Parse`] for malformed JSON.
pub fn parse_challenges(body: &str) -> Result<Vec<(ChallengeRow, usize)>, SourceError> {
    let entries: Vec<ChallEntry> = expect_reply(body, "goodChallenges")?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let row = ChallengeRow {
                points: entry.points,
                categories: entry.category.map(|c| vec![c]),
                ..ChallengeRow::new(entry.id, entry.name)
            };
            (row, entry.solves)
        })
        .collect())
}

/// Parse one page of a challenge's solvers.
///
/// # Errors
///
/// Returns [`SourceError::Protocol`] for an unexpected reply kind and
/// [`SourceError::Parse`] for malformed JSON.
pub fn parse_solves(body: &str) -> Result<Vec<TeamId>, SourceError> {
    let page: SolvesPage = expect_reply(body, "goodChallengeSolves")?;
    Ok(page.solves.into_iter().map(|s| s.user_id).collect())
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Polls one rCTF instance.
#[derive(Debug)]
pub struct RctfSource {
    client: reqwest::Client,
    base_url: String,
    team_token: Option<String>,
    poll_interval: Duration,
}

impl RctfSource {
    /// Create an rCTF Source from its configuration. `api_token` holds the
    /// team token.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] when no URL is configured and
    /// [`SourceError::Http`] when the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Err(SourceError::Config("the rctf backend requires a url".to_owned()));
        };
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url(url),
            team_token: config.api_token.clone().filter(|t| !t.is_empty()),
            poll_interval: config.poll_interval(),
        })
    }

    /// The normalized instance root.
    pub fn base(&self) -> &str {
        &self.base_url
    }

    async fn login(&self, team_token: &str) -> Result<String, SourceError> {
        let body = self
            .client
            .post(format!("{}/api/v1/auth/login", self.base_url))
            .json(&serde_json::json!({ "teamToken": team_token }))
            .send()
            .await?
            .text()
            .await?;
        parse_login(&body)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, usize)],
        bearer: Option<&str>,
    ) -> Result<String, SourceError> {
        let mut request = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        Ok(request.send().await?.text().await?)
    }

    async fn fetch_leaderboard(&self) -> Result<Vec<Team>, SourceError> {
        let mut teams = Vec::new();
        loop {
            let offset = teams.len();
            let body = self
                .get(
                    "/api/v1/leaderboard/now",
                    &[("limit", LEADERBOARD_PAGE), ("offset", offset)],
                    None,
                )
                .await?;
            let (page, total) = parse_leaderboard(&body, offset)?;
            let exhausted = page.is_empty();
            teams.extend(page);
            if exhausted || teams.len() >= total {
                return Ok(teams);
            }
        }
    }

    async fn fetch_solves(
        &self,
        challenge_id: &ChallengeId,
        expected: usize,
        bearer: &str,
    ) -> Result<Vec<TeamId>, SourceError> {
        let path = format!("/api/v1/challs/{challenge_id}/solves");
        let mut solves = Vec::new();
        while solves.len() < expected {
            let body = self
                .get(
                    &path,
                    &[("limit", SOLVES_PAGE), ("offset", solves.len())],
                    Some(bearer),
                )
                .await?;
            let page = parse_solves(&body)?;
            if page.is_empty() {
                break;
            }
            solves.extend(page);
        }
        Ok(solves)
    }

    /// Challenges whose solvers could all be fetched, in list order. The
    /// first failed solves request ends the list for this cycle.
    async fn fetch_challenges(&self, bearer: &str) -> Result<Vec<ChallengeRow>, SourceError> {
        let listed = parse_challenges(&self.get("/api/v1/challs", &[], Some(bearer)).await?)?;

        let mut rows = Vec::with_capacity(listed.len());
        for (mut row, expected) in listed {
            match self.fetch_solves(&row.challenge_id, expected, bearer).await {
                Ok(solves) => row.solves = Some(solves),
                Err(e) => {
                    warn!(challenge = %row.challenge_id, error = %e, "Solves fetch failed, skipping solves this cycle");
                    break;
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Fetch and submit one round of snapshots.
    async fn poll_once(&self, feed: &mut SnapshotFeed, bearer: Option<&str>) {
        match self.fetch_leaderboard().await {
            Ok(teams) => {
                debug!(teams = teams.len(), "Leaderboard fetched");
                feed.submit(Snapshot::Scoreboard { teams });
            }
            Err(e) => warn!(error = %e, "Leaderboard fetch failed"),
        }

        if let Some(bearer) = bearer {
            match self.fetch_challenges(bearer).await {
                Ok(challenges) => {
                    feed.submit(Snapshot::Challenges { challenges });
                }
                Err(e) => warn!(error = %e, "Challenge fetch failed"),
            }
        }
    }
}

impl Source for RctfSource {
    type Error = SourceError;

    fn name(&self) -> &str {
        "rctf"
    }

    async fn run(self, mut feed: SnapshotFeed, stop: StopSignal) -> Result<(), SourceError> {
        info!(
            url = %self.base_url,
            interval_secs = self.poll_interval.as_secs(),
            "Polling rCTF instance"
        );

        let mut bearer = None;
        if let Some(team_token) = &self.team_token {
            tokio::select! {
                () = stop.stopped() => return Ok(()),
                login = self.login(team_token) => match login {
                    Ok(token) => {
                        info!("Logged in, polling challenges and solves");
                        bearer = Some(token);
                    }
                    Err(e) => warn!(error = %e, "Login failed, polling the leaderboard only"),
                },
            }
        }

        loop {
            tokio::select! {
                () = stop.stopped() => break,
                () = self.poll_once(&mut feed, bearer.as_deref()) => {}
            }
            if stop.sleep(self.poll_interval).await {
                break;
            }
        }

        info!("rCTF source stopped");
        Ok(())
    }
}
