//! Source for CTFd instances.
//!
//! The scoreboard comes from `/api/v1/scoreboard` and is always polled.
//! Challenges (`/api/v1/challenges`) and their solvers
//! (`/api/v1/challenges/{id}/solves`) need an authenticated session, so they
//! are only polled when an API token is configured.
//!
//! A failed request skips that part of the cycle. When one solves request
//! fails, no further solves are requested that cycle, and only the
//! challenges whose solvers were fetched are submitted (see
//! [`fetched_rows`]).

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
use crate::poll::{fetched_rows, instance_root};

/// Marker present in the footer of every CTFd page.
const POWERED_BY: &str = "Powered by CTFd";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a fetched landing page was served by CTFd.
pub fn detect(page: &str) -> bool {
    page.contains(POWERED_BY)
}

/// Reduce a user-supplied URL to the instance root.
///
/// Users tend to paste the scoreboard or login page; everything from
/// `/scoreboard` or `/login` onward is dropped, as is a trailing slash.
pub fn base_url(url: &str) -> String {
    instance_root(url, &["/scoreboard", "/login"])
}

// ---------------------------------------------------------------------------
// API payloads
// ---------------------------------------------------------------------------

/// The `{success, data}` wrapper around every CTFd API response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ScoreboardEntry {
    account_id: TeamId,
    name: String,
    #[serde(default)]
    score: Option<Decimal>,
    #[serde(default)]
    pos: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChallengeEntry {
    id: ChallengeId,
    name: String,
    #[serde(default)]
    value: Option<Decimal>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SolveEntry {
    account_id: TeamId,
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, SourceError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
        } => Ok(data),
        Envelope { success: false, .. } => Err(SourceError::Protocol(format!(
            "{what} request was not successful"
        ))),
        Envelope { data: None, .. } => {
            Err(SourceError::Protocol(format!("{what} response carried no data")))
        }
    }
}

/// Parse a `/api/v1/scoreboard` body into scoreboard rows.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON and
/// [`SourceError::Protocol`] when CTFd reports failure.
pub fn parse_scoreboard(body: &str) -> Result<Vec<Team>, SourceError> {
    let entries: Vec<ScoreboardEntry> = unwrap_envelope(body, "scoreboard")?;
    Ok(entries
        .into_iter()
        .map(|entry| Team {
            score: entry.score,
            place: entry.pos,
            ..Team::new(entry.account_id, entry.name)
        })
        .collect())
}

/// Parse a `/api/v1/challenges` body into challenge rows without solves.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON and
/// [`SourceError::Protocol`] when CTFd reports failure.
pub fn parse_challenges(body: &str) -> Result<Vec<ChallengeRow>, SourceError> {
    let entries: Vec<ChallengeEntry> = unwrap_envelope(body, "challenges")?;
    Ok(entries
        .into_iter()
        .map(|entry| ChallengeRow {
            points: entry.value,
            categories: entry.category.map(|c| vec![c]),
            ..ChallengeRow::new(entry.id, entry.name)
        })
        .collect())
}

/// Parse a `/api/v1/challenges/{id}/solves` body into solver ids.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON and
/// [`SourceError::Protocol`] when CTFd reports failure.
pub fn parse_solves(body: &str) -> Result<Vec<TeamId>, SourceError> {
    let entries: Vec<SolveEntry> = unwrap_envelope(body, "solves")?;
    Ok(entries.into_iter().map(|e| e.account_id).collect())
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Polls one CTFd instance.
#[derive(Debug)]
pub struct CtfdSource {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    poll_interval: Duration,
}

impl CtfdSource {
    /// Create a CTFd Source from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] when no URL is configured and
    /// [`SourceError::Http`] when the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Err(SourceError::Config("the ctfd backend requires a url".to_owned()));
        };
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url(url),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            poll_interval: config.poll_interval(),
        })
    }

    /// The normalized instance root.
    pub fn base(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<String, SourceError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.api_token {
            request = request
                .header("Authorization", format!("Token {token}"))
                .header("Content-Type", "application/json");
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Protocol(format!("{url} returned {status}")));
        }
        Ok(response.text().await?)
    }

    async fn fetch_scoreboard(&self) -> Result<Vec<Team>, SourceError> {
        parse_scoreboard(&self.get("/api/v1/scoreboard").await?)
    }

    async fn fetch_solves(&self, challenge_id: &ChallengeId) -> Result<Vec<TeamId>, SourceError> {
        parse_solves(
            &self
                .get(&format!("/api/v1/challenges/{challenge_id}/solves"))
                .await?,
        )
    }

    async fn fetch_challenges(&self) -> Result<Vec<ChallengeRow>, SourceError> {
        let mut rows = parse_challenges(&self.get("/api/v1/challenges").await?)?;

        for row in &mut rows {
            match self.fetch_solves(&row.challenge_id).await {
                Ok(solves) => row.solves = Some(solves),
                Err(e) => {
                    warn!(challenge = %row.challenge_id, error = %e, "Solves fetch failed, skipping solves this cycle");
                    break;
                }
            }
        }

        let total = rows.len();
        let rows = fetched_rows(rows);
        if rows.len() < total {
            debug!(kept = rows.len(), total, "Submitting challenges with known solvers only");
        }
        Ok(rows)
    }

    /// Fetch and submit one round of snapshots.
    async fn poll_once(&self, feed: &mut SnapshotFeed) {
        if self.api_token.is_some() {
            match self.fetch_challenges().await {
                Ok(challenges) => {
                    feed.submit(Snapshot::Challenges { challenges });
                }
                Err(e) => warn!(error = %e, "Challenge fetch failed"),
            }
        }

        match self.fetch_scoreboard().await {
            Ok(teams) => {
                debug!(teams = teams.len(), "Scoreboard fetched");
                feed.submit(Snapshot::Scoreboard { teams });
            }
            Err(e) => warn!(error = %e, "Scoreboard fetch failed"),
        }
    }
}

impl Source for CtfdSource {
    type Error = SourceError;

    fn name(&self) -> &str {
        "ctfd"
    }

    async fn run(self, mut feed: SnapshotFeed, stop: StopSignal) -> Result<(), SourceError> {
        info!(
            url = %self.base_url,
            challenges = self.api_token.is_some(),
            interval_secs = self.poll_interval.as_secs(),
            "Polling CTFd instance"
        );

        loop {
            tokio::select! {
                () = stop.stopped() => break,
                () = self.poll_once(&mut feed) => {}
            }
            if stop.sleep(self.poll_interval).await {
                break;
            }
        }

        info!("CTFd source stopped");
        Ok(())
    }
}
