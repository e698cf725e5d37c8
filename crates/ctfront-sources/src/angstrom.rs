//! Source for ångstromCTF.
//!
//! Every edition is served by one public API host as a numbered
//! competition. The edition is picked by matching the label in front of
//! `angstromctf.com` in the configured URL (`2021.angstromctf.com` gives
//! `2021`) against the competition names; when nothing matches, the latest
//! competition is used. Competition lookup is retried every cycle until it
//! succeeds.
//!
//! The team list arrives in sign-up order and carries no places. Teams are
//! ranked by score, then by whose last solve came first, then by who signed
//! up first. Challenges and solves need no session and are always polled.

use std::cmp::Reverse;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ctfront_core::config::SourceConfig;
use ctfront_core::feed::SnapshotFeed;
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Source;
use ctfront_types::{ChallengeId, ChallengeRow, Snapshot, Team, TeamId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::poll::fetched_rows;

/// API host shared by every edition.
pub const API_URL: &str = "https://api.angstromctf.com";

const DOMAIN: &str = "angstromctf.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a URL points at ångstromCTF.
pub fn detect(url: &str) -> bool {
    url.contains(DOMAIN)
}

/// The edition label of an ångstromCTF URL, if it names one.
pub fn edition(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = host.split(':').next().unwrap_or(host);
    host.strip_suffix(DOMAIN)?
        .strip_suffix('.')?
        .rsplit('.')
        .next()
        .filter(|label| !label.is_empty())
}

// ---------------------------------------------------------------------------
// API payloads
// ---------------------------------------------------------------------------

/// One competition hosted by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Competition {
    /// Numeric id used in API paths.
    pub id: u64,
    /// Display name, usually the year.
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TeamEntry {
    id: TeamId,
    name: String,
    #[serde(default)]
    score: Decimal,
    #[serde(rename = "lastSolve", default)]
    last_solve: Option<DateTime<Utc>>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
}

impl TeamEntry {
    /// Teams without points tie on this key, ahead of any real solve time.
    fn solve_key(&self) -> Option<DateTime<Utc>> {
        if self.score > Decimal::ZERO {
            self.last_solve
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChallengeEntry {
    id: ChallengeId,
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    value: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct ChallengeDetail {
    #[serde(default)]
    solves: Vec<SolveEntry>,
}

#[derive(Debug, Deserialize)]
struct SolveEntry {
    team: SolveTeam,
}

#[derive(Debug, Deserialize)]
struct SolveTeam {
    id: TeamId,
}

/// Parse the competition list.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON.
pub fn parse_competitions(body: &str) -> Result<Vec<Competition>, SourceError> {
    Ok(serde_json::from_str(body)?)
}

/// The competition named `edition`, or else the latest one.
pub fn pick_competition(competitions: &[Competition], edition: Option<&str>) -> Option<u64> {
    edition
        .and_then(|name| competitions.iter().find(|c| c.name == name))
        .or_else(|| competitions.last())
        .map(|c| c.id)
}

/// Parse the team list and rank it.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON.
pub fn parse_teams(body: &str) -> Result<Vec<Team>, SourceError> {
    let mut entries: Vec<TeamEntry> = serde_json::from_str(body)?;
    entries.sort_by_key(|e| (Reverse(e.score), e.solve_key(), e.created));
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| Team {
            score: Some(entry.score),
            place: u32::try_from(index.saturating_add(1)).ok(),
            ..Team::new(entry.id, entry.name)
        })
        .collect())
}

/// Parse a competition's challenge list into rows without solves.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON.
pub fn parse_challenges(body: &str) -> Result<Vec<ChallengeRow>, SourceError> {
    let entries: Vec<ChallengeEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .map(|entry| ChallengeRow {
            points: entry.value,
            categories: entry.category.map(|c| vec![c]),
            ..ChallengeRow::new(entry.id, entry.title)
        })
        .collect())
}

/// Parse a challenge detail body into its solvers, in solve order.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for malformed JSON.
pub fn parse_solves(body: &str) -> Result<Vec<TeamId>, SourceError> {
    let detail: ChallengeDetail = serde_json::from_str(body)?;
    Ok(detail.solves.into_iter().map(|s| s.team.id).collect())
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Polls one ångstromCTF edition.
#[derive(Debug)]
pub struct AngstromSource {
    client: reqwest::Client,
    api_url: String,
    edition: Option<String>,
    poll_interval: Duration,
}

impl AngstromSource {
    /// Create an ångstromCTF Source from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] when no URL is configured and
    /// [`SourceError::Http`] when the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Err(SourceError::Config(
                "the angstrom backend requires a url".to_owned(),
            ));
        };
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: API_URL.to_owned(),
            edition: edition(url).map(str::to_owned),
            poll_interval: config.poll_interval(),
        })
    }

    /// The edition label taken from the configured URL.
    pub fn edition(&self) -> Option<&str> {
        self.edition.as_deref()
    }

    async fn get<T>(
        &self,
        path: &str,
        parse: fn(&str) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let url = format!("{}{path}", self.api_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Protocol(format!("{url} returned {status}")));
        }
        parse(&response.text().await?)
    }

    async fn resolve_competition(&self) -> Result<u64, SourceError> {
        let competitions = self.get("/competitions", parse_competitions).await?;
        let Some(id) = pick_competition(&competitions, self.edition()) else {
            return Err(SourceError::Protocol("no competitions listed".to_owned()));
        };
        let listed = |name: &str| competitions.iter().any(|c| c.name == name);
        if let Some(name) = self.edition().filter(|name| !listed(name)) {
            warn!(edition = name, id, "Edition not listed, using the latest competition");
        }
        Ok(id)
    }

    /// Challenges whose solvers could all be fetched, in list order.
    async fn fetch_challenges(&self, competition: u64) -> Result<Vec<ChallengeRow>, SourceError> {
        let base = format!("/competitions/{competition}/challenges");
        let mut rows = self.get(&base, parse_challenges).await?;

        for row in &mut rows {
            let path = format!("{base}/{}", row.challenge_id);
            match self.get(&path, parse_solves).await {
                Ok(solves) => row.solves = Some(solves),
                Err(e) => {
                    warn!(challenge = %row.challenge_id, error = %e, "Solves fetch failed, skipping solves this cycle");
                    break;
                }
            }
        }
        Ok(fetched_rows(rows))
    }

    /// Fetch and submit one round of snapshots.
    async fn poll_once(&self, feed: &mut SnapshotFeed, competition: &mut Option<u64>) {
        let id = match *competition {
            Some(id) => id,
            None => match self.resolve_competition().await {
                Ok(id) => {
                    info!(competition = id, "Competition selected");
                    *competition = Some(id);
                    id
                }
                Err(e) => {
                    warn!(error = %e, "Competition lookup failed");
                    return;
                }
            },
        };

        match self.fetch_challenges(id).await {
            Ok(challenges) => {
                feed.submit(Snapshot::Challenges { challenges });
            }
            Err(e) => warn!(error = %e, "Challenge fetch failed"),
        }

        match self
            .get(&format!("/competitions/{id}/teams"), parse_teams)
            .await
        {
            Ok(teams) => {
                debug!(teams = teams.len(), "Teams fetched");
                feed.submit(Snapshot::Scoreboard { teams });
            }
            Err(e) => warn!(error = %e, "Team fetch failed"),
        }
    }
}

impl Source for AngstromSource {
    type Error = SourceError;

    fn name(&self) -> &str {
        "angstrom"
    }

    async fn run(self, mut feed: SnapshotFeed, stop: StopSignal) -> Result<(), SourceError> {
        info!(
            edition = self.edition().unwrap_or("-"),
            interval_secs = self.poll_interval.as_secs(),
            "Polling angstromCTF"
        );

        let mut competition = None;
        loop {
            tokio::select! {
                () = stop.stopped() => break,
                () = self.poll_once(&mut feed, &mut competition) => {}
            }
            if stop.sleep(self.poll_interval).await {
                break;
            }
        }

        info!("angstromCTF source stopped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_domain() {
        assert!(detect("https://2024.angstromctf.com/scoreboard"));
        assert!(!detect("https://ctf.example.org"));
    }

    #[test]
    fn edition_is_the_label_before_the_domain() {
        assert_eq!(edition("https://2021.angstromctf.com/challenges"), Some("2021"));
        assert_eq!(edition("https://www.2023.angstromctf.com:443/"), Some("2023"));
        assert_eq!(edition("https://angstromctf.com"), None);
        assert_eq!(edition("https://ctf.example.org"), None);
    }

    fn competitions() -> Vec<Competition> {
        parse_competitions(
            r#"[{"id": 5, "name": "2022", "start": 0}, {"id": 6, "name": "2023"}, {"id": 7, "name": "2024"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn competition_by_edition_or_latest() {
        assert_eq!(pick_competition(&competitions(), Some("2023")), Some(6));
        assert_eq!(pick_competition(&competitions(), Some("1999")), Some(7));
        assert_eq!(pick_competition(&competitions(), None), Some(7));
        assert_eq!(pick_competition(&[], Some("2023")), None);
    }

    #[test]
    fn teams_rank_by_score_then_last_solve_then_sign_up() {
        let body = r#"[
            {"id": 1, "name": "late bloomer", "score": 100,
             "lastSolve": "2024-05-02T12:00:00Z", "created": "2024-05-01T00:00:00Z"},
            {"id": 2, "name": "early bird", "score": 100,
             "lastSolve": "2024-05-02T09:00:00Z", "created": "2024-05-01T06:00:00Z"},
            {"id": 3, "name": "leader", "score": 250,
             "lastSolve": "2024-05-03T00:00:00Z", "created": "2024-05-01T08:00:00Z"},
            {"id": 4, "name": "idle second", "score": 0,
             "lastSolve": null, "created": "2024-05-01T05:00:00Z"},
            {"id": 5, "name": "idle first", "score": 0,
             "created": "2024-05-01T01:00:00Z"}
        ]"#;
        let teams = parse_teams(body).unwrap();
        let order: Vec<(&str, Option<u32>)> =
            teams.iter().map(|t| (t.name.as_str(), t.place)).collect();
        assert_eq!(
            order,
            [
                ("leader", Some(1)),
                ("early bird", Some(2)),
                ("late bloomer", Some(3)),
                ("idle first", Some(4)),
                ("idle second", Some(5)),
            ]
        );
    }

    #[test]
    fn challenges_and_solves_are_mapped() {
        let rows = parse_challenges(
            r#"[{"id": 31, "title": "Sanity Check", "category": "misc", "value": 10, "author": "x"}]"#,
        )
        .unwrap();
        assert_eq!(
            rows,
            vec![
                ChallengeRow::new(31_u64, "Sanity Check")
                    .with_points(Decimal::from(10))
                    .with_categories(["misc"])
            ]
        );

        let solves = parse_solves(
            r#"{"id": 31, "solves": [{"team": {"id": 9, "name": "a"}}, {"team": {"id": 4, "name": "b"}}]}"#,
        )
        .unwrap();
        assert_eq!(solves, vec![TeamId::from(9_u64), TeamId::from(4_u64)]);
        assert!(parse_solves(r#"{"id": 32}"#).unwrap().is_empty());
    }

    #[test]
    fn new_keeps_the_edition() {
        let err = AngstromSource::new(&SourceConfig::default()).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));

        let config = SourceConfig {
            url: Some("https://2024.angstromctf.com/scoreboard".to_owned()),
            ..SourceConfig::default()
        };
        let source = AngstromSource::new(&config).unwrap();
        assert_eq!(source.edition(), Some("2024"));
    }
}
