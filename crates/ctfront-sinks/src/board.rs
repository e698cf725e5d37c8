//! Modal Sink that draws a live ranking in the terminal.
//!
//! The board keeps its own table of teams, fed by `boot`, `new_team`,
//! `place` and `score` events, and redraws it whenever something changed
//! and on every refresh tick. Each row shows the place, a `▲` when the team
//! climbed with its last place change, the sanitized name, the score and a
//! trophy per first blood (`n× 🏆` past four).
//!
//! Only the first `max_length` rows are shown. Teams further down whose
//! name matches one of the `focus_teams` patterns are appended below the
//! cut, at the expense of the last rows above it.
//!
//! The board owns the terminal (raw mode, alternate screen) and returns
//! when the user presses `q`, `Esc` or `Ctrl-C`, which ends the whole run.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::time::Duration;

use crossterm::event::{self, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};
use ctfront_core::config::BoardConfig;
use ctfront_core::dispatch::{Delivery, Mailbox};
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Sink;
use ctfront_types::{Challenge, ChallengeId, Event, Team, TeamId};
use regex::Regex;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info};
use unicode_width::UnicodeWidthStr;

use crate::error::SinkError;
use crate::sanitize::sanitize;

/// How often the keyboard is checked while no events arrive.
const INPUT_POLL: Duration = Duration::from_millis(100);

const CLIMB_MARKER: &str = "▲";

const TROPHY: &str = "🏆";

/// Trophies drawn one by one up to this count, then as `n× 🏆`.
const MAX_TROPHIES: usize = 4;

// ---------------------------------------------------------------------------
// Table state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct BoardTeam {
    /// Already sanitized.
    name: String,
    place: Option<u32>,
    old_place: Option<u32>,
    score: Option<Decimal>,
    /// Challenges this team drew first blood on.
    firsts: BTreeSet<ChallengeId>,
}

impl BoardTeam {
    fn from_team(team: &Team) -> Self {
        Self {
            name: sanitize(&team.name),
            place: team.place,
            old_place: team.place,
            score: team.score,
            firsts: BTreeSet::new(),
        }
    }

    fn climbed(&self) -> bool {
        matches!((self.old_place, self.place), (Some(old), Some(new)) if old > new)
    }
}

/// One rendered ranking row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRow {
    /// Place, or `-` when unknown.
    pub place: String,
    /// Whether the team moved up with its last place change.
    pub climbed: bool,
    /// Sanitized team name.
    pub name: String,
    /// Score, or `-` when unknown.
    pub score: String,
    /// First-blood trophies, empty for none.
    pub awards: String,
}

/// Render a first-blood count.
pub fn format_awards(count: usize) -> String {
    if count > MAX_TROPHIES {
        format!("{count}× {TROPHY}")
    } else {
        TROPHY.repeat(count)
    }
}

/// The board's own view of the ranking.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    teams: BTreeMap<TeamId, BoardTeam>,
}

impl BoardState {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of teams known to the board.
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// Whether no team is known yet.
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Fold one event into the table. Returns `true` if the table changed.
    ///
    /// Challenges only count through their first blood: the first solver
    /// of a challenge in `boot` or `new_challenge`, and `solve` events
    /// flagged `first`. Changes for teams the board has never seen are
    /// ignored.
    pub fn apply(&mut self, event: &Event) -> bool {
        match event {
            Event::Boot(boot) => {
                self.teams = boot
                    .teams
                    .iter()
                    .map(|t| (t.team_id.clone(), BoardTeam::from_team(t)))
                    .collect();
                for challenge in boot.challenges.iter().flatten() {
                    self.credit_history(challenge);
                }
                true
            }
            Event::NewTeam(team) => {
                self.teams
                    .insert(team.team_id.clone(), BoardTeam::from_team(team));
                true
            }
            Event::Place(change) => self.teams.get_mut(&change.team_id).is_some_and(|t| {
                t.place = Some(change.place);
                t.old_place = Some(change.old_place);
                true
            }),
            Event::Score(change) => self.teams.get_mut(&change.team_id).is_some_and(|t| {
                t.score = Some(change.score);
                true
            }),
            Event::NewChallenge(challenge) => self.credit_history(challenge),
            Event::Solve(solve) => {
                solve.first && self.credit_first(&solve.team_id, &solve.challenge_id)
            }
        }
    }

    /// Credit the earliest recorded solver of `challenge`.
    fn credit_history(&mut self, challenge: &Challenge) -> bool {
        challenge
            .solves
            .first()
            .is_some_and(|team_id| self.credit_first(team_id, &challenge.challenge_id))
    }

    fn credit_first(&mut self, team_id: &TeamId, challenge_id: &ChallengeId) -> bool {
        self.teams
            .get_mut(team_id)
            .is_some_and(|t| t.firsts.insert(challenge_id.clone()))
    }

    /// Rows in ranking order: by place, unplaced teams last.
    pub fn ranking(&self) -> Vec<BoardRow> {
        let mut ranked: Vec<&BoardTeam> = self.teams.values().collect();
        ranked.sort_by_key(|t| (t.place.is_none(), t.place));
        ranked
            .into_iter()
            .map(|t| BoardRow {
                place: t.place.map_or_else(|| "-".to_owned(), |p| p.to_string()),
                climbed: t.climbed(),
                name: t.name.clone(),
                score: t.score.map_or_else(|| "-".to_owned(), |s| s.normalize().to_string()),
                awards: format_awards(t.firsts.len()),
            })
            .collect()
    }
}

/// Cut the ranking to `max_length` rows, keeping focused teams visible.
///
/// Rows below the cut whose name matches a focus pattern are appended; to
/// make room, rows are dropped from the end of the visible part.
pub fn crop(rows: Vec<BoardRow>, max_length: usize, focus: &[Regex]) -> Vec<BoardRow> {
    let mut visible = rows;
    let below = visible.split_off(max_length.min(visible.len()));
    let focused: Vec<BoardRow> = below
        .into_iter()
        .filter(|row| focus.iter().any(|re| re.is_match(&row.name)))
        .collect();

    let room = max_length.saturating_sub(focused.len());
    visible.truncate(room);
    visible.extend(focused);
    visible
}

/// Lay out rows as aligned text, one line per row.
pub fn format_table(rows: &[BoardRow]) -> String {
    let place_width = rows.iter().map(|r| r.place.width()).max().unwrap_or(0);
    let name_width = rows.iter().map(|r| r.name.width()).max().unwrap_or(0);
    let score_width = rows.iter().map(|r| r.score.width()).max().unwrap_or(0);

    let mut out = String::new();
    for row in rows {
        let marker = if row.climbed { CLIMB_MARKER } else { " " };
        let name_pad = " ".repeat(name_width.saturating_sub(row.name.width()));
        let line = format!(
            "{place:>place_width$} {marker} {name}{name_pad}  {score:>score_width$}  {awards}",
            place = row.place,
            name = row.name,
            score = row.score,
            awards = row.awards,
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Compile focus patterns. Each matches at the start of a sanitized name.
///
/// # Errors
///
/// Returns [`SinkError::Config`] for a pattern that is not a valid regex.
pub fn compile_focus(patterns: &[String]) -> Result<Vec<Regex>, SinkError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                SinkError::Config(format!("invalid focus_teams pattern {pattern:?}: {e}"))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// Raw-mode alternate screen, restored on drop.
struct Screen {
    active: bool,
}

impl Screen {
    fn enter() -> Result<Self, SinkError> {
        terminal::enable_raw_mode()?;
        let mut screen = Self { active: true };
        if let Err(e) = execute!(std::io::stdout(), EnterAlternateScreen, cursor::Hide) {
            screen.restore();
            return Err(e.into());
        }
        Ok(screen)
    }

    fn restore(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Err(e) = execute!(std::io::stdout(), cursor::Show, LeaveAlternateScreen) {
            debug!(error = %e, "Failed to leave alternate screen");
        }
        if let Err(e) = terminal::disable_raw_mode() {
            debug!(error = %e, "Failed to disable raw mode");
        }
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Replace the screen contents with `frame`.
fn draw(frame: &str) -> Result<(), SinkError> {
    let mut stdout = std::io::stdout().lock();
    queue!(
        stdout,
        terminal::Clear(ClearType::All),
        cursor::MoveTo(0, 0)
    )?;
    for line in frame.lines() {
        queue!(stdout, Print(line), Print("\r\n"))?;
    }
    stdout.flush()?;
    Ok(())
}

/// Drain pending key presses; `true` if one of them asks to quit.
fn quit_requested() -> Result<bool, SinkError> {
    while event::poll(Duration::ZERO)? {
        if let event::Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let ctrl_c =
                key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
            if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Live ranking table.
#[derive(Debug)]
pub struct BoardSink {
    max_length: usize,
    focus: Vec<Regex>,
    refresh: Duration,
}

impl BoardSink {
    /// Create a board from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Config`] for an invalid focus pattern.
    pub fn new(config: &BoardConfig) -> Result<Self, SinkError> {
        Ok(Self {
            max_length: config.max_length,
            focus: compile_focus(&config.focus_teams)?,
            refresh: Duration::from_millis(config.refresh_ms),
        })
    }

    /// Header plus table for the current state.
    pub fn render(&self, state: &BoardState, clock: &str) -> String {
        let rows = crop(state.ranking(), self.max_length, &self.focus);
        format!(
            "ctfront  {teams} teams  {clock}\n\n{table}",
            teams = state.len(),
            table = format_table(&rows),
        )
    }

    fn frame(&self, state: &BoardState) -> String {
        let clock = chrono::Local::now().format("%H:%M:%S").to_string();
        self.render(state, &clock)
    }
}

impl Sink for BoardSink {
    type Error = SinkError;

    fn name(&self) -> &str {
        "board"
    }

    fn is_modal(&self) -> bool {
        true
    }

    async fn run(self, mut mailbox: Mailbox, stop: StopSignal) -> Result<(), SinkError> {
        let mut screen = Screen::enter()?;
        let mut state = BoardState::new();
        let mut dirty = true;
        let mut last_draw = Instant::now();

        info!(
            max_length = self.max_length,
            focus = self.focus.len(),
            "Board started"
        );

        loop {
            if dirty || last_draw.elapsed() >= self.refresh {
                draw(&self.frame(&state))?;
                dirty = false;
                last_draw = Instant::now();
            }

            match mailbox.next(&stop, INPUT_POLL).await {
                Delivery::Event(event) => dirty |= state.apply(&event),
                Delivery::Idle => {}
                Delivery::Closed => {
                    // Source is gone; keep the last table up until quit.
                    if stop.sleep(INPUT_POLL).await {
                        break;
                    }
                }
                Delivery::Stopped => break,
            }

            if quit_requested()? {
                info!("Board closed by user");
                break;
            }
        }

        screen.restore();
        info!(teams = state.len(), "Board stopped");
        Ok(())
    }
}
