//! Background Sink that prints one line per event.
//!
//! Each line is `"<kind>:  <payload as JSON>"`, cut to [`LINE_WIDTH`]
//! characters. JSON string escaping keeps hostile team names from reaching
//! the terminal raw.

use std::io::Write;
use std::time::Duration;

use ctfront_core::dispatch::{Delivery, Mailbox};
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Sink;
use ctfront_types::Event;
use tracing::{debug, info};

use crate::error::SinkError;

/// Maximum characters per printed line.
pub const LINE_WIDTH: usize = 80;

const IDLE: Duration = Duration::from_secs(1);

/// Format one event as a log line.
pub fn format_event(event: &Event) -> String {
    let payload = serde_json::to_value(event)
        .ok()
        .and_then(|mut value| value.get_mut("payload").map(serde_json::Value::take))
        .unwrap_or_default();
    format!("{}:  {payload}", event.kind())
        .chars()
        .take(LINE_WIDTH)
        .collect()
}

/// Prints every event to stdout.
#[derive(Debug, Default)]
pub struct DebugSink;

impl DebugSink {
    /// Create a debug Sink.
    pub const fn new() -> Self {
        Self
    }
}

impl Sink for DebugSink {
    type Error = SinkError;

    fn name(&self) -> &str {
        "debug"
    }

    fn is_modal(&self) -> bool {
        false
    }

    async fn run(self, mut mailbox: Mailbox, stop: StopSignal) -> Result<(), SinkError> {
        let mut printed: u64 = 0;
        loop {
            match mailbox.next(&stop, IDLE).await {
                Delivery::Event(event) => {
                    let line = format_event(&event);
                    writeln!(std::io::stdout().lock(), "{line}")?;
                    printed = printed.saturating_add(1);
                }
                Delivery::Idle => {}
                Delivery::Closed => {
                    debug!(sink = mailbox.name(), "Event stream ended");
                    stop.stopped().await;
                    break;
                }
                Delivery::Stopped => break,
            }
        }
        info!(sink = mailbox.name(), printed, "Debug sink stopped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ctfront_types::{ChallengeId, PlaceChange, Solve, TeamId};

    use super::*;

    #[test]
    fn formats_kind_and_payload() {
        let event = Event::Place(PlaceChange {
            team_id: TeamId::from("7"),
            old_place: 3,
            place: 1,
        });
        assert_eq!(
            format_event(&event),
            r#"place:  {"old_place":3,"place":1,"team_id":"7"}"#
        );
    }

    #[test]
    fn long_lines_are_cut() {
        let event = Event::Solve(Solve {
            team_id: TeamId::from("a".repeat(200)),
            challenge_id: ChallengeId::from("1"),
            first: true,
        });
        let line = format_event(&event);
        assert_eq!(line.chars().count(), LINE_WIDTH);
        assert!(line.starts_with("solve:  {"));
    }

    #[test]
    fn debug_sink_is_background() {
        let sink = DebugSink::new();
        assert!(!sink.is_modal());
        assert_eq!(sink.name(), "debug");
    }
}
