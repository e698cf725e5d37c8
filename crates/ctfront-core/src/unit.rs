//! Contracts for the two kinds of execution unit the orchestrator runs.
//!
//! A [`Source`] turns a remote scoreboard into snapshots and pushes them into
//! a [`SnapshotFeed`]. A [`Sink`] drains a [`Mailbox`] and renders what it
//! receives. Both are consumed by `run`, which returns once the shared
//! [`StopSignal`] is observed (or the unit decides it is done).
//!
//! The orchestrator is generic over these traits rather than boxing them:
//! `run` is async, and concrete implementations are expected to be collected
//! behind an enum when more than one is available.

use std::future::Future;

use crate::dispatch::Mailbox;
use crate::feed::SnapshotFeed;
use crate::stop::StopSignal;

/// A producer of snapshots for one scoring platform.
pub trait Source: Send + 'static {
    /// Error returned when the Source gives up.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Poll the platform and submit snapshots until stopped.
    ///
    /// Snapshots must be submitted one at a time, each processed to
    /// completion before the next poll.
    fn run(
        self,
        feed: SnapshotFeed,
        stop: StopSignal,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A consumer of the ordered event stream.
pub trait Sink: Send + 'static {
    /// Error returned when the Sink gives up.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Human-readable name for logging and mailbox registration.
    fn name(&self) -> &str;

    /// Whether this Sink must own the orchestrator's own task (for example
    /// because it drives the terminal directly).
    fn is_modal(&self) -> bool;

    /// Drain the mailbox until stopped.
    fn run(
        self,
        mailbox: Mailbox,
        stop: StopSignal,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
