//! Lifecycle management for one Source and its Sinks.
//!
//! The [`Orchestrator`] validates the Sink set, registers one mailbox per Sink
//! in configuration order, and then runs:
//!
//! - every background Sink in its own task,
//! - the Source in its own task, owning the [`SnapshotFeed`],
//! - the modal Sink, if any, directly on the caller's task.
//!
//! With a modal Sink the run lasts as long as that Sink does. Without one it
//! lasts until the Source returns or the stop signal is raised. Either way
//! the orchestrator then raises the stop signal, waits for every unit, and
//! returns a [`RunReport`].

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::feed::SnapshotFeed;
use crate::stop::StopSignal;
use crate::unit::{Sink, Source};

/// Errors that prevent the orchestrator from starting.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// More than one Sink asked for the modal execution context.
    #[error("at most one modal sink may be configured, found {}: {}", names.len(), names.join(", "))]
    MultipleModalSinks {
        /// Names of the conflicting Sinks.
        names: Vec<String>,
    },

    /// No Sinks were configured.
    #[error("at least one sink must be configured")]
    NoSinks,
}

/// The part an execution unit played in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRole {
    /// The snapshot producer.
    Source,
    /// The Sink that ran on the orchestrator's own task.
    ModalSink,
    /// A Sink that ran in its own task.
    BackgroundSink,
}

/// How one execution unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    /// Unit name.
    pub name: String,
    /// Unit role.
    pub role: UnitRole,
    /// `Err` carries the unit's error or the task failure, rendered.
    pub result: Result<(), String>,
}

impl UnitOutcome {
    fn from_join(name: String, role: UnitRole, joined: Result<Result<(), String>, JoinError>) -> Self {
        let result = joined.unwrap_or_else(|e| Err(format!("task failed: {e}")));
        Self { name, role, result }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Source first, then Sinks in configuration order.
    pub outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    /// Whether every unit ended without error.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Units that ended with an error.
    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Runs one Source and one or more Sinks.
#[derive(Debug)]
pub struct Orchestrator<S, K> {
    source: S,
    sinks: Vec<K>,
    stop: StopSignal,
}

impl<S: Source, K: Sink> Orchestrator<S, K> {
    /// Validate the Sink set and prepare a run.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoSinks`] for an empty Sink list and
    /// [`OrchestratorError::MultipleModalSinks`] when more than one Sink is
    /// modal.
    pub fn new(source: S, sinks: Vec<K>) -> Result<Self, OrchestratorError> {
        if sinks.is_empty() {
            return Err(OrchestratorError::NoSinks);
        }
        let modal: Vec<String> = sinks
            .iter()
            .filter(|sink| sink.is_modal())
            .map(|sink| sink.name().to_owned())
            .collect();
        if modal.len() > 1 {
            return Err(OrchestratorError::MultipleModalSinks { names: modal });
        }
        Ok(Self {
            source,
            sinks,
            stop: StopSignal::new(),
        })
    }

    /// Handle for stopping the run from outside (e.g. on Ctrl-C).
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run every unit to completion.
    pub async fn run(self) -> RunReport {
        let Self {
            source,
            sinks,
            stop,
        } = self;

        let mut dispatcher = Dispatcher::new();
        let mut modal = None;
        // Sink outcomes are reported in configuration order; `None` marks the
        // modal slot until that Sink returns.
        let mut sink_handles: Vec<Option<(String, JoinHandle<Result<(), String>>)>> = Vec::new();

        for sink in sinks {
            let mailbox = dispatcher.register(sink.name());
            if sink.is_modal() {
                modal = Some((sink, mailbox));
                sink_handles.push(None);
                continue;
            }
            let name = sink.name().to_owned();
            info!(sink = %name, "Starting background sink");
            let sink_stop = stop.clone();
            let handle = tokio::spawn(async move {
                sink.run(mailbox, sink_stop).await.map_err(|e| e.to_string())
            });
            sink_handles.push(Some((name, handle)));
        }

        let source_name = source.name().to_owned();
        info!(source = %source_name, sinks = dispatcher.sink_count(), "Starting source");
        let feed = SnapshotFeed::new(dispatcher);
        let source_stop = stop.clone();
        let mut source_handle = tokio::spawn(async move {
            source.run(feed, source_stop).await.map_err(|e| e.to_string())
        });

        let mut source_joined = None;
        let mut modal_outcome = None;

        if let Some((sink, mailbox)) = modal {
            let name = sink.name().to_owned();
            info!(sink = %name, "Running modal sink on the orchestrator task");
            let result = sink.run(mailbox, stop.clone()).await.map_err(|e| e.to_string());
            modal_outcome = Some(UnitOutcome {
                name,
                role: UnitRole::ModalSink,
                result,
            });
        } else {
            tokio::select! {
                joined = &mut source_handle => source_joined = Some(joined),
                () = stop.stopped() => {}
            }
        }

        info!("Stopping all units");
        stop.request_stop();

        let source_joined = match source_joined {
            Some(joined) => joined,
            None => source_handle.await,
        };
        let mut outcomes = vec![UnitOutcome::from_join(
            source_name,
            UnitRole::Source,
            source_joined,
        )];

        for slot in sink_handles {
            match slot {
                Some((name, handle)) => {
                    outcomes.push(UnitOutcome::from_join(
                        name,
                        UnitRole::BackgroundSink,
                        handle.await,
                    ));
                }
                None => outcomes.extend(modal_outcome.take()),
            }
        }

        for failure in outcomes.iter().filter(|o| o.result.is_err()) {
            if let Err(reason) = &failure.result {
                error!(unit = %failure.name, role = ?failure.role, %reason, "Unit failed");
            }
        }
        let report = RunReport { outcomes };
        if report.is_clean() {
            info!(units = report.outcomes.len(), "All units stopped cleanly");
        } else {
            warn!(
                failed = report.failures().count(),
                "Run finished with failed units"
            );
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dispatch::{Delivery, Mailbox};

    #[derive(Debug, thiserror::Error)]
    #[error("test unit failed")]
    struct TestError;

    #[derive(Debug)]
    struct IdleSource;

    impl Source for IdleSource {
        type Error = TestError;

        fn name(&self) -> &str {
            "idle"
        }

        async fn run(self, _feed: SnapshotFeed, stop: StopSignal) -> Result<(), TestError> {
            stop.stopped().await;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct QuitSink {
        name: &'static str,
        modal: bool,
    }

    impl Sink for QuitSink {
        type Error = TestError;

        fn name(&self) -> &str {
            self.name
        }

        fn is_modal(&self) -> bool {
            self.modal
        }

        async fn run(self, mut mailbox: Mailbox, stop: StopSignal) -> Result<(), TestError> {
            if self.modal {
                // Pretend the user quit right away.
                return Ok(());
            }
            loop {
                match mailbox.next(&stop, Duration::from_millis(5)).await {
                    Delivery::Stopped | Delivery::Closed => return Err(TestError),
                    Delivery::Event(_) | Delivery::Idle => {}
                }
            }
        }
    }

    fn sink(name: &'static str, modal: bool) -> QuitSink {
        QuitSink { name, modal }
    }

    #[test]
    fn rejects_two_modal_sinks() {
        let err = Orchestrator::new(IdleSource, vec![sink("a", true), sink("b", true)]).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::MultipleModalSinks { ref names } if names == &["a", "b"]
        ));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn rejects_an_empty_sink_list() {
        let err = Orchestrator::<IdleSource, QuitSink>::new(IdleSource, Vec::new()).unwrap_err();
        assert!(matches!(err, OrchestratorError::NoSinks));
    }

    #[tokio::test]
    async fn modal_sink_return_stops_everything() {
        let orchestrator =
            Orchestrator::new(IdleSource, vec![sink("bg", false), sink("modal", true)]).unwrap();
        let report = orchestrator.run().await;

        let names: Vec<(&str, UnitRole)> = report
            .outcomes
            .iter()
            .map(|o| (o.name.as_str(), o.role))
            .collect();
        assert_eq!(
            names,
            [
                ("idle", UnitRole::Source),
                ("bg", UnitRole::BackgroundSink),
                ("modal", UnitRole::ModalSink),
            ]
        );
        // The background sink reports its shutdown as a failure.
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn external_stop_ends_a_run_without_modal_sink() {
        let orchestrator = Orchestrator::new(IdleSource, vec![sink("bg", false)]).unwrap();
        let stop = orchestrator.stop_signal();
        let run = tokio::spawn(orchestrator.run());
        tokio::task::yield_now().await;
        stop.request_stop();

        let report = run.await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.first().is_some_and(|o| o.result.is_ok()));
    }
}
