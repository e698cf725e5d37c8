//! Event fan-out to Sink mailboxes.
//!
//! The [`Dispatcher`] owns one unbounded sender per registered Sink and hands
//! each of them its own clone of every event, in registration order. It never
//! waits on a Sink: a slow Sink only grows its own mailbox.
//!
//! A Sink drains its [`Mailbox`] with [`Mailbox::next`], which waits on the
//! next event, the stop signal, and an idle timeout in a single select.

use std::time::Duration;

use ctfront_types::Event;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::stop::StopSignal;

/// Sending half of one Sink's mailbox.
#[derive(Debug)]
struct Outlet {
    /// Sink name, for logging.
    name: String,
    tx: mpsc::UnboundedSender<Event>,
    /// Set once the receiving Sink has gone away.
    closed: bool,
}

/// Fans events out to every registered Sink.
#[derive(Debug, Default)]
pub struct Dispatcher {
    outlets: Vec<Outlet>,
    booted: bool,
}

impl Dispatcher {
    /// Create a dispatcher with no Sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Sink and return the mailbox it should drain.
    pub fn register(&mut self, name: impl Into<String>) -> Mailbox {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.outlets.push(Outlet {
            name: name.clone(),
            tx,
            closed: false,
        });
        Mailbox { name, rx }
    }

    /// Number of registered Sinks, open or closed.
    pub fn sink_count(&self) -> usize {
        self.outlets.len()
    }

    /// Whether a boot event has passed through.
    pub const fn is_booted(&self) -> bool {
        self.booted
    }

    /// Deliver a copy of `event` to every open mailbox.
    ///
    /// Before the boot event has been published, anything else is dropped.
    /// Returns the number of mailboxes that accepted the event.
    pub fn publish(&mut self, event: &Event) -> usize {
        if !self.booted {
            if !event.is_boot() {
                debug!(kind = %event.kind(), "Dropping event published before boot");
                return 0;
            }
            self.booted = true;
        }

        let mut delivered: usize = 0;
        for outlet in self.outlets.iter_mut().filter(|o| !o.closed) {
            if outlet.tx.send(event.clone()).is_ok() {
                delivered = delivered.saturating_add(1);
            } else {
                warn!(sink = %outlet.name, "Sink mailbox closed, no further events will be delivered");
                outlet.closed = true;
            }
        }
        delivered
    }
}

/// What a Sink got back from waiting on its mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The next event, in production order.
    Event(Event),
    /// Nothing arrived within the idle timeout.
    Idle,
    /// The stop signal was raised and the mailbox is empty.
    Stopped,
    /// The dispatcher is gone and the mailbox is empty.
    Closed,
}

/// Receiving half of one Sink's event stream.
#[derive(Debug)]
pub struct Mailbox {
    name: String,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Mailbox {
    /// Name the Sink registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next event, a stop request, or the idle timeout.
    ///
    /// Pending events are handed out before a stop is reported, so a Sink
    /// that stops on [`Delivery::Stopped`] has seen everything published
    /// up to that point.
    pub async fn next(&mut self, stop: &StopSignal, idle: Duration) -> Delivery {
        tokio::select! {
            biased;
            event = self.rx.recv() => event.map_or(Delivery::Closed, Delivery::Event),
            () = stop.stopped() => Delivery::Stopped,
            () = tokio::time::sleep(idle) => Delivery::Idle,
        }
    }

    /// Take the next event if one is already waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every event already waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
mod tests {
    use ctfront_types::{BootState, PlaceChange, TeamId};

    use super::*;

    fn boot() -> Event {
        Event::Boot(BootState {
            teams: Vec::new(),
            challenges: None,
        })
    }

    fn place(team: &str) -> Event {
        Event::Place(PlaceChange {
            team_id: TeamId::from(team),
            old_place: 2,
            place: 1,
        })
    }

    #[test]
    fn events_before_boot_are_dropped() {
        let mut dispatcher = Dispatcher::new();
        let mut mailbox = dispatcher.register("a");

        assert_eq!(dispatcher.publish(&place("T1")), 0);
        assert!(mailbox.try_next().is_none());

        assert_eq!(dispatcher.publish(&boot()), 1);
        assert!(dispatcher.is_booted());
        assert_eq!(dispatcher.publish(&place("T1")), 1);
        assert_eq!(mailbox.drain(), vec![boot(), place("T1")]);
    }

    #[test]
    fn every_sink_gets_its_own_ordered_copy() {
        let mut dispatcher = Dispatcher::new();
        let mut first = dispatcher.register("first");
        let mut second = dispatcher.register("second");

        dispatcher.publish(&boot());
        dispatcher.publish(&place("T1"));
        dispatcher.publish(&place("T2"));

        let expected = vec![boot(), place("T1"), place("T2")];
        assert_eq!(first.drain(), expected);
        assert_eq!(second.drain(), expected);
        assert_eq!(first.name(), "first");
    }

    #[test]
    fn closed_mailboxes_are_skipped() {
        let mut dispatcher = Dispatcher::new();
        let gone = dispatcher.register("gone");
        let mut kept = dispatcher.register("kept");
        drop(gone);

        assert_eq!(dispatcher.publish(&boot()), 1);
        assert_eq!(dispatcher.publish(&place("T1")), 1);
        assert_eq!(kept.drain().len(), 2);
        assert_eq!(dispatcher.sink_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn next_reports_idle_then_stop() {
        let mut dispatcher = Dispatcher::new();
        let mut mailbox = dispatcher.register("sink");
        let stop = StopSignal::new();

        let idle = mailbox.next(&stop, Duration::from_millis(10)).await;
        assert_eq!(idle, Delivery::Idle);

        dispatcher.publish(&boot());
        stop.request_stop();
        let pending = mailbox.next(&stop, Duration::from_millis(10)).await;
        assert_eq!(pending, Delivery::Event(boot()));
        let stopped = mailbox.next(&stop, Duration::from_millis(10)).await;
        assert_eq!(stopped, Delivery::Stopped);
    }

    #[tokio::test]
    async fn next_reports_closed_when_dispatcher_is_dropped() {
        let mut dispatcher = Dispatcher::new();
        let mut mailbox = dispatcher.register("sink");
        drop(dispatcher);

        let stop = StopSignal::new();
        let delivery = mailbox.next(&stop, Duration::from_secs(5)).await;
        assert_eq!(delivery, Delivery::Closed);
    }
}
