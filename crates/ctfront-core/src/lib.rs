//! Entity store, diff engine, event dispatch, and orchestration for ctfront.
//!
//! A Source submits scoreboard and challenge snapshots through a
//! [`SnapshotFeed`]. The [`DiffEngine`] folds each snapshot into the
//! [`EntityStore`] and derives the events that explain the change; the
//! [`Dispatcher`] hands every Sink its own ordered copy. The
//! [`Orchestrator`] runs one Source and its Sinks until stopped.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `ctfront.yaml` into
//!   strongly-typed structs.
//! - [`diff`] -- Snapshot diffing and the one-time boot event.
//! - [`dispatch`] -- Fan-out to per-Sink mailboxes.
//! - [`feed`] -- The Source-facing submission handle and raw snapshot decoding.
//! - [`orchestrator`] -- Unit lifecycle, modal Sink arbitration, run reports.
//! - [`stop`] -- Cooperative stop signal.
//! - [`store`] -- Canonical team and challenge records.
//! - [`unit`] -- [`Source`] and [`Sink`] traits.
//!
//! [`SnapshotFeed`]: feed::SnapshotFeed
//! [`DiffEngine`]: diff::DiffEngine
//! [`EntityStore`]: store::EntityStore
//! [`Dispatcher`]: dispatch::Dispatcher
//! [`Orchestrator`]: orchestrator::Orchestrator
//! [`Source`]: unit::Source
//! [`Sink`]: unit::Sink

pub mod config;
pub mod diff;
pub mod dispatch;
pub mod feed;
pub mod orchestrator;
pub mod stop;
pub mod store;
pub mod unit;
