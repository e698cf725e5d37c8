//! Scoreboard Sources for ctfront.
//!
//! Every backend implements [`Source`] and is collected behind the
//! [`SourceBackend`] enum, so the orchestrator runs one concrete type no
//! matter which platform was configured.
//!
//! # Modules
//!
//! - [`angstrom`] -- ångstromCTF API polling.
//! - [`ctfd`] -- CTFd REST API polling.
//! - [`demo`] -- Attractor mode with invented teams and challenges.
//! - [`error`] -- [`SourceError`].
//! - [`poll`] -- Helpers shared by the polling backends.
//! - [`rctf`] -- rCTF API polling.
//! - [`registry`] -- Ordered backend registry and URL autodetection.
//! - [`replay`] -- Playback of recorded snapshots.
//!
//! [`Source`]: ctfront_core::unit::Source
//! [`SourceError`]: error::SourceError

use ctfront_core::feed::SnapshotFeed;
use ctfront_core::stop::StopSignal;
use ctfront_core::unit::Source;

pub mod angstrom;
pub mod ctfd;
pub mod demo;
pub mod error;
pub mod poll;
pub mod rctf;
pub mod registry;
pub mod replay;

use crate::angstrom::AngstromSource;
use crate::ctfd::CtfdSource;
use crate::demo::DemoSource;
use crate::error::SourceError;
use crate::rctf::RctfSource;
use crate::replay::ReplaySource;

pub use crate::registry::select_source;

// ---------------------------------------------------------------------------
// Unified source enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// Any configured Source.
#[derive(Debug)]
pub enum SourceBackend {
    /// Invented data for attractor mode.
    Demo(DemoSource),
    /// A CTFd instance.
    Ctfd(CtfdSource),
    /// An rCTF instance.
    Rctf(RctfSource),
    /// An ångstromCTF edition.
    Angstrom(AngstromSource),
    /// A recorded session.
    Replay(ReplaySource),
}

impl Source for SourceBackend {
    type Error = SourceError;

    fn name(&self) -> &str {
        match self {
            Self::Demo(source) => source.name(),
            Self::Ctfd(source) => source.name(),
            Self::Rctf(source) => source.name(),
            Self::Angstrom(source) => source.name(),
            Self::Replay(source) => source.name(),
        }
    }

    async fn run(self, feed: SnapshotFeed, stop: StopSignal) -> Result<(), SourceError> {
        match self {
            Self::Demo(source) => source.run(feed, stop).await,
            Self::Ctfd(source) => source.run(feed, stop).await,
            Self::Rctf(source) => source.run(feed, stop).await,
            Self::Angstrom(source) => source.run(feed, stop).await,
            Self::Replay(source) => source.run(feed, stop).await,
        }
    }
}
