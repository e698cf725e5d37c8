//! Ordered registry of Source backends and URL autodetection.
//!
//! Each [`Registration`] pairs a detector, which looks at the [`Landing`]
//! fetched from the configured URL, with a factory that builds the backend
//! from the Source configuration. Detection runs in registry order and the
//! first match wins, so more specific platforms must come first.

use ctfront_core::config::SourceConfig;
use tracing::{debug, info};

use crate::angstrom::{self, AngstromSource};
use crate::ctfd::{self, CtfdSource};
use crate::demo::DemoSource;
use crate::error::SourceError;
use crate::rctf::{self, RctfSource};
use crate::replay::ReplaySource;
use crate::SourceBackend;

/// Backend name that asks for autodetection.
pub const AUTO: &str = "auto";

/// What a detector gets to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    /// The URL as configured.
    pub url: String,
    /// Body of the page served at that URL.
    pub page: String,
}

/// One selectable Source backend.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// Name used in configuration.
    pub name: &'static str,
    /// Whether the landing page is served by this platform.
    pub detect: fn(&Landing) -> bool,
    /// Build the backend.
    pub build: fn(&SourceConfig) -> Result<SourceBackend, SourceError>,
}

/// Every known backend, in detection order.
pub const REGISTRY: &[Registration] = &[
    Registration {
        name: "ctfd",
        detect: detect_ctfd,
        build: build_ctfd,
    },
    Registration {
        name: "rctf",
        detect: detect_rctf,
        build: build_rctf,
    },
    Registration {
        name: "angstrom",
        detect: detect_angstrom,
        build: build_angstrom,
    },
    Registration {
        name: "demo",
        detect: never,
        build: build_demo,
    },
    Registration {
        name: "replay",
        detect: never,
        build: build_replay,
    },
];

fn detect_ctfd(landing: &Landing) -> bool {
    ctfd::detect(&landing.page)
}

fn detect_rctf(landing: &Landing) -> bool {
    rctf::detect(&landing.page)
}

fn detect_angstrom(landing: &Landing) -> bool {
    angstrom::detect(&landing.url)
}

/// For backends that must be asked for by name.
const fn never(_landing: &Landing) -> bool {
    false
}

fn build_ctfd(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    CtfdSource::new(config).map(SourceBackend::Ctfd)
}

fn build_rctf(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    RctfSource::new(config).map(SourceBackend::Rctf)
}

fn build_angstrom(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    AngstromSource::new(config).map(SourceBackend::Angstrom)
}

// Signature is fixed by `Registration::build`.
#[allow(clippy::unnecessary_wraps)]
fn build_demo(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    Ok(SourceBackend::Demo(DemoSource::new(config)))
}

fn build_replay(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    ReplaySource::new(config).map(SourceBackend::Replay)
}

/// Names accepted for `source.backend`.
pub fn backend_names() -> impl Iterator<Item = &'static str> {
    std::iter::once(AUTO).chain(REGISTRY.iter().map(|r| r.name))
}

/// Look up a backend by configured name.
pub fn find(name: &str) -> Option<&'static Registration> {
    REGISTRY.iter().find(|r| r.name == name)
}

/// The first backend whose detector accepts `landing`.
pub fn detect(landing: &Landing) -> Option<&'static Registration> {
    REGISTRY.iter().find(|r| {
        let hit = (r.detect)(landing);
        debug!(backend = r.name, hit, "Checked backend");
        hit
    })
}

/// Build the Source named by `config.backend`, autodetecting on `auto`.
///
/// # Errors
///
/// Returns [`SourceError::Config`] for an unknown backend name, a missing
/// URL under `auto`, or when autodetection finds nothing. Errors from the
/// landing page fetch and from the chosen factory are passed through.
pub async fn select_source(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    if config.backend == AUTO {
        return autodetect(config).await;
    }
    let Some(registration) = find(&config.backend) else {
        let known: Vec<&str> = backend_names().collect();
        return Err(SourceError::Config(format!(
            "unknown source backend {:?}, expected one of: {}",
            config.backend,
            known.join(", ")
        )));
    };
    (registration.build)(config)
}

async fn autodetect(config: &SourceConfig) -> Result<SourceBackend, SourceError> {
    let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        return Err(SourceError::Config(
            "backend autodetection requires a url".to_owned(),
        ));
    };

    let page = reqwest::get(url).await?.text().await?;
    let landing = Landing {
        url: url.to_owned(),
        page,
    };

    let Some(registration) = detect(&landing) else {
        return Err(SourceError::Config(format!(
            "autodetection found no suitable backend for {url}"
        )));
    };
    info!(backend = registration.name, %url, "Autodetected source backend");
    (registration.build)(config)
}
