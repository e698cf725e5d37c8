//! Entry point for ctfront.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `CTFRONT_CONFIG` or `ctfront.yaml`
//! 2. Initialize structured logging (tracing) on stderr
//! 3. Select the Source, autodetecting when asked to
//! 4. Build the configured Sinks
//! 5. Hand everything to the orchestrator and stop it on Ctrl-C
//! 6. Log the run report

mod error;

use std::path::PathBuf;

use ctfront_core::config::{CONFIG_PATH_ENV, CtfrontConfig, DEFAULT_CONFIG_PATH};
use ctfront_core::orchestrator::Orchestrator;
use ctfront_core::unit::{Sink, Source};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if startup fails or any unit ends with an error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so report later.
    let (config, loaded_from) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("ctfront starting");
    match &loaded_from {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        backend = %config.source.backend,
        url = config.source.url.as_deref().unwrap_or("-"),
        sinks = config.sinks.len(),
        "Configuration resolved"
    );

    // 3. Select the Source.
    let source = ctfront_sources::select_source(&config.source)
        .await
        .map_err(AppError::from)?;
    info!(source = source.name(), "Source ready");

    // 4. Build the Sinks.
    let sinks = ctfront_sinks::create_sinks(&config.sinks).map_err(AppError::from)?;
    for sink in &sinks {
        info!(sink = sink.name(), modal = sink.is_modal(), "Sink ready");
    }

    // 5. Run until the modal Sink quits, the Source ends, or Ctrl-C.
    let orchestrator = Orchestrator::new(source, sinks).map_err(AppError::from)?;
    let stop = orchestrator.stop_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                stop.request_stop();
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });
    let report = orchestrator.run().await;

    // 6. Report.
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => info!(unit = %outcome.name, role = ?outcome.role, "Unit finished"),
            Err(reason) => error!(
                unit = %outcome.name,
                role = ?outcome.role,
                %reason,
                "Unit failed"
            ),
        }
    }
    let failed = report.failures().count();
    if failed > 0 {
        return Err(AppError::RunFailed { failed }.into());
    }
    info!("ctfront stopped");
    Ok(())
}

/// Load configuration from the file named by `CTFRONT_CONFIG`, falling back
/// to `ctfront.yaml`.
///
/// A missing file yields the defaults (with environment overrides still
/// applied); the path actually read is returned alongside.
fn load_config() -> Result<(CtfrontConfig, Option<PathBuf>), AppError> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = CtfrontConfig::from_file(&config_path)?;
        Ok((config, Some(config_path)))
    } else {
        let mut config = CtfrontConfig::default();
        config.source.apply_env_overrides();
        Ok((config, None))
    }
}
