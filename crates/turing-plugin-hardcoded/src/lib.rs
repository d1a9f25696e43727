//! Example experiment engine serving a hard-coded catalogue.
//!
//! The engine's configuration block lists the clients, experiments, and
//! variables it knows about. Its manager answers the standard listings from
//! that catalogue and turns a stored Turing experiment configuration into a
//! [`RunnerConfig`]; its runner hashes the request's unit variable onto an
//! experiment variant.
//!
//! The engine can be compiled into a host through [`register`] or run as a
//! plugin process through the `turing-plugin-hardcoded` binary, which calls
//! [`run`].

mod manager;
mod runner;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;
use tracing::info;
use turing_config::Config;
use turing_experiment::{
    ExperimentError, ExperimentManager, ExperimentRunner, ManagerRegistry, RunnerRegistry,
};
use turing_plugins::telemetry::{self, TelemetryError};
use turing_plugins::{HandshakeConfig, PluginServices, ServeError};

pub use self::manager::{Catalogue, HardcodedManager, engine_info};
pub use self::runner::{Assignment, HardcodedRunner, RunnerConfig, assign};

/// Name the engine registers under.
pub const ENGINE_NAME: &str = "hardcoded";

/// Name shown to users.
pub const ENGINE_DISPLAY_NAME: &str = "Hardcoded Experiments";

const PLUGIN_TARGET: &str = "turing_plugin_hardcoded";

/// Registers the engine with in-process registries.
///
/// # Errors
///
/// Returns [`ExperimentError::DuplicateRegistration`] when either registry
/// already holds an engine named [`ENGINE_NAME`].
pub fn register(
    managers: &ManagerRegistry,
    runners: &RunnerRegistry,
) -> Result<(), ExperimentError> {
    managers.register(ENGINE_NAME, |config| {
        let manager: Arc<dyn ExperimentManager> =
            Arc::new(HardcodedManager::from_config(config)?);
        Ok(manager)
    })?;
    runners.register(ENGINE_NAME, |config| {
        let runner: Arc<dyn ExperimentRunner> =
            Arc::new(HardcodedRunner::from_config(config)?);
        Ok(runner)
    })
}

/// Services offered by the plugin binary.
#[must_use]
pub fn services() -> PluginServices {
    PluginServices::new()
        .with_manager(HardcodedManager::default())
        .with_runner(HardcodedRunner::default())
}

/// Errors that stop the plugin binary.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The protocol loop failed.
    #[error("plugin protocol failed: {source}")]
    Serve {
        /// Underlying protocol error.
        #[source]
        source: ServeError,
    },
}

/// Initialises telemetry and serves the engine over stdin/stdout until the
/// host closes the connection.
///
/// # Errors
///
/// Returns [`RunError`] when telemetry cannot be installed or the protocol
/// loop fails.
pub fn run(config: &Config) -> Result<(), RunError> {
    telemetry::initialise(config).map_err(|source| RunError::Telemetry { source })?;
    info!(target: PLUGIN_TARGET, engine = ENGINE_NAME, "serving experiment engine");
    turing_plugins::serve(services(), &HandshakeConfig::default())
        .map_err(|source| RunError::Serve { source })?;
    info!(target: PLUGIN_TARGET, engine = ENGINE_NAME, "host disconnected");
    Ok(())
}
