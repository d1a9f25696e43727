//! Engine factories: one entry point for compiled-in and plugin engines.
//!
//! [`EngineFactories::factory`] decodes an engine's configuration block and
//! returns an [`EngineFactory`] that hands out the engine's manager and
//! runner:
//!
//! - without a plugin binary, managers and runners come from the in-process
//!   registries, constructed from the pass-through configuration;
//! - with a plugin binary, the factory is memoised under
//!   `<name>-<sha256 of the decoded config>`, so identical configurations
//!   share one plugin process. A dead plugin is evicted and relaunched on
//!   the next lookup. The manager and runner are dispensed and
//!   configured once, on first use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};
use turing_experiment::{
    EngineConfig, ExperimentError, ExperimentManager, ExperimentRunner, ManagerRegistry,
    RunnerRegistry,
};

use crate::client::{Dispensed, ManagerProxy, PluginClient, RunnerProxy};
use crate::error::PluginError;
use crate::protocol::ServiceId;
use crate::settings::PluginSettings;

const FACTORY_TARGET: &str = "turing_plugins::factory";

/// Failures while building an engine or obtaining its services.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The configuration block could not be decoded.
    #[error("invalid configuration for engine \"{name}\": {source}")]
    Decode {
        /// Engine name.
        name: String,
        /// Decoder error.
        #[source]
        source: ExperimentError,
    },

    /// The decoded configuration could not be hashed.
    #[error("failed to hash configuration for engine \"{name}\": {source}")]
    Hash {
        /// Engine name.
        name: String,
        /// Encoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The plugin binary could not be launched or failed its handshake.
    #[error("failed to connect to plugin binary '{binary}': {source}")]
    Connect {
        /// Plugin binary path.
        binary: String,
        /// Transport error.
        #[source]
        source: PluginError,
    },

    /// The plugin refused to dispense a service.
    #[error("failed to dispense \"{service}\" plugin service: {source}")]
    Dispense {
        /// Service id.
        service: ServiceId,
        /// Transport error.
        #[source]
        source: PluginError,
    },

    /// The dispensed service is not the expected capability.
    #[error("dispensed \"{service}\" service does not implement {expected}")]
    InterfaceMismatch {
        /// Service id.
        service: ServiceId,
        /// Required interface.
        expected: &'static str,
    },

    /// The plugin rejected its configuration.
    #[error("failed to configure \"{service}\" plugin instance: {source}")]
    Configure {
        /// Service id.
        service: ServiceId,
        /// Transport or remote error.
        #[source]
        source: PluginError,
    },

    /// A compiled-in engine could not be constructed.
    #[error(transparent)]
    Registry(#[from] ExperimentError),
}

/// Opens plugin connections.
#[cfg_attr(test, mockall::automock)]
pub trait PluginConnector: Send + Sync {
    /// Launches `binary` and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns the launch or handshake failure.
    fn connect(&self, binary: &str, settings: &PluginSettings) -> Result<PluginClient, PluginError>;
}

/// Connector that spawns plugin binaries as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessConnector;

impl PluginConnector for ProcessConnector {
    fn connect(&self, binary: &str, settings: &PluginSettings) -> Result<PluginClient, PluginError> {
        PluginClient::connect(binary, settings)
    }
}

/// Memoisation key of a plugin engine: `<name>-<hex sha256>` of the decoded
/// configuration's JSON encoding.
///
/// # Errors
///
/// Returns [`FactoryError::Hash`] when the configuration cannot be encoded.
pub fn factory_key(name: &str, config: &EngineConfig) -> Result<String, FactoryError> {
    let encoded = serde_json::to_vec(config).map_err(|source| FactoryError::Hash {
        name: name.to_owned(),
        source,
    })?;
    Ok(format!("{name}-{:x}", Sha256::digest(&encoded)))
}

/// Builds engine factories and memoises plugin connections.
pub struct EngineFactories<C = ProcessConnector> {
    managers: Arc<ManagerRegistry>,
    runners: Arc<RunnerRegistry>,
    settings: PluginSettings,
    connector: C,
    plugins: Mutex<HashMap<String, Arc<PluginEngineFactory>>>,
}

impl EngineFactories<ProcessConnector> {
    /// Creates factories that launch plugins as child processes.
    #[must_use]
    pub fn new(
        managers: Arc<ManagerRegistry>,
        runners: Arc<RunnerRegistry>,
        settings: PluginSettings,
    ) -> Self {
        Self::with_connector(managers, runners, settings, ProcessConnector)
    }
}

impl<C: PluginConnector> EngineFactories<C> {
    /// Creates factories that open plugin connections through `connector`.
    #[must_use]
    pub fn with_connector(
        managers: Arc<ManagerRegistry>,
        runners: Arc<RunnerRegistry>,
        settings: PluginSettings,
        connector: C,
    ) -> Self {
        Self {
            managers,
            runners,
            settings,
            connector,
            plugins: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the factory for engine `name` configured by `raw`.
    ///
    /// Plugin engines with an identical name and configuration resolve to
    /// the same [`PluginEngineFactory`] and the same plugin process while
    /// that process is alive. A memoised plugin whose connection has closed
    /// or whose process has exited is replaced by a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Decode`], [`FactoryError::Hash`], or
    /// [`FactoryError::Connect`].
    pub fn factory(&self, name: &str, raw: &Map<String, Value>) -> Result<EngineFactory, FactoryError> {
        let config = EngineConfig::decode(raw).map_err(|source| FactoryError::Decode {
            name: name.to_owned(),
            source,
        })?;
        if !config.is_plugin() {
            debug!(target: FACTORY_TARGET, engine = name, "using compiled-in engine");
            return Ok(EngineFactory::InProcess(InProcessEngineFactory {
                name: name.to_owned(),
                config: config.raw_engine_config(),
                managers: Arc::clone(&self.managers),
                runners: Arc::clone(&self.runners),
            }));
        }

        let key = factory_key(name, &config)?;
        let mut plugins = self.plugins.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = plugins.get(&key) {
            if existing.client.is_alive() {
                debug!(target: FACTORY_TARGET, engine = name, %key, "reusing plugin factory");
                return Ok(EngineFactory::Plugin(Arc::clone(existing)));
            }
            warn!(target: FACTORY_TARGET, engine = name, %key, "plugin engine is gone, restarting");
            if let Some(stale) = plugins.remove(&key) {
                stale.client.shutdown();
            }
        }

        let binary = config.plugin_binary().to_owned();
        let client = self
            .connector
            .connect(&binary, &self.settings)
            .map_err(|source| FactoryError::Connect {
                binary: binary.clone(),
                source,
            })?;
        info!(target: FACTORY_TARGET, engine = name, %binary, %key, "started plugin engine");
        let factory = Arc::new(PluginEngineFactory::new(name, config, client));
        plugins.insert(key, Arc::clone(&factory));
        Ok(EngineFactory::Plugin(factory))
    }

    /// Number of memoised plugin factories.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forgets every memoised plugin factory and stops its process.
    ///
    /// Proxies handed out earlier fail afterwards.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self
            .plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (key, factory) in drained {
            debug!(target: FACTORY_TARGET, %key, "stopping plugin engine");
            factory.client.shutdown();
        }
    }
}

impl<C> fmt::Debug for EngineFactories<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineFactories")
            .field("managers", &self.managers)
            .field("runners", &self.runners)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Factory for one engine.
#[derive(Debug, Clone)]
pub enum EngineFactory {
    /// A compiled-in engine.
    InProcess(InProcessEngineFactory),
    /// An engine served by a plugin process.
    Plugin(Arc<PluginEngineFactory>),
}

impl EngineFactory {
    /// Engine name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::InProcess(factory) => &factory.name,
            Self::Plugin(factory) => &factory.name,
        }
    }

    /// Returns `true` for plugin engines.
    #[must_use]
    pub const fn is_plugin(&self) -> bool {
        matches!(self, Self::Plugin(_))
    }

    /// Returns the plugin factory, if any.
    #[must_use]
    pub const fn plugin(&self) -> Option<&Arc<PluginEngineFactory>> {
        match self {
            Self::Plugin(factory) => Some(factory),
            Self::InProcess(_) => None,
        }
    }

    /// Returns the engine's experiment manager.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Registry`] for compiled-in engines, and the
    /// dispense or configure failure for plugin engines.
    pub fn experiment_manager(&self) -> Result<Arc<dyn ExperimentManager>, FactoryError> {
        match self {
            Self::InProcess(factory) => Ok(factory.managers.get(&factory.name, &factory.config)?),
            Self::Plugin(factory) => {
                let manager: Arc<dyn ExperimentManager> = factory.manager()?;
                Ok(manager)
            }
        }
    }

    /// Returns the engine's experiment runner.
    ///
    /// # Errors
    ///
    /// As [`EngineFactory::experiment_manager`].
    pub fn experiment_runner(&self) -> Result<Arc<dyn ExperimentRunner>, FactoryError> {
        match self {
            Self::InProcess(factory) => Ok(factory.runners.get(&factory.name, &factory.config)?),
            Self::Plugin(factory) => {
                let runner: Arc<dyn ExperimentRunner> = factory.runner()?;
                Ok(runner)
            }
        }
    }
}

/// Factory for a compiled-in engine.
///
/// Each request constructs a fresh component from the registries.
#[derive(Debug, Clone)]
pub struct InProcessEngineFactory {
    name: String,
    config: Value,
    managers: Arc<ManagerRegistry>,
    runners: Arc<RunnerRegistry>,
}

impl InProcessEngineFactory {
    /// Configuration handed to the registered constructors.
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }
}

/// Factory for an engine served by a plugin process.
pub struct PluginEngineFactory {
    name: String,
    config: EngineConfig,
    client: PluginClient,
    manager: Mutex<Option<Arc<ManagerProxy>>>,
    runner: Mutex<Option<Arc<RunnerProxy>>>,
}

impl PluginEngineFactory {
    fn new(name: &str, config: EngineConfig, client: PluginClient) -> Self {
        Self {
            name: name.to_owned(),
            config,
            client,
            manager: Mutex::new(None),
            runner: Mutex::new(None),
        }
    }

    /// Decoded configuration of the engine.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Connection to the plugin process.
    #[must_use]
    pub const fn client(&self) -> &PluginClient {
        &self.client
    }

    /// Returns the remote manager, dispensing and configuring it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Dispense`], [`FactoryError::InterfaceMismatch`],
    /// or [`FactoryError::Configure`]. Nothing is cached on failure.
    pub fn manager(&self) -> Result<Arc<ManagerProxy>, FactoryError> {
        let service = ServiceId::ExperimentManager;
        let mut slot = self.manager.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let Dispensed::Manager(proxy) = self.dispense(service)? else {
            return Err(FactoryError::InterfaceMismatch {
                service,
                expected: service.interface(),
            });
        };
        proxy
            .configure(&self.config.raw_engine_config())
            .map_err(|source| FactoryError::Configure { service, source })?;
        let shared = Arc::new(proxy);
        *slot = Some(Arc::clone(&shared));
        Ok(shared)
    }

    /// Returns the remote runner, dispensing and configuring it on first
    /// use.
    ///
    /// # Errors
    ///
    /// As [`PluginEngineFactory::manager`].
    pub fn runner(&self) -> Result<Arc<RunnerProxy>, FactoryError> {
        let service = ServiceId::ExperimentRunner;
        let mut slot = self.runner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let Dispensed::Runner(proxy) = self.dispense(service)? else {
            return Err(FactoryError::InterfaceMismatch {
                service,
                expected: service.interface(),
            });
        };
        proxy
            .configure(&self.config.raw_engine_config())
            .map_err(|source| FactoryError::Configure { service, source })?;
        let shared = Arc::new(proxy);
        *slot = Some(Arc::clone(&shared));
        Ok(shared)
    }

    fn dispense(&self, service: ServiceId) -> Result<Dispensed, FactoryError> {
        debug!(target: FACTORY_TARGET, engine = %self.name, %service, "dispensing plugin service");
        self.client
            .dispense(&service.to_string())
            .map_err(|source| FactoryError::Dispense { service, source })
    }
}

impl fmt::Debug for PluginEngineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEngineFactory")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
