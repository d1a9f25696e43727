//! Experiment manager serving a fixed catalogue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use turing_experiment::{
    BaseStandardExperimentManager, Client, Engine, Experiment, ExperimentError, ExperimentManager,
    ExperimentManagerType, StandardExperimentManager, StandardExperimentManagerConfig,
    TuringExperimentConfig, Variable, VariableType,
};
use turing_plugins::ConfigurableExperimentManager;

use crate::runner::{Assignment, RunnerConfig};
use crate::{ENGINE_DISPLAY_NAME, ENGINE_NAME};

const MANAGER_TARGET: &str = "turing_plugin_hardcoded::manager";

/// Clients, experiments, and variables known to the engine.
///
/// This is the engine configuration block minus `plugin_binary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalogue {
    /// Landing page advertised in the engine info.
    #[serde(default)]
    pub home_page_url: String,
    /// Registered clients.
    #[serde(default)]
    pub clients: Vec<Client>,
    /// Every experiment, with its variants.
    #[serde(default)]
    pub experiments: Vec<Experiment>,
    /// Variables declared by each client, keyed by client id.
    #[serde(default)]
    pub client_variables: BTreeMap<String, Vec<Variable>>,
    /// Variables declared by each experiment, keyed by experiment id.
    #[serde(default)]
    pub experiment_variables: BTreeMap<String, Vec<Variable>>,
}

impl Catalogue {
    /// Decodes a catalogue from an engine configuration block.
    ///
    /// `null` yields an empty catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::InvalidConfig`] for malformed blocks.
    pub fn from_value(config: &Value) -> Result<Self, ExperimentError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(config).map_err(ExperimentError::invalid_config)
    }

    fn experiment(&self, id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|experiment| experiment.id == id)
    }

    fn unit_variable_names<'a>(
        &'a self,
        client_id: &str,
        experiment_id: &str,
    ) -> impl Iterator<Item = &'a str> {
        let client = self.client_variables.get(client_id).into_iter().flatten();
        let experiment = self
            .experiment_variables
            .get(experiment_id)
            .into_iter()
            .flatten();
        experiment
            .chain(client)
            .filter(|variable| variable.kind == VariableType::Unit)
            .map(|variable| variable.name.as_str())
    }
}

/// Describes the engine for a given home page.
#[must_use]
pub fn engine_info(home_page_url: &str) -> Engine {
    Engine {
        name: ENGINE_NAME.to_owned(),
        display_name: ENGINE_DISPLAY_NAME.to_owned(),
        kind: ExperimentManagerType::Standard,
        standard_experiment_manager_config: Some(StandardExperimentManagerConfig {
            client_selection_enabled: true,
            experiment_selection_enabled: true,
            home_page_url: home_page_url.to_owned(),
        }),
        custom_experiment_manager_config: None,
    }
}

/// Standard manager answering every listing from its [`Catalogue`].
#[derive(Debug, Clone)]
pub struct HardcodedManager {
    base: BaseStandardExperimentManager,
    catalogue: Catalogue,
}

impl HardcodedManager {
    /// Creates a manager over `catalogue`.
    #[must_use]
    pub fn new(catalogue: Catalogue) -> Self {
        Self {
            base: BaseStandardExperimentManager::new(engine_info(&catalogue.home_page_url)),
            catalogue,
        }
    }

    /// Builds a manager from an engine configuration block.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::InvalidConfig`] for malformed blocks.
    pub fn from_config(config: &Value) -> Result<Self, ExperimentError> {
        Catalogue::from_value(config).map(Self::new)
    }

    /// Returns the catalogue being served.
    #[must_use]
    pub const fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    fn assignment(
        &self,
        config: &TuringExperimentConfig,
        selected: &Experiment,
    ) -> Result<Assignment, ExperimentError> {
        let experiment = self.catalogue.experiment(&selected.id).ok_or_else(|| {
            ExperimentError::engine(format!("unknown experiment \"{}\"", selected.id))
        })?;
        let rules = &config.variables.config;
        let unit = self
            .catalogue
            .unit_variable_names(&config.client.id, &experiment.id)
            .find_map(|name| rules.iter().find(|rule| rule.name == name))
            .or_else(|| rules.first())
            .cloned()
            .ok_or_else(|| {
                ExperimentError::engine(format!(
                    "no unit variable configured for experiment \"{}\"",
                    experiment.name
                ))
            })?;
        Ok(Assignment {
            experiment: experiment.clone(),
            unit,
        })
    }
}

impl Default for HardcodedManager {
    fn default() -> Self {
        Self::new(Catalogue::default())
    }
}

impl ExperimentManager for HardcodedManager {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        self.base.get_engine_info()
    }

    fn validate_experiment_config(&self, config: &Value) -> Result<(), ExperimentError> {
        self.base.validate_experiment_config(config)
    }

    fn get_experiment_runner_config(&self, config: &Value) -> Result<Value, ExperimentError> {
        let parsed = BaseStandardExperimentManager::parse_config(config)?;
        let assignments = parsed
            .experiments
            .iter()
            .map(|selected| self.assignment(&parsed, selected))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            target: MANAGER_TARGET,
            client = %parsed.client.id,
            experiments = assignments.len(),
            "built runner configuration"
        );
        serde_json::to_value(RunnerConfig { assignments }).map_err(ExperimentError::invalid_config)
    }

    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        Some(self)
    }
}

impl StandardExperimentManager for HardcodedManager {
    fn list_clients(&self) -> Result<Vec<Client>, ExperimentError> {
        Ok(self.catalogue.clients.clone())
    }

    fn list_experiments(&self) -> Result<Vec<Experiment>, ExperimentError> {
        Ok(self.catalogue.experiments.clone())
    }

    fn list_experiments_for_client(
        &self,
        client: &Client,
    ) -> Result<Vec<Experiment>, ExperimentError> {
        Ok(self
            .catalogue
            .experiments
            .iter()
            .filter(|experiment| experiment.client_id == client.id)
            .cloned()
            .collect())
    }

    fn list_variables_for_client(&self, client: &Client) -> Result<Vec<Variable>, ExperimentError> {
        Ok(self
            .catalogue
            .client_variables
            .get(&client.id)
            .cloned()
            .unwrap_or_default())
    }

    fn list_variables_for_experiments(
        &self,
        experiments: &[Experiment],
    ) -> Result<BTreeMap<String, Vec<Variable>>, ExperimentError> {
        Ok(experiments
            .iter()
            .filter_map(|experiment| {
                self.catalogue
                    .experiment_variables
                    .get(&experiment.id)
                    .map(|variables| (experiment.id.clone(), variables.clone()))
            })
            .collect())
    }
}

impl ConfigurableExperimentManager for HardcodedManager {
    fn configure(&mut self, config: &Value) -> Result<(), ExperimentError> {
        *self = Self::from_config(config)?;
        debug!(
            target: MANAGER_TARGET,
            clients = self.catalogue.clients.len(),
            experiments = self.catalogue.experiments.len(),
            "catalogue configured"
        );
        Ok(())
    }
}

