//! Experiment manager capabilities.
//!
//! Every engine implements [`ExperimentManager`]. Standard engines, whose
//! experiments are configured through the Turing UI, also implement
//! [`StandardExperimentManager`] and expose it through
//! [`ExperimentManager::as_standard`]. That probe is the only place the wider
//! capability is discovered; callers go through the functions in [`adapter`],
//! which degrade to [`ExperimentError::StandardMethodUnsupported`] for custom
//! engines.

pub mod adapter;
mod base;
mod types;
mod validation;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ExperimentError;

pub use self::base::{BaseExperimentManager, BaseStandardExperimentManager};
pub use self::types::{
    Client, CustomExperimentManagerConfig, Engine, Experiment, ExperimentManagerType, RemoteUi,
    StandardExperimentManagerConfig, TuringExperimentConfig, Variable, VariableConfig,
    VariableType, Variables, Variant,
};
pub use self::validation::{
    FieldViolation, NO_EXPERIMENT_SELECTED_MESSAGE, ValidationErrors, ValidationRule,
    validate_experiment_config,
};

/// Capability required of every experiment engine.
pub trait ExperimentManager: Send + Sync {
    /// Describes the engine.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine cannot describe itself.
    fn get_engine_info(&self) -> Result<Engine, ExperimentError>;

    /// Checks an experiment configuration before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::Validation`] or
    /// [`ExperimentError::InvalidConfig`] for unusable configurations.
    fn validate_experiment_config(&self, config: &Value) -> Result<(), ExperimentError>;

    /// Converts a stored experiment configuration into the configuration the
    /// engine's runner is started with.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot be converted.
    fn get_experiment_runner_config(&self, config: &Value) -> Result<Value, ExperimentError>;

    /// Returns the standard capability set when the engine provides it.
    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        None
    }
}

/// Optional capability set of engines driven through the Turing UI.
///
/// The provided bodies are the no-op defaults: caching enabled and empty
/// listings.
pub trait StandardExperimentManager: ExperimentManager {
    /// Whether Turing may cache listings from this engine.
    ///
    /// # Errors
    ///
    /// Returns an engine-specific error.
    fn is_cache_enabled(&self) -> Result<bool, ExperimentError> {
        Ok(true)
    }

    /// Lists the clients registered with the engine.
    ///
    /// # Errors
    ///
    /// Returns an engine-specific error.
    fn list_clients(&self) -> Result<Vec<Client>, ExperimentError> {
        Ok(Vec::new())
    }

    /// Lists every experiment.
    ///
    /// # Errors
    ///
    /// Returns an engine-specific error.
    fn list_experiments(&self) -> Result<Vec<Experiment>, ExperimentError> {
        Ok(Vec::new())
    }

    /// Lists the experiments owned by `client`.
    ///
    /// # Errors
    ///
    /// Returns an engine-specific error.
    fn list_experiments_for_client(
        &self,
        _client: &Client,
    ) -> Result<Vec<Experiment>, ExperimentError> {
        Ok(Vec::new())
    }

    /// Lists the variables declared by `client`.
    ///
    /// # Errors
    ///
    /// Returns an engine-specific error.
    fn list_variables_for_client(
        &self,
        _client: &Client,
    ) -> Result<Vec<Variable>, ExperimentError> {
        Ok(Vec::new())
    }

    /// Lists the variables of each experiment, keyed by experiment id.
    ///
    /// # Errors
    ///
    /// Returns an engine-specific error.
    fn list_variables_for_experiments(
        &self,
        _experiments: &[Experiment],
    ) -> Result<BTreeMap<String, Vec<Variable>>, ExperimentError> {
        Ok(BTreeMap::new())
    }
}

#[cfg(test)]
mod tests;
