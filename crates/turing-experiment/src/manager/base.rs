//! Base managers that concrete engines build on.
//!
//! An engine holds one of these and delegates whatever it does not
//! customise.

use serde::Deserialize;
use serde_json::Value;

use super::types::{Engine, TuringExperimentConfig};
use super::validation::validate_experiment_config;
use super::{ExperimentManager, StandardExperimentManager};
use crate::error::ExperimentError;

/// Minimal manager: fixed engine info, pass-through validation, and an empty
/// runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseExperimentManager {
    engine: Engine,
}

impl BaseExperimentManager {
    /// Creates a manager describing `engine`.
    #[must_use]
    pub const fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Returns the engine description.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl ExperimentManager for BaseExperimentManager {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        Ok(self.engine.clone())
    }

    fn validate_experiment_config(&self, _config: &Value) -> Result<(), ExperimentError> {
        Ok(())
    }

    fn get_experiment_runner_config(&self, _config: &Value) -> Result<Value, ExperimentError> {
        Ok(Value::Null)
    }
}

/// Standard manager with the default capability bodies and the standard
/// experiment-config validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseStandardExperimentManager {
    base: BaseExperimentManager,
}

impl BaseStandardExperimentManager {
    /// Creates a standard manager describing `engine`.
    #[must_use]
    pub const fn new(engine: Engine) -> Self {
        Self {
            base: BaseExperimentManager::new(engine),
        }
    }

    /// Returns the engine description.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        self.base.engine()
    }

    /// Decodes a stored experiment configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::InvalidConfig`] when `config` does not have
    /// the shape of a [`TuringExperimentConfig`].
    pub fn parse_config(config: &Value) -> Result<TuringExperimentConfig, ExperimentError> {
        TuringExperimentConfig::deserialize(config).map_err(ExperimentError::invalid_config)
    }
}

impl ExperimentManager for BaseStandardExperimentManager {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        self.base.get_engine_info()
    }

    fn validate_experiment_config(&self, config: &Value) -> Result<(), ExperimentError> {
        let parsed = Self::parse_config(config)?;
        validate_experiment_config(self.engine(), &parsed)?;
        Ok(())
    }

    fn get_experiment_runner_config(&self, config: &Value) -> Result<Value, ExperimentError> {
        self.base.get_experiment_runner_config(config)
    }

    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        Some(self)
    }
}

impl StandardExperimentManager for BaseStandardExperimentManager {}
