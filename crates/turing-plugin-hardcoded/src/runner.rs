//! Deterministic treatment assignment.
//!
//! Each configured experiment names the variable that identifies the
//! randomisation unit. The unit value is read from the request and hashed
//! together with the experiment name onto one of the experiment's variants,
//! so the same unit always lands in the same variant.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::debug;
use turing_experiment::{
    Experiment, ExperimentError, ExperimentRunner, ExtractionError, GetTreatmentOptions, Header,
    RequestFields, Treatment, VariableConfig, Variant, extract,
};
use turing_plugins::ConfigurableExperimentRunner;

const RUNNER_TARGET: &str = "turing_plugin_hardcoded::runner";

/// Configuration the runner is started with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Experiments tried in order; the first one that applies wins.
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// An experiment together with the rule locating its unit variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Experiment and its variants.
    pub experiment: Experiment,
    /// Where the unit variable is read from.
    pub unit: VariableConfig,
}

/// Maps `unit` onto one of the experiment's variants.
///
/// Returns `None` when the experiment has no variants.
#[must_use]
pub fn assign<'a>(experiment: &'a Experiment, unit: &str) -> Option<&'a Variant> {
    let digest = Sha256::digest(format!("{}:{unit}", experiment.name));
    let bucket = digest
        .iter()
        .take(8)
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte));
    let count = u64::try_from(experiment.variants.len()).ok()?;
    let index = usize::try_from(bucket.checked_rem(count)?).ok()?;
    experiment.variants.get(index)
}

/// Runner assigning treatments by hashing the unit variable.
#[derive(Debug, Clone, Default)]
pub struct HardcodedRunner {
    config: RunnerConfig,
}

impl HardcodedRunner {
    /// Creates a runner for `config`.
    #[must_use]
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Builds a runner from a runner configuration document.
    ///
    /// `null` yields a runner without experiments.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::InvalidConfig`] for malformed documents.
    pub fn from_config(config: &Value) -> Result<Self, ExperimentError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        RunnerConfig::deserialize(config)
            .map(Self::new)
            .map_err(ExperimentError::invalid_config)
    }

    /// Returns the configuration being run.
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

impl ExperimentRunner for HardcodedRunner {
    fn get_treatment_for_request(
        &self,
        header: &Header,
        payload: &[u8],
        options: &GetTreatmentOptions,
    ) -> Result<Option<Treatment>, ExperimentError> {
        let request = RequestFields::http(header, payload);
        for entry in &self.config.assignments {
            let unit = match extract(&entry.unit.field_source, &entry.unit.field, &request) {
                Ok(unit) => unit,
                Err(ExtractionError::FieldNotFound { .. }) if !entry.unit.required => {
                    debug!(
                        target: RUNNER_TARGET,
                        experiment = %entry.experiment.name,
                        field = %entry.unit.field,
                        "optional unit variable absent; skipping experiment"
                    );
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            let Some(variant) = assign(&entry.experiment, &unit) else {
                continue;
            };
            return Ok(Some(Treatment {
                experiment_name: entry.experiment.name.clone(),
                name: variant.name.clone(),
                config: json!({
                    "unit": unit,
                    "variant": variant.name,
                    "turing_request_id": options.turing_request_id,
                }),
            }));
        }
        Ok(None)
    }
}

impl ConfigurableExperimentRunner for HardcodedRunner {
    fn configure(&mut self, config: &Value) -> Result<(), ExperimentError> {
        *self = Self::from_config(config)?;
        debug!(
            target: RUNNER_TARGET,
            experiments = self.config.assignments.len(),
            "runner configured"
        );
        Ok(())
    }
}
