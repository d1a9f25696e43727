//! Validation of [`TuringExperimentConfig`] against an engine's capabilities.
//!
//! Validation runs in two stages. Ordered pre-checks reject configurations
//! that cannot be used at all and stop at the first failure. Structural rules
//! then run over the sections the engine enables (`variables` always,
//! `client` with client selection, `experiments` with experiment selection)
//! and every violation is collected.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use super::types::{Engine, TuringExperimentConfig, VariableConfig};

/// Message of the empty-experiments pre-check.
pub const NO_EXPERIMENT_SELECTED_MESSAGE: &str =
    "Expected at least 1 experiment in the configuration";

/// Rule a configuration field broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationRule {
    /// The field must be set.
    Required,
    /// The field must be set because a sibling flag is set.
    RequiredWith,
    /// The field must name a known request part.
    #[serde(rename = "field-src")]
    #[strum(serialize = "field-src")]
    FieldSource,
    /// Experiment selection is enabled but no experiment is configured.
    NoExperimentSelected,
    /// An experiment belongs to a different client than the selected one.
    ClientIdMismatch,
}

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Path of the field, e.g. `variables.config[0].field`.
    pub path: String,
    /// Rule that was broken.
    pub rule: ValidationRule,
    /// Human-readable description.
    pub message: String,
}

impl FieldViolation {
    fn required(path: String) -> Self {
        let message = format!("{path} is required");
        Self {
            path,
            rule: ValidationRule::Required,
            message,
        }
    }
}

/// Every violation found in one configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    /// Wraps a list of violations.
    #[must_use]
    pub const fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Returns the violations in the order they were found.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Returns `true` when a violation of `rule` was recorded for `path`.
    #[must_use]
    pub fn contains(&self, path: &str, rule: ValidationRule) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.path == path && violation.rule == rule)
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn single(path: &str, rule: ValidationRule, message: String) -> Self {
        Self::new(vec![FieldViolation {
            path: path.to_owned(),
            rule,
            message,
        }])
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.violations {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(&violation.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validates `config` against the selection flags of `engine`.
///
/// # Errors
///
/// Returns the first failing pre-check on its own, otherwise every
/// structural violation in the enabled sections.
pub fn validate_experiment_config(
    engine: &Engine,
    config: &TuringExperimentConfig,
) -> Result<(), ValidationErrors> {
    precheck(engine, config)?;

    let mut violations = Vec::new();
    if engine.client_selection_enabled() {
        check_client(config, &mut violations);
    }
    if engine.experiment_selection_enabled() {
        check_experiments(config, &mut violations);
    }
    check_variables(&config.variables.config, &mut violations);
    ValidationErrors::new(violations).into_result()
}

fn precheck(engine: &Engine, config: &TuringExperimentConfig) -> Result<(), ValidationErrors> {
    if !engine.experiment_selection_enabled() {
        return Ok(());
    }
    if config.experiments.is_empty() {
        return Err(ValidationErrors::single(
            "experiments",
            ValidationRule::NoExperimentSelected,
            NO_EXPERIMENT_SELECTED_MESSAGE.to_owned(),
        ));
    }
    if !engine.client_selection_enabled() {
        return Ok(());
    }
    let client_id = config.client.id.as_str();
    match config
        .experiments
        .iter()
        .enumerate()
        .find(|(_, experiment)| experiment.client_id != client_id)
    {
        Some((index, experiment)) => Err(ValidationErrors::single(
            &format!("experiments[{index}].client_id"),
            ValidationRule::ClientIdMismatch,
            format!(
                "Client ID {} of experiment {} does not match the selected client ID {client_id}",
                experiment.client_id, experiment.name
            ),
        )),
        None => Ok(()),
    }
}

fn check_client(config: &TuringExperimentConfig, violations: &mut Vec<FieldViolation>) {
    if config.client.id.is_empty() {
        violations.push(FieldViolation::required("client.id".to_owned()));
    }
    if config.client.username.is_empty() {
        violations.push(FieldViolation::required("client.username".to_owned()));
    }
}

fn check_experiments(config: &TuringExperimentConfig, violations: &mut Vec<FieldViolation>) {
    for (index, experiment) in config.experiments.iter().enumerate() {
        if experiment.name.is_empty() {
            violations.push(FieldViolation::required(format!(
                "experiments[{index}].name"
            )));
        }
    }
}

fn check_variables(configs: &[VariableConfig], violations: &mut Vec<FieldViolation>) {
    for (index, variable) in configs.iter().enumerate() {
        let prefix = format!("variables.config[{index}]");
        if variable.name.is_empty() {
            violations.push(FieldViolation::required(format!("{prefix}.name")));
        }
        if variable.required && variable.field.is_empty() {
            let path = format!("{prefix}.field");
            violations.push(FieldViolation {
                message: format!("{path} is required when {prefix}.required is set"),
                path,
                rule: ValidationRule::RequiredWith,
            });
        }
        if !variable.field_source.is_recognized() {
            let path = format!("{prefix}.field_source");
            violations.push(FieldViolation {
                message: format!(
                    "{path} has unrecognized field source \"{}\"",
                    variable.field_source
                ),
                path,
                rule: ValidationRule::FieldSource,
            });
        }
    }
}
