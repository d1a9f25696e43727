//! Uniform call sites for the standard capability set.
//!
//! Each function first asks the manager for its engine info. Engines that
//! fail to answer, that declare a custom type, or that do not expose
//! [`StandardExperimentManager`] through [`ExperimentManager::as_standard`]
//! yield [`ExperimentError::StandardMethodUnsupported`]. The zero value of
//! every capability is its `Default`, so callers that want the degraded
//! result can write `list_clients(manager).unwrap_or_default()`.

use std::collections::BTreeMap;

use tracing::debug;

use super::types::{Client, Experiment, Variable};
use super::{ExperimentManager, StandardExperimentManager};
use crate::error::ExperimentError;

const ADAPTER_TARGET: &str = "turing_experiment::manager::adapter";

fn standard(
    manager: &dyn ExperimentManager,
) -> Result<&dyn StandardExperimentManager, ExperimentError> {
    let engine = match manager.get_engine_info() {
        Ok(engine) => engine,
        Err(error) => {
            debug!(target: ADAPTER_TARGET, %error, "engine info unavailable");
            return Err(ExperimentError::StandardMethodUnsupported);
        }
    };
    if !engine.is_standard() {
        debug!(target: ADAPTER_TARGET, engine = %engine.name, kind = %engine.kind, "not a standard engine");
        return Err(ExperimentError::StandardMethodUnsupported);
    }
    manager.as_standard().ok_or_else(|| {
        debug!(target: ADAPTER_TARGET, engine = %engine.name, "standard capability not exposed");
        ExperimentError::StandardMethodUnsupported
    })
}

/// Returns `true` when `manager` provides the standard capability set.
#[must_use]
pub fn is_standard_experiment_manager(manager: &dyn ExperimentManager) -> bool {
    standard(manager).is_ok()
}

/// Calls [`StandardExperimentManager::is_cache_enabled`] when supported.
///
/// # Errors
///
/// Returns [`ExperimentError::StandardMethodUnsupported`] for non-standard
/// managers, or the manager's own error.
pub fn is_cache_enabled(manager: &dyn ExperimentManager) -> Result<bool, ExperimentError> {
    standard(manager)?.is_cache_enabled()
}

/// Calls [`StandardExperimentManager::list_clients`] when supported.
///
/// # Errors
///
/// Returns [`ExperimentError::StandardMethodUnsupported`] for non-standard
/// managers, or the manager's own error.
pub fn list_clients(manager: &dyn ExperimentManager) -> Result<Vec<Client>, ExperimentError> {
    standard(manager)?.list_clients()
}

/// Calls [`StandardExperimentManager::list_experiments`] when supported.
///
/// # Errors
///
/// Returns [`ExperimentError::StandardMethodUnsupported`] for non-standard
/// managers, or the manager's own error.
pub fn list_experiments(
    manager: &dyn ExperimentManager,
) -> Result<Vec<Experiment>, ExperimentError> {
    standard(manager)?.list_experiments()
}

/// Calls [`StandardExperimentManager::list_experiments_for_client`] when
/// supported.
///
/// # Errors
///
/// Returns [`ExperimentError::StandardMethodUnsupported`] for non-standard
/// managers, or the manager's own error.
pub fn list_experiments_for_client(
    manager: &dyn ExperimentManager,
    client: &Client,
) -> Result<Vec<Experiment>, ExperimentError> {
    standard(manager)?.list_experiments_for_client(client)
}

/// Calls [`StandardExperimentManager::list_variables_for_client`] when
/// supported.
///
/// # Errors
///
/// Returns [`ExperimentError::StandardMethodUnsupported`] for non-standard
/// managers, or the manager's own error.
pub fn list_variables_for_client(
    manager: &dyn ExperimentManager,
    client: &Client,
) -> Result<Vec<Variable>, ExperimentError> {
    standard(manager)?.list_variables_for_client(client)
}

/// Calls [`StandardExperimentManager::list_variables_for_experiments`] when
/// supported.
///
/// # Errors
///
/// Returns [`ExperimentError::StandardMethodUnsupported`] for non-standard
/// managers, or the manager's own error.
pub fn list_variables_for_experiments(
    manager: &dyn ExperimentManager,
    experiments: &[Experiment],
) -> Result<BTreeMap<String, Vec<Variable>>, ExperimentError> {
    standard(manager)?.list_variables_for_experiments(experiments)
}
