//! Experiment runner capability.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExperimentError;
use crate::request::Header;

/// Resolved outcome of running an experiment for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    /// Experiment the request was assigned in.
    pub experiment_name: String,
    /// Variant name.
    pub name: String,
    /// Opaque treatment configuration.
    #[serde(default)]
    pub config: Value,
}

/// Per-request options passed to a runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTreatmentOptions {
    /// Id Turing assigned to the inference request.
    #[serde(default)]
    pub turing_request_id: String,
}

impl GetTreatmentOptions {
    /// Creates options for the given request id.
    #[must_use]
    pub fn new(turing_request_id: impl Into<String>) -> Self {
        Self {
            turing_request_id: turing_request_id.into(),
        }
    }
}

/// Capability that resolves a treatment for a live request.
pub trait ExperimentRunner: Send + Sync {
    /// Returns the treatment for the request, or `None` when no experiment
    /// applies to it.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::Extraction`] when a required variable is
    /// missing from the request, or an engine-specific error.
    fn get_treatment_for_request(
        &self,
        header: &Header,
        payload: &[u8],
        options: &GetTreatmentOptions,
    ) -> Result<Option<Treatment>, ExperimentError>;
}
