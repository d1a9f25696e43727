//! Data exchanged with experiment managers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::request::FieldSource;

/// Kind of experiment manager an engine provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExperimentManagerType {
    /// Drivable from the Turing UI through the standard capability set.
    #[default]
    Standard,
    /// Ships its own remote UI and only the minimal capability set.
    Custom,
}

/// Identity and capabilities of an experiment engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    /// Unique engine name.
    pub name: String,
    /// Name shown to users.
    #[serde(default)]
    pub display_name: String,
    /// Manager kind.
    #[serde(rename = "type")]
    pub kind: ExperimentManagerType,
    /// Selection flags of a standard engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_experiment_manager_config: Option<StandardExperimentManagerConfig>,
    /// Remote UI of a custom engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_experiment_manager_config: Option<CustomExperimentManagerConfig>,
}

impl Engine {
    /// Returns `true` when the engine declares the standard manager type.
    #[must_use]
    pub fn is_standard(&self) -> bool {
        self.kind == ExperimentManagerType::Standard
    }

    /// Returns `true` when clients are selected in the experiment config.
    #[must_use]
    pub fn client_selection_enabled(&self) -> bool {
        self.standard_experiment_manager_config
            .as_ref()
            .is_some_and(|config| config.client_selection_enabled)
    }

    /// Returns `true` when experiments are selected in the experiment config.
    #[must_use]
    pub fn experiment_selection_enabled(&self) -> bool {
        self.standard_experiment_manager_config
            .as_ref()
            .is_some_and(|config| config.experiment_selection_enabled)
    }
}

/// Selection flags of a standard engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardExperimentManagerConfig {
    /// Whether a client must be chosen.
    #[serde(default)]
    pub client_selection_enabled: bool,
    /// Whether experiments must be chosen.
    #[serde(default)]
    pub experiment_selection_enabled: bool,
    /// Landing page of the engine's own UI.
    #[serde(default)]
    pub home_page_url: String,
}

/// Pointer to the remote UI of a custom engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomExperimentManagerConfig {
    /// Remote UI module.
    pub remote_ui: RemoteUi,
    /// JSON schema of the engine's experiment configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_config_schema: Option<String>,
}

/// Remote UI module descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUi {
    /// Module name.
    pub name: String,
    /// URL the module is loaded from.
    pub url: String,
    /// Module configuration URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

/// Caller identity registered with an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Engine-assigned id.
    #[serde(default)]
    pub id: String,
    /// Client username.
    #[serde(default)]
    pub username: String,
    /// Client secret.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passkey: String,
}

/// A configured experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    /// Engine-assigned id.
    #[serde(default)]
    pub id: String,
    /// Experiment name.
    #[serde(default)]
    pub name: String,
    /// Owning client id.
    #[serde(default)]
    pub client_id: String,
    /// Arms of the experiment.
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// One arm of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant name.
    pub name: String,
}

/// Role of a variable in an experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariableType {
    /// Not usable by the runner.
    #[default]
    Unsupported,
    /// Randomisation unit.
    Unit,
    /// Segmentation filter.
    Filter,
}

/// A signal the engine needs extracted from requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name.
    pub name: String,
    /// Whether every request must carry it.
    #[serde(default)]
    pub required: bool,
    /// Variable role.
    #[serde(rename = "type", default)]
    pub kind: VariableType,
}

/// Rule describing where a variable is read from in a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableConfig {
    /// Variable name.
    #[serde(default)]
    pub name: String,
    /// Whether the variable must be configured.
    #[serde(default)]
    pub required: bool,
    /// Header name, payload path, or context variable name.
    #[serde(default)]
    pub field: String,
    /// Request part the field is read from.
    #[serde(default)]
    pub field_source: FieldSource,
}

/// Variables of a Turing experiment configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    /// Variables declared by the selected client.
    #[serde(default)]
    pub client_variables: Vec<Variable>,
    /// Variables declared by each selected experiment, keyed by experiment id.
    #[serde(default)]
    pub experiment_variables: BTreeMap<String, Vec<Variable>>,
    /// Extraction rules for the variables.
    #[serde(default)]
    pub config: Vec<VariableConfig>,
}

/// Experiment configuration stored by Turing for standard engines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuringExperimentConfig {
    /// Selected client.
    #[serde(default)]
    pub client: Client,
    /// Selected experiments.
    #[serde(default)]
    pub experiments: Vec<Experiment>,
    /// Variables and their extraction rules.
    #[serde(default)]
    pub variables: Variables,
}
