//! Wire types exchanged between the engine host and plugin processes.
//!
//! Every message is a JSON document carried in one `Content-Length` frame
//! (see [`crate::transport`]). The plugin speaks first with a [`Handshake`];
//! afterwards the host sends [`RpcRequest`]s and the plugin answers each with
//! an [`RpcResponse`] carrying the same id.
//!
//! Calls form a closed set ([`PluginCall`]) addressed by stable method names,
//! so both sides agree on the contract without reflection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use turing_experiment::{
    Client, Experiment, ExperimentError, FieldViolation, GetTreatmentOptions, Header,
    ValidationErrors,
};

/// Protocol version both sides must agree on.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable the host sets when launching a plugin.
pub const DEFAULT_MAGIC_COOKIE_KEY: &str = "TURING_EXPERIMENT_ENGINE_PLUGIN";

/// Value of [`DEFAULT_MAGIC_COOKIE_KEY`] expected by both sides.
pub const DEFAULT_MAGIC_COOKIE_VALUE: &str = "turing-experiment-engine-v1";

/// Parameters that identify a compatible host/plugin pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    protocol_version: u32,
    magic_cookie_key: String,
    magic_cookie_value: String,
}

impl HandshakeConfig {
    /// Creates a handshake configuration.
    #[must_use]
    pub fn new(
        protocol_version: u32,
        magic_cookie_key: impl Into<String>,
        magic_cookie_value: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version,
            magic_cookie_key: magic_cookie_key.into(),
            magic_cookie_value: magic_cookie_value.into(),
        }
    }

    /// Protocol version.
    #[must_use]
    pub const fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// Environment variable carrying the cookie.
    #[must_use]
    pub fn magic_cookie_key(&self) -> &str {
        &self.magic_cookie_key
    }

    /// Expected cookie value.
    #[must_use]
    pub fn magic_cookie_value(&self) -> &str {
        &self.magic_cookie_value
    }

    /// Builds the handshake a plugin offering `services` sends.
    #[must_use]
    pub fn handshake(&self, services: Vec<ServiceInfo>) -> Handshake {
        Handshake {
            protocol_version: self.protocol_version,
            magic_cookie_key: self.magic_cookie_key.clone(),
            magic_cookie_value: self.magic_cookie_value.clone(),
            services,
        }
    }

    /// Describes the first field of `handshake` that disagrees with this
    /// configuration, or `None` when the plugin is compatible.
    #[must_use]
    pub fn mismatch(&self, handshake: &Handshake) -> Option<String> {
        if handshake.protocol_version != self.protocol_version {
            return Some(format!(
                "protocol version {} does not match expected version {}",
                handshake.protocol_version, self.protocol_version
            ));
        }
        if handshake.magic_cookie_key != self.magic_cookie_key
            || handshake.magic_cookie_value != self.magic_cookie_value
        {
            return Some(format!(
                "magic cookie {}={} does not match expected {}={}",
                handshake.magic_cookie_key,
                handshake.magic_cookie_value,
                self.magic_cookie_key,
                self.magic_cookie_value
            ));
        }
        None
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::new(
            PROTOCOL_VERSION,
            DEFAULT_MAGIC_COOKIE_KEY,
            DEFAULT_MAGIC_COOKIE_VALUE,
        )
    }
}

/// Named services a plugin can offer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceId {
    /// The experiment manager.
    ExperimentManager,
    /// The experiment runner.
    ExperimentRunner,
}

impl ServiceId {
    /// Interface the host requires the service to implement.
    #[must_use]
    pub const fn interface(self) -> &'static str {
        match self {
            Self::ExperimentManager => "ConfigurableExperimentManager",
            Self::ExperimentRunner => "ConfigurableExperimentRunner",
        }
    }
}

/// A service advertised in the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service id as sent on the wire, e.g. `experiment_runner`.
    pub id: String,
    /// Interface the service implements.
    pub interface: String,
}

impl From<ServiceId> for ServiceInfo {
    fn from(service: ServiceId) -> Self {
        Self {
            id: service.to_string(),
            interface: service.interface().to_owned(),
        }
    }
}

/// First frame written by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version the plugin speaks.
    pub protocol_version: u32,
    /// Cookie key the plugin was built against.
    pub magic_cookie_key: String,
    /// Cookie value the plugin was built against.
    pub magic_cookie_value: String,
    /// Services offered by the plugin.
    #[serde(default)]
    pub services: Vec<ServiceInfo>,
}

impl Handshake {
    /// Returns the advertised entry for `id`.
    #[must_use]
    pub fn service(&self, id: &str) -> Option<&ServiceInfo> {
        self.services.iter().find(|service| service.id == id)
    }
}

/// The closed set of remote calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PluginCall {
    /// Hands the raw engine configuration to the service.
    #[serde(rename = "Plugin.Configure")]
    Configure {
        /// Pass-through engine configuration.
        config: Value,
    },
    /// `ExperimentManager::get_engine_info`.
    #[serde(rename = "Plugin.GetEngineInfo")]
    GetEngineInfo,
    /// `ExperimentManager::validate_experiment_config`.
    #[serde(rename = "Plugin.ValidateExperimentConfig")]
    ValidateExperimentConfig {
        /// Stored experiment configuration.
        config: Value,
    },
    /// `ExperimentManager::get_experiment_runner_config`.
    #[serde(rename = "Plugin.GetExperimentRunnerConfig")]
    GetExperimentRunnerConfig {
        /// Stored experiment configuration.
        config: Value,
    },
    /// `StandardExperimentManager::is_cache_enabled`.
    #[serde(rename = "Plugin.IsCacheEnabled")]
    IsCacheEnabled,
    /// `StandardExperimentManager::list_clients`.
    #[serde(rename = "Plugin.ListClients")]
    ListClients,
    /// `StandardExperimentManager::list_experiments`.
    #[serde(rename = "Plugin.ListExperiments")]
    ListExperiments,
    /// `StandardExperimentManager::list_experiments_for_client`.
    #[serde(rename = "Plugin.ListExperimentsForClient")]
    ListExperimentsForClient {
        /// Client to list for.
        client: Client,
    },
    /// `StandardExperimentManager::list_variables_for_client`.
    #[serde(rename = "Plugin.ListVariablesForClient")]
    ListVariablesForClient {
        /// Client to list for.
        client: Client,
    },
    /// `StandardExperimentManager::list_variables_for_experiments`.
    #[serde(rename = "Plugin.ListVariablesForExperiments")]
    ListVariablesForExperiments {
        /// Experiments to list for.
        experiments: Vec<Experiment>,
    },
    /// `ExperimentRunner::get_treatment_for_request`.
    #[serde(rename = "Plugin.GetTreatmentForRequest")]
    GetTreatmentForRequest {
        /// Request headers.
        header: Header,
        /// Raw request body, base64 encoded on the wire.
        #[serde(with = "payload_base64")]
        payload: Vec<u8>,
        /// Per-request options.
        options: GetTreatmentOptions,
    },
}

impl PluginCall {
    /// Stable method name used on the wire and in logs.
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::Configure { .. } => "Plugin.Configure",
            Self::GetEngineInfo => "Plugin.GetEngineInfo",
            Self::ValidateExperimentConfig { .. } => "Plugin.ValidateExperimentConfig",
            Self::GetExperimentRunnerConfig { .. } => "Plugin.GetExperimentRunnerConfig",
            Self::IsCacheEnabled => "Plugin.IsCacheEnabled",
            Self::ListClients => "Plugin.ListClients",
            Self::ListExperiments => "Plugin.ListExperiments",
            Self::ListExperimentsForClient { .. } => "Plugin.ListExperimentsForClient",
            Self::ListVariablesForClient { .. } => "Plugin.ListVariablesForClient",
            Self::ListVariablesForExperiments { .. } => "Plugin.ListVariablesForExperiments",
            Self::GetTreatmentForRequest { .. } => "Plugin.GetTreatmentForRequest",
        }
    }
}

/// A call addressed to one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Per-connection request id.
    pub id: u64,
    /// Target service.
    pub service: ServiceId,
    /// The call itself.
    pub call: PluginCall,
}

/// The answer to one [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request being answered.
    pub id: u64,
    /// Result of the call.
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    /// Builds a successful response.
    #[must_use]
    pub const fn ok(id: u64, value: Value) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Ok(value),
        }
    }

    /// Builds a failed response.
    #[must_use]
    pub const fn err(id: u64, error: RemoteError) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Err(error),
        }
    }

    /// Converts the outcome into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the remote error when the call failed.
    pub fn into_result(self) -> Result<Value, RemoteError> {
        match self.outcome {
            RpcOutcome::Ok(value) => Ok(value),
            RpcOutcome::Err(error) => Err(error),
        }
    }
}

/// Success value or remote error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcOutcome {
    /// JSON-encoded return value.
    Ok(Value),
    /// Failure reported by the plugin.
    Err(RemoteError),
}

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RemoteErrorCode {
    /// The experiment configuration failed validation.
    Validation,
    /// A standard method was called on a non-standard manager.
    StandardMethod,
    /// A request field could not be extracted.
    Extraction,
    /// A configuration document could not be decoded.
    InvalidConfig,
    /// Any other engine failure.
    Engine,
    /// The service was called before `Plugin.Configure`.
    NotConfigured,
    /// The plugin does not serve the addressed service.
    ServiceUnavailable,
    /// The call is not valid for the addressed service.
    UnknownMethod,
    /// The request frame could not be decoded.
    Malformed,
}

/// Error reported by a plugin for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Classification.
    pub code: RemoteErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Field violations for [`RemoteErrorCode::Validation`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl RemoteError {
    /// Creates an error without violations.
    #[must_use]
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            violations: Vec::new(),
        }
    }

    /// Rebuilds the host-side error.
    ///
    /// Validation and standard-method failures keep their typed variants;
    /// everything else becomes [`ExperimentError::Engine`] with the remote
    /// message.
    #[must_use]
    pub fn into_experiment_error(self) -> ExperimentError {
        match self.code {
            RemoteErrorCode::Validation => {
                ExperimentError::Validation(ValidationErrors::new(self.violations))
            }
            RemoteErrorCode::StandardMethod => ExperimentError::StandardMethodUnsupported,
            _ => ExperimentError::engine(self.message),
        }
    }
}

impl From<&ExperimentError> for RemoteError {
    fn from(error: &ExperimentError) -> Self {
        let code = match error {
            ExperimentError::Validation(errors) => {
                return Self {
                    code: RemoteErrorCode::Validation,
                    message: errors.to_string(),
                    violations: errors.violations().to_vec(),
                };
            }
            ExperimentError::StandardMethodUnsupported => RemoteErrorCode::StandardMethod,
            ExperimentError::Extraction(_) => RemoteErrorCode::Extraction,
            ExperimentError::InvalidConfig(_) | ExperimentError::TypeMismatch { .. } => {
                RemoteErrorCode::InvalidConfig
            }
            _ => RemoteErrorCode::Engine,
        };
        Self::new(code, error.to_string())
    }
}

mod payload_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
