//! Host-side stubs for the two plugin services.
//!
//! Each proxy turns a trait call into one [`PluginCall`] and decodes the
//! returned JSON into the trait's result type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use turing_experiment::{
    Client, Engine, Experiment, ExperimentError, ExperimentManager, ExperimentRunner,
    GetTreatmentOptions, Header, StandardExperimentManager, Treatment, Variable,
};

use super::connection::RpcConnection;
use crate::error::PluginError;
use crate::protocol::{PluginCall, ServiceId};

fn configure(
    connection: &RpcConnection,
    service: ServiceId,
    config: &Value,
) -> Result<(), PluginError> {
    connection.call(
        service,
        PluginCall::Configure {
            config: config.clone(),
        },
    )?;
    Ok(())
}

fn invoke<T: DeserializeOwned>(
    connection: &RpcConnection,
    service: ServiceId,
    call: PluginCall,
) -> Result<T, ExperimentError> {
    let value = connection.call(service, call)?;
    serde_json::from_value(value).map_err(|error| PluginError::Codec(error).into())
}

/// Remote `experiment_manager` service.
///
/// The proxy always exposes the standard capability set; whether the remote
/// engine supports it is decided by the engine info it reports.
pub struct ManagerProxy {
    connection: Arc<RpcConnection>,
}

impl ManagerProxy {
    pub(crate) const fn new(connection: Arc<RpcConnection>) -> Self {
        Self { connection }
    }

    /// Sends the engine configuration to the remote manager.
    ///
    /// # Errors
    ///
    /// Returns the transport or remote error.
    pub fn configure(&self, config: &Value) -> Result<(), PluginError> {
        configure(&self.connection, ServiceId::ExperimentManager, config)
    }

    fn invoke<T: DeserializeOwned>(&self, call: PluginCall) -> Result<T, ExperimentError> {
        invoke(&self.connection, ServiceId::ExperimentManager, call)
    }
}

impl ExperimentManager for ManagerProxy {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        self.invoke(PluginCall::GetEngineInfo)
    }

    fn validate_experiment_config(&self, config: &Value) -> Result<(), ExperimentError> {
        self.invoke(PluginCall::ValidateExperimentConfig {
            config: config.clone(),
        })
    }

    fn get_experiment_runner_config(&self, config: &Value) -> Result<Value, ExperimentError> {
        self.invoke(PluginCall::GetExperimentRunnerConfig {
            config: config.clone(),
        })
    }

    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        Some(self)
    }
}

impl StandardExperimentManager for ManagerProxy {
    fn is_cache_enabled(&self) -> Result<bool, ExperimentError> {
        self.invoke(PluginCall::IsCacheEnabled)
    }

    fn list_clients(&self) -> Result<Vec<Client>, ExperimentError> {
        self.invoke(PluginCall::ListClients)
    }

    fn list_experiments(&self) -> Result<Vec<Experiment>, ExperimentError> {
        self.invoke(PluginCall::ListExperiments)
    }

    fn list_experiments_for_client(
        &self,
        client: &Client,
    ) -> Result<Vec<Experiment>, ExperimentError> {
        self.invoke(PluginCall::ListExperimentsForClient {
            client: client.clone(),
        })
    }

    fn list_variables_for_client(&self, client: &Client) -> Result<Vec<Variable>, ExperimentError> {
        self.invoke(PluginCall::ListVariablesForClient {
            client: client.clone(),
        })
    }

    fn list_variables_for_experiments(
        &self,
        experiments: &[Experiment],
    ) -> Result<BTreeMap<String, Vec<Variable>>, ExperimentError> {
        self.invoke(PluginCall::ListVariablesForExperiments {
            experiments: experiments.to_vec(),
        })
    }
}

impl fmt::Debug for ManagerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerProxy")
            .field("plugin", &self.connection.plugin())
            .finish()
    }
}

/// Remote `experiment_runner` service.
pub struct RunnerProxy {
    connection: Arc<RpcConnection>,
}

impl RunnerProxy {
    pub(crate) const fn new(connection: Arc<RpcConnection>) -> Self {
        Self { connection }
    }

    /// Sends the engine configuration to the remote runner.
    ///
    /// # Errors
    ///
    /// Returns the transport or remote error.
    pub fn configure(&self, config: &Value) -> Result<(), PluginError> {
        configure(&self.connection, ServiceId::ExperimentRunner, config)
    }
}

impl ExperimentRunner for RunnerProxy {
    fn get_treatment_for_request(
        &self,
        header: &Header,
        payload: &[u8],
        options: &GetTreatmentOptions,
    ) -> Result<Option<Treatment>, ExperimentError> {
        invoke(
            &self.connection,
            ServiceId::ExperimentRunner,
            PluginCall::GetTreatmentForRequest {
                header: header.clone(),
                payload: payload.to_vec(),
                options: options.clone(),
            },
        )
    }
}

impl fmt::Debug for RunnerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerProxy")
            .field("plugin", &self.connection.plugin())
            .finish()
    }
}
