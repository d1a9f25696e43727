//! Plugin side of the transport.
//!
//! A plugin binary builds [`PluginServices`] from its concrete manager and
//! runner and hands them to [`serve`]. The server checks the magic cookie the
//! host placed in the environment, writes its [`Handshake`], then dispatches
//! each [`RpcRequest`] to the matching service until the host closes stdin.
//!
//! Every service must receive `Plugin.Configure` before any other call; until
//! then calls are rejected with [`RemoteErrorCode::NotConfigured`].

use std::env;
use std::io::{self, Read, Write};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use turing_experiment::manager::adapter;
use turing_experiment::{ExperimentError, ExperimentManager, ExperimentRunner};

use crate::error::{ServeError, TransportError};
use crate::protocol::{
    Handshake, HandshakeConfig, PluginCall, RemoteError, RemoteErrorCode, RpcRequest, RpcResponse,
    ServiceId, ServiceInfo,
};
use crate::transport::{FrameReader, FrameWriter};

const SERVER_TARGET: &str = "turing_plugins::server";

/// An experiment manager that can be configured by the host.
pub trait ConfigurableExperimentManager: ExperimentManager {
    /// Applies the engine configuration sent by the host.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is unusable.
    fn configure(&mut self, config: &Value) -> Result<(), ExperimentError>;
}

/// An experiment runner that can be configured by the host.
pub trait ConfigurableExperimentRunner: ExperimentRunner {
    /// Applies the engine configuration sent by the host.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is unusable.
    fn configure(&mut self, config: &Value) -> Result<(), ExperimentError>;
}

/// The services a plugin process offers.
#[derive(Default)]
pub struct PluginServices {
    manager: Option<Box<dyn ConfigurableExperimentManager>>,
    runner: Option<Box<dyn ConfigurableExperimentRunner>>,
}

impl PluginServices {
    /// Creates an empty service set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers `manager` as the `experiment_manager` service.
    #[must_use]
    pub fn with_manager(mut self, manager: impl ConfigurableExperimentManager + 'static) -> Self {
        self.manager = Some(Box::new(manager));
        self
    }

    /// Offers `runner` as the `experiment_runner` service.
    #[must_use]
    pub fn with_runner(mut self, runner: impl ConfigurableExperimentRunner + 'static) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    /// Returns `true` when no service is offered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.manager.is_none() && self.runner.is_none()
    }

    fn advertised(&self) -> Vec<ServiceInfo> {
        let mut services = Vec::new();
        if self.manager.is_some() {
            services.push(ServiceId::ExperimentManager.into());
        }
        if self.runner.is_some() {
            services.push(ServiceId::ExperimentRunner.into());
        }
        services
    }
}

impl std::fmt::Debug for PluginServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginServices")
            .field("manager", &self.manager.is_some())
            .field("runner", &self.runner.is_some())
            .finish()
    }
}

/// Serves `services` over the process's stdin and stdout.
///
/// Blocks until the host closes stdin.
///
/// # Errors
///
/// Returns [`ServeError::Handshake`] when the process was not launched by a
/// compatible host, and transport failures otherwise.
pub fn serve(services: PluginServices, handshake: &HandshakeConfig) -> Result<(), ServeError> {
    let cookie = env::var(handshake.magic_cookie_key()).ok();
    if cookie.as_deref() != Some(handshake.magic_cookie_value()) {
        return Err(ServeError::Handshake {
            key: handshake.magic_cookie_key().to_owned(),
        });
    }
    serve_with_io(services, handshake, io::stdin().lock(), io::stdout().lock())
}

/// Serves `services` over arbitrary streams without checking the
/// environment.
///
/// # Errors
///
/// Returns [`ServeError::NoServices`] for an empty service set, and transport
/// or encoding failures otherwise.
pub fn serve_with_io<R: Read, W: Write>(
    services: PluginServices,
    handshake: &HandshakeConfig,
    reader: R,
    writer: W,
) -> Result<(), ServeError> {
    if services.is_empty() {
        return Err(ServeError::NoServices);
    }
    let mut frames = FrameReader::new(reader);
    let mut output = FrameWriter::new(writer);

    let greeting: Handshake = handshake.handshake(services.advertised());
    output.send(&serde_json::to_vec(&greeting)?)?;
    info!(
        target: SERVER_TARGET,
        protocol_version = greeting.protocol_version,
        services = greeting.services.len(),
        "plugin ready"
    );

    let mut dispatcher = Dispatcher::new(services);
    loop {
        let frame = match frames.receive() {
            Ok(frame) => frame,
            Err(TransportError::Closed) => {
                info!(target: SERVER_TARGET, "host closed the connection");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        let response = dispatcher.handle_frame(&frame);
        output.send(&serde_json::to_vec(&response)?)?;
    }
}

struct Slot<T: ?Sized> {
    service: Box<T>,
    configured: bool,
}

impl<T: ?Sized> Slot<T> {
    const fn new(service: Box<T>) -> Self {
        Self {
            service,
            configured: false,
        }
    }
}

struct Dispatcher {
    manager: Option<Slot<dyn ConfigurableExperimentManager>>,
    runner: Option<Slot<dyn ConfigurableExperimentRunner>>,
}

impl Dispatcher {
    fn new(services: PluginServices) -> Self {
        Self {
            manager: services.manager.map(Slot::new),
            runner: services.runner.map(Slot::new),
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_slice(frame) {
            Ok(request) => request,
            Err(error) => {
                let id = serde_json::from_slice::<Value>(frame)
                    .ok()
                    .and_then(|value| value.get("id").and_then(Value::as_u64))
                    .unwrap_or_default();
                warn!(target: SERVER_TARGET, id, %error, "malformed request");
                return RpcResponse::err(
                    id,
                    RemoteError::new(RemoteErrorCode::Malformed, error.to_string()),
                );
            }
        };

        let RpcRequest { id, service, call } = request;
        let method = call.method_name();
        debug!(target: SERVER_TARGET, id, %service, method, "dispatching call");
        match self.dispatch(service, call) {
            Ok(value) => RpcResponse::ok(id, value),
            Err(error) => {
                debug!(target: SERVER_TARGET, id, %service, method, code = %error.code, "call failed");
                RpcResponse::err(id, error)
            }
        }
    }

    fn dispatch(&mut self, service: ServiceId, call: PluginCall) -> Result<Value, RemoteError> {
        match service {
            ServiceId::ExperimentManager => {
                let slot = self.manager.as_mut().ok_or_else(|| unavailable(service))?;
                match call {
                    PluginCall::Configure { config } => {
                        encode(slot.service.configure(&config))?;
                        slot.configured = true;
                        Ok(Value::Null)
                    }
                    _ if !slot.configured => Err(not_configured(service)),
                    other => call_manager(&*slot.service, other),
                }
            }
            ServiceId::ExperimentRunner => {
                let slot = self.runner.as_mut().ok_or_else(|| unavailable(service))?;
                match call {
                    PluginCall::Configure { config } => {
                        encode(slot.service.configure(&config))?;
                        slot.configured = true;
                        Ok(Value::Null)
                    }
                    _ if !slot.configured => Err(not_configured(service)),
                    other => call_runner(&*slot.service, other),
                }
            }
        }
    }
}

fn call_manager(
    service: &dyn ConfigurableExperimentManager,
    call: PluginCall,
) -> Result<Value, RemoteError> {
    let manager: &dyn ExperimentManager = service;
    match call {
        PluginCall::GetEngineInfo => encode(manager.get_engine_info()),
        PluginCall::ValidateExperimentConfig { config } => {
            encode(manager.validate_experiment_config(&config))
        }
        PluginCall::GetExperimentRunnerConfig { config } => {
            encode(manager.get_experiment_runner_config(&config))
        }
        PluginCall::IsCacheEnabled => encode(adapter::is_cache_enabled(manager)),
        PluginCall::ListClients => encode(adapter::list_clients(manager)),
        PluginCall::ListExperiments => encode(adapter::list_experiments(manager)),
        PluginCall::ListExperimentsForClient { client } => {
            encode(adapter::list_experiments_for_client(manager, &client))
        }
        PluginCall::ListVariablesForClient { client } => {
            encode(adapter::list_variables_for_client(manager, &client))
        }
        PluginCall::ListVariablesForExperiments { experiments } => {
            encode(adapter::list_variables_for_experiments(manager, &experiments))
        }
        other => Err(unknown_method(ServiceId::ExperimentManager, &other)),
    }
}

fn call_runner(
    runner: &dyn ConfigurableExperimentRunner,
    call: PluginCall,
) -> Result<Value, RemoteError> {
    match call {
        PluginCall::GetTreatmentForRequest {
            header,
            payload,
            options,
        } => encode(runner.get_treatment_for_request(&header, &payload, &options)),
        other => Err(unknown_method(ServiceId::ExperimentRunner, &other)),
    }
}

fn encode<T: Serialize>(result: Result<T, ExperimentError>) -> Result<Value, RemoteError> {
    let value = result.map_err(|error| RemoteError::from(&error))?;
    serde_json::to_value(value)
        .map_err(|error| RemoteError::new(RemoteErrorCode::Engine, error.to_string()))
}

fn unavailable(service: ServiceId) -> RemoteError {
    RemoteError::new(
        RemoteErrorCode::ServiceUnavailable,
        format!("service \"{service}\" is not offered by this plugin"),
    )
}

fn not_configured(service: ServiceId) -> RemoteError {
    RemoteError::new(
        RemoteErrorCode::NotConfigured,
        format!("service \"{service}\" must be configured before use"),
    )
}

fn unknown_method(service: ServiceId, call: &PluginCall) -> RemoteError {
    RemoteError::new(
        RemoteErrorCode::UnknownMethod,
        format!(
            "method {} is not available on service \"{service}\"",
            call.method_name()
        ),
    )
}
