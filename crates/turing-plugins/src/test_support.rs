//! Engines and loopback wiring shared by unit and behaviour tests.

use std::io;
use std::thread::{self, JoinHandle};

use serde_json::{Value, json};
use turing_experiment::{
    BaseStandardExperimentManager, Client, Engine, ExperimentError, ExperimentManager,
    ExperimentManagerType, ExperimentRunner, FieldSource, GetTreatmentOptions, Header,
    RequestFields, StandardExperimentManager, StandardExperimentManagerConfig, Treatment, extract,
};

use crate::client::PluginClient;
use crate::error::{PluginError, ServeError};
use crate::protocol::HandshakeConfig;
use crate::server::{
    ConfigurableExperimentManager, ConfigurableExperimentRunner, PluginServices, serve_with_io,
};
use crate::settings::PluginSettings;

pub(crate) fn standard_engine(name: &str) -> Engine {
    Engine {
        name: name.to_owned(),
        display_name: name.to_owned(),
        kind: ExperimentManagerType::Standard,
        standard_experiment_manager_config: Some(StandardExperimentManagerConfig {
            client_selection_enabled: true,
            experiment_selection_enabled: true,
            home_page_url: String::new(),
        }),
        custom_experiment_manager_config: None,
    }
}

pub(crate) fn custom_engine(name: &str) -> Engine {
    Engine {
        name: name.to_owned(),
        kind: ExperimentManagerType::Custom,
        ..Engine::default()
    }
}

/// Manager listing the clients it was configured with.
pub(crate) struct CatalogueManager {
    base: BaseStandardExperimentManager,
    clients: Vec<Client>,
}

impl CatalogueManager {
    pub(crate) const fn new(engine: Engine) -> Self {
        Self {
            base: BaseStandardExperimentManager::new(engine),
            clients: Vec::new(),
        }
    }
}

impl ExperimentManager for CatalogueManager {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        self.base.get_engine_info()
    }

    fn validate_experiment_config(&self, config: &Value) -> Result<(), ExperimentError> {
        self.base.validate_experiment_config(config)
    }

    fn get_experiment_runner_config(&self, config: &Value) -> Result<Value, ExperimentError> {
        Ok(json!({"runner": config.clone()}))
    }

    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        Some(self)
    }
}

impl StandardExperimentManager for CatalogueManager {
    fn list_clients(&self) -> Result<Vec<Client>, ExperimentError> {
        Ok(self.clients.clone())
    }
}

impl ConfigurableExperimentManager for CatalogueManager {
    fn configure(&mut self, config: &Value) -> Result<(), ExperimentError> {
        if config.get("reject").is_some() {
            return Err(ExperimentError::engine("configuration rejected"));
        }
        self.clients = match config.get("clients") {
            Some(clients) => serde_json::from_value(clients.clone())
                .map_err(ExperimentError::invalid_config)?,
            None => Vec::new(),
        };
        Ok(())
    }
}

/// Runner treating the value of a configured header as the variant name.
///
/// The value `none` means no experiment applies.
#[derive(Default)]
pub(crate) struct HeaderRunner {
    unit_field: String,
}

impl ExperimentRunner for HeaderRunner {
    fn get_treatment_for_request(
        &self,
        header: &Header,
        payload: &[u8],
        options: &GetTreatmentOptions,
    ) -> Result<Option<Treatment>, ExperimentError> {
        let request = RequestFields::http(header, payload);
        let variant = extract(&FieldSource::Header, &self.unit_field, &request)?;
        if variant == "none" {
            return Ok(None);
        }
        Ok(Some(Treatment {
            experiment_name: "header-experiment".to_owned(),
            name: variant,
            config: json!({"request_id": options.turing_request_id}),
        }))
    }
}

impl ConfigurableExperimentRunner for HeaderRunner {
    fn configure(&mut self, config: &Value) -> Result<(), ExperimentError> {
        self.unit_field = config
            .get("unit_field")
            .and_then(Value::as_str)
            .unwrap_or("SessionID")
            .to_owned();
        Ok(())
    }
}

pub(crate) fn full_services() -> PluginServices {
    PluginServices::new()
        .with_manager(CatalogueManager::new(standard_engine("loopback")))
        .with_runner(HeaderRunner::default())
}

/// A client connected to `services` served on a background thread.
pub(crate) struct Loopback {
    pub(crate) client: PluginClient,
    pub(crate) server: JoinHandle<Result<(), ServeError>>,
}

pub(crate) fn loopback_with(
    services: PluginServices,
    plugin_handshake: HandshakeConfig,
    settings: &PluginSettings,
) -> io::Result<Result<Loopback, PluginError>> {
    let (host_reader, plugin_writer) = io::pipe()?;
    let (plugin_reader, host_writer) = io::pipe()?;
    let server = thread::spawn(move || {
        serve_with_io(services, &plugin_handshake, plugin_reader, plugin_writer)
    });
    Ok(
        PluginClient::establish("loopback", host_reader, host_writer, settings)
            .map(|client| Loopback { client, server }),
    )
}

pub(crate) fn loopback(services: PluginServices) -> Loopback {
    match loopback_with(services, HandshakeConfig::default(), &PluginSettings::default()) {
        Ok(Ok(connected)) => connected,
        Ok(Err(error)) => panic!("loopback handshake failed: {error}"),
        Err(error) => panic!("failed to create pipes: {error}"),
    }
}
