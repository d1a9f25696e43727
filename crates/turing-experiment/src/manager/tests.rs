//! Unit tests for the manager capability model, adapters, and validation.

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::adapter;
use super::*;
use crate::request::FieldSource;

fn standard_engine(client_selection: bool, experiment_selection: bool) -> Engine {
    Engine {
        name: "proprietary".to_owned(),
        display_name: "Proprietary".to_owned(),
        kind: ExperimentManagerType::Standard,
        standard_experiment_manager_config: Some(StandardExperimentManagerConfig {
            client_selection_enabled: client_selection,
            experiment_selection_enabled: experiment_selection,
            home_page_url: String::new(),
        }),
        custom_experiment_manager_config: None,
    }
}

fn custom_engine() -> Engine {
    Engine {
        name: "bespoke".to_owned(),
        kind: ExperimentManagerType::Custom,
        custom_experiment_manager_config: Some(CustomExperimentManagerConfig {
            remote_ui: RemoteUi {
                name: "bespoke_ui".to_owned(),
                url: "http://ui.example/remote.js".to_owned(),
                config: None,
            },
            experiment_config_schema: None,
        }),
        ..Engine::default()
    }
}

/// Declares the standard type but never exposes the wider capability.
struct StandardTypeOnly;

impl ExperimentManager for StandardTypeOnly {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        Ok(standard_engine(false, false))
    }

    fn validate_experiment_config(&self, _config: &Value) -> Result<(), ExperimentError> {
        Ok(())
    }

    fn get_experiment_runner_config(&self, _config: &Value) -> Result<Value, ExperimentError> {
        Ok(Value::Null)
    }
}

/// Exposes the wider capability but fails to describe itself.
struct BrokenInfo;

impl ExperimentManager for BrokenInfo {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        Err(ExperimentError::engine("engine offline"))
    }

    fn validate_experiment_config(&self, _config: &Value) -> Result<(), ExperimentError> {
        Ok(())
    }

    fn get_experiment_runner_config(&self, _config: &Value) -> Result<Value, ExperimentError> {
        Ok(Value::Null)
    }

    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        Some(self)
    }
}

impl StandardExperimentManager for BrokenInfo {}

/// Standard manager overriding one listing.
struct WithClients {
    base: BaseStandardExperimentManager,
}

impl ExperimentManager for WithClients {
    fn get_engine_info(&self) -> Result<Engine, ExperimentError> {
        self.base.get_engine_info()
    }

    fn validate_experiment_config(&self, config: &Value) -> Result<(), ExperimentError> {
        self.base.validate_experiment_config(config)
    }

    fn get_experiment_runner_config(&self, config: &Value) -> Result<Value, ExperimentError> {
        self.base.get_experiment_runner_config(config)
    }

    fn as_standard(&self) -> Option<&dyn StandardExperimentManager> {
        Some(self)
    }
}

impl StandardExperimentManager for WithClients {
    fn list_clients(&self) -> Result<Vec<Client>, ExperimentError> {
        Ok(vec![Client {
            id: "1".to_owned(),
            username: "alice".to_owned(),
            passkey: String::new(),
        }])
    }
}

fn assert_unsupported<T: std::fmt::Debug>(result: Result<T, ExperimentError>) {
    match result {
        Err(ExperimentError::StandardMethodUnsupported) => {}
        other => panic!("expected StandardMethodUnsupported, got {other:?}"),
    }
}

fn assert_every_adapter_degrades(manager: &dyn ExperimentManager) {
    let client = Client::default();
    assert!(!adapter::is_standard_experiment_manager(manager));
    assert_unsupported(adapter::is_cache_enabled(manager));
    assert_unsupported(adapter::list_clients(manager));
    assert_unsupported(adapter::list_experiments(manager));
    assert_unsupported(adapter::list_experiments_for_client(manager, &client));
    assert_unsupported(adapter::list_variables_for_client(manager, &client));
    assert_unsupported(adapter::list_variables_for_experiments(manager, &[]));
}

// ---------------------------------------------------------------------------
// Adapter degradation
// ---------------------------------------------------------------------------

#[test]
fn custom_engines_degrade_through_every_adapter() {
    let manager = BaseExperimentManager::new(custom_engine());
    assert_every_adapter_degrades(&manager);
}

#[test]
fn standard_type_without_capability_degrades() {
    assert_every_adapter_degrades(&StandardTypeOnly);
}

#[test]
fn engine_info_failure_degrades() {
    assert_every_adapter_degrades(&BrokenInfo);
}

#[test]
fn degraded_results_fall_back_to_zero_values() {
    let manager = BaseExperimentManager::new(custom_engine());
    assert!(adapter::list_clients(&manager).unwrap_or_default().is_empty());
    assert!(!adapter::is_cache_enabled(&manager).unwrap_or_default());
}

#[test]
fn standard_base_supplies_no_op_defaults() {
    let manager = BaseStandardExperimentManager::new(standard_engine(true, true));
    assert!(adapter::is_standard_experiment_manager(&manager));
    assert!(adapter::is_cache_enabled(&manager).expect("cache flag"));
    assert!(adapter::list_clients(&manager).expect("clients").is_empty());
    assert!(adapter::list_experiments(&manager).expect("experiments").is_empty());
    assert!(
        adapter::list_variables_for_experiments(&manager, &[])
            .expect("variables")
            .is_empty()
    );
}

#[test]
fn adapters_delegate_to_overrides() {
    let manager = WithClients {
        base: BaseStandardExperimentManager::new(standard_engine(false, false)),
    };
    let clients = adapter::list_clients(&manager).expect("clients");
    let client = clients.first().expect("one client");
    assert_eq!(client.username, "alice");
    assert!(
        adapter::list_experiments_for_client(&manager, client)
            .expect("experiments")
            .is_empty()
    );
}

#[test]
fn minimal_base_passes_everything_through() {
    let manager = BaseExperimentManager::new(custom_engine());
    manager
        .validate_experiment_config(&json!({"anything": true}))
        .expect("pass-through validation");
    assert_eq!(
        manager
            .get_experiment_runner_config(&json!({}))
            .expect("runner config"),
        Value::Null
    );
}

// ---------------------------------------------------------------------------
// Standard validation
// ---------------------------------------------------------------------------

#[fixture]
fn valid_config() -> Value {
    json!({
        "client": {"id": "1", "username": "alice"},
        "experiments": [{"id": "10", "name": "exp-a", "client_id": "1"}],
        "variables": {
            "client_variables": [{"name": "country", "required": true, "type": "filter"}],
            "experiment_variables": {"10": [{"name": "customer", "required": true, "type": "unit"}]},
            "config": [
                {"name": "customer", "required": true, "field": "customer.id", "field_source": "payload"},
                {"name": "country", "required": false, "field": "", "field_source": "header"}
            ]
        }
    })
}

fn validate(engine: Engine, config: &Value) -> Result<(), ExperimentError> {
    BaseStandardExperimentManager::new(engine).validate_experiment_config(config)
}

fn violations(result: Result<(), ExperimentError>) -> ValidationErrors {
    match result {
        Err(ExperimentError::Validation(errors)) => errors,
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[rstest]
fn accepts_a_complete_configuration(valid_config: Value) {
    validate(standard_engine(true, true), &valid_config).expect("valid configuration");
}

#[test]
fn rejects_missing_experiments_when_selection_enabled() {
    let errors = violations(validate(standard_engine(false, true), &json!({})));
    assert_eq!(
        errors.to_string(),
        "Expected at least 1 experiment in the configuration"
    );
    assert!(errors.contains("experiments", ValidationRule::NoExperimentSelected));
}

#[rstest]
fn rejects_experiments_of_another_client(mut valid_config: Value) {
    valid_config["experiments"][0]["client_id"] = json!("2");
    let errors = violations(validate(standard_engine(true, true), &valid_config));
    assert_eq!(errors.violations().len(), 1);
    assert!(errors.contains("experiments[0].client_id", ValidationRule::ClientIdMismatch));
}

#[rstest]
fn client_ids_are_not_compared_without_client_selection(mut valid_config: Value) {
    valid_config["experiments"][0]["client_id"] = json!("2");
    validate(standard_engine(false, true), &valid_config).expect("no client comparison");
}

#[rstest]
fn precheck_runs_before_structural_rules(mut valid_config: Value) {
    valid_config["experiments"] = json!([]);
    valid_config["client"] = json!({});
    let errors = violations(validate(standard_engine(true, true), &valid_config));
    assert_eq!(errors.violations().len(), 1);
    assert!(errors.contains("experiments", ValidationRule::NoExperimentSelected));
}

#[rstest]
fn collects_every_structural_violation(mut valid_config: Value) {
    valid_config["client"] = json!({"id": "1"});
    valid_config["experiments"] = json!([{"client_id": "1"}]);
    valid_config["variables"]["config"] = json!([
        {"name": "", "required": true, "field": "", "field_source": "cookie"}
    ]);
    let errors = violations(validate(standard_engine(true, true), &valid_config));

    assert!(errors.contains("client.username", ValidationRule::Required));
    assert!(errors.contains("experiments[0].name", ValidationRule::Required));
    assert!(errors.contains("variables.config[0].name", ValidationRule::Required));
    assert!(errors.contains("variables.config[0].field", ValidationRule::RequiredWith));
    assert!(errors.contains("variables.config[0].field_source", ValidationRule::FieldSource));
    assert_eq!(errors.violations().len(), 5);
}

#[rstest]
fn disabled_sections_are_not_validated(mut valid_config: Value) {
    valid_config["client"] = json!({});
    valid_config["experiments"] = json!([{"name": ""}]);
    validate(standard_engine(false, false), &valid_config).expect("sections skipped");
}

#[rstest]
fn variables_are_always_validated(mut valid_config: Value) {
    valid_config["variables"]["config"][1]["field_source"] = json!("cookie");
    let errors = violations(validate(standard_engine(false, false), &valid_config));
    assert!(errors.contains("variables.config[1].field_source", ValidationRule::FieldSource));
}

#[rstest]
fn omitted_field_source_is_rejected(mut valid_config: Value) {
    valid_config["variables"]["config"] = json!([
        {"name": "customer", "required": true, "field": "customer.id"}
    ]);
    let errors = violations(validate(standard_engine(true, true), &valid_config));
    assert!(errors.contains("variables.config[0].field_source", ValidationRule::FieldSource));
    assert_eq!(errors.violations().len(), 1);
}

#[test]
fn omitted_field_source_decodes_as_empty_tag() {
    let rule: VariableConfig =
        serde_json::from_value(json!({"name": "customer", "field": "customer.id"}))
            .expect("rule decodes");
    assert_eq!(rule.field_source, FieldSource::Unrecognized(String::new()));
}

#[test]
fn malformed_documents_are_invalid_config() {
    let result = validate(standard_engine(false, false), &json!({"experiments": "none"}));
    assert!(matches!(result, Err(ExperimentError::InvalidConfig(_))));
}

#[test]
fn validation_errors_round_trip_through_json() {
    let errors = ValidationErrors::new(vec![FieldViolation {
        path: "client.id".to_owned(),
        rule: ValidationRule::FieldSource,
        message: "bad".to_owned(),
    }]);
    let encoded = serde_json::to_value(&errors).expect("serialise");
    assert_eq!(encoded["violations"][0]["rule"], json!("field-src"));
    let decoded: ValidationErrors = serde_json::from_value(encoded).expect("deserialise");
    assert_eq!(decoded, errors);
}
