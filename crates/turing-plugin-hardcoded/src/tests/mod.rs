//! Unit and behavioural tests for the hard-coded engine.


use std::collections::BTreeSet;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use turing_experiment::manager::adapter;
use turing_experiment::{
    Client, Component, Experiment, ExperimentError, ExperimentManager, ExperimentRunner,
    ExtractionError, GetTreatmentOptions, Header, ManagerRegistry, RunnerRegistry, Variant,
};
use turing_plugins::{ConfigurableExperimentManager, ConfigurableExperimentRunner};

use crate::{
    ENGINE_NAME, HardcodedManager, HardcodedRunner, RunnerConfig, assign, register, services,
};

pub(super) fn catalogue() -> Value {
    json!({
        "home_page_url": "https://xp.example",
        "clients": [
            {"id": "1", "username": "checkout"},
            {"id": "2", "username": "search"}
        ],
        "experiments": [
            {
                "id": "10",
                "name": "button-colour",
                "client_id": "1",
                "variants": [{"name": "control"}, {"name": "red"}, {"name": "green"}]
            },
            {
                "id": "20",
                "name": "ranking",
                "client_id": "2",
                "variants": [{"name": "control"}, {"name": "treatment"}]
            }
        ],
        "client_variables": {"1": [{"name": "country", "type": "filter"}]},
        "experiment_variables": {"10": [{"name": "session", "required": true, "type": "unit"}]}
    })
}

pub(super) fn experiment_config() -> Value {
    json!({
        "client": {"id": "1", "username": "checkout"},
        "experiments": [{"id": "10", "name": "button-colour", "client_id": "1"}],
        "variables": {
            "config": [
                {"name": "country", "field": "Country", "field_source": "header"},
                {"name": "session", "required": true, "field": "SessionID", "field_source": "header"}
            ]
        }
    })
}

#[fixture]
fn manager() -> HardcodedManager {
    HardcodedManager::from_config(&catalogue()).expect("catalogue decodes")
}

#[fixture]
fn runner(manager: HardcodedManager) -> HardcodedRunner {
    let config = manager
        .get_experiment_runner_config(&experiment_config())
        .expect("runner config");
    HardcodedRunner::from_config(&config).expect("runner config decodes")
}

fn session(id: &str) -> Header {
    [("SessionID", id)].into_iter().collect()
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[rstest]
fn register_exposes_both_components_in_process() {
    let managers = ManagerRegistry::default();
    let runners = RunnerRegistry::default();
    register(&managers, &runners).expect("register");

    let manager = managers.get(ENGINE_NAME, &catalogue()).expect("manager");
    let clients = adapter::list_clients(manager.as_ref()).expect("standard manager");
    assert_eq!(clients.len(), 2);
    assert!(runners.contains(ENGINE_NAME));
}

#[rstest]
fn registering_twice_is_rejected() {
    let managers = ManagerRegistry::default();
    let runners = RunnerRegistry::default();
    register(&managers, &runners).expect("first registration");

    let error = register(&managers, &runners).expect_err("duplicate");
    assert!(matches!(
        error,
        ExperimentError::DuplicateRegistration {
            component: Component::Manager,
            ..
        }
    ));
}

#[rstest]
fn plugin_services_offer_manager_and_runner() {
    assert!(!services().is_empty());
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

#[rstest]
fn engine_info_is_a_standard_engine_with_selection(manager: HardcodedManager) {
    let engine = manager.get_engine_info().expect("engine info");
    assert_eq!(engine.name, ENGINE_NAME);
    assert!(engine.is_standard());
    assert!(engine.client_selection_enabled());
    assert!(engine.experiment_selection_enabled());
    let home = engine
        .standard_experiment_manager_config
        .map(|config| config.home_page_url);
    assert_eq!(home.as_deref(), Some("https://xp.example"));
}

#[rstest]
fn experiments_are_filtered_by_client(manager: HardcodedManager) {
    let client = Client {
        id: "2".to_owned(),
        ..Client::default()
    };
    let experiments = adapter::list_experiments_for_client(&manager, &client).expect("listing");
    let names: Vec<&str> = experiments.iter().map(|experiment| experiment.name.as_str()).collect();
    assert_eq!(names, ["ranking"]);
}

#[rstest]
fn variables_are_listed_for_known_ids_only(manager: HardcodedManager) {
    let experiments = [
        Experiment {
            id: "10".to_owned(),
            ..Experiment::default()
        },
        Experiment {
            id: "99".to_owned(),
            ..Experiment::default()
        },
    ];
    let variables =
        adapter::list_variables_for_experiments(&manager, &experiments).expect("listing");
    assert_eq!(variables.keys().collect::<Vec<_>>(), ["10"]);

    let unknown = Client {
        id: "99".to_owned(),
        ..Client::default()
    };
    assert!(
        adapter::list_variables_for_client(&manager, &unknown)
            .expect("listing")
            .is_empty()
    );
}

#[rstest]
fn stored_configuration_passes_validation(manager: HardcodedManager) {
    manager
        .validate_experiment_config(&experiment_config())
        .expect("valid configuration");
}

#[rstest]
fn runner_config_uses_the_declared_unit_variable(manager: HardcodedManager) {
    let value = manager
        .get_experiment_runner_config(&experiment_config())
        .expect("runner config");
    let config: RunnerConfig = serde_json::from_value(value).expect("runner config decodes");

    let [assignment] = config.assignments.as_slice() else {
        panic!("expected one assignment, got {config:?}");
    };
    assert_eq!(assignment.experiment.variants.len(), 3);
    assert_eq!(assignment.unit.field, "SessionID");
}

#[rstest]
fn runner_config_rejects_unknown_experiments(manager: HardcodedManager) {
    let mut config = experiment_config();
    config["experiments"][0]["id"] = json!("404");

    let error = manager
        .get_experiment_runner_config(&config)
        .expect_err("unknown experiment");
    assert_eq!(error.to_string(), "unknown experiment \"404\"");
}

#[rstest]
fn runner_config_requires_a_variable_rule(manager: HardcodedManager) {
    let mut config = experiment_config();
    config["variables"]["config"] = json!([]);

    let error = manager
        .get_experiment_runner_config(&config)
        .expect_err("no rules");
    assert!(error.to_string().contains("no unit variable"), "{error}");
}

#[rstest]
fn configure_replaces_the_catalogue() {
    let mut manager = HardcodedManager::default();
    assert!(clients(&manager).is_empty());

    manager.configure(&catalogue()).expect("configure");
    assert_eq!(clients(&manager).len(), 2);

    let error = manager
        .configure(&json!({"clients": "not a list"}))
        .expect_err("malformed catalogue");
    assert!(matches!(error, ExperimentError::InvalidConfig(_)));
}

fn clients(manager: &HardcodedManager) -> Vec<Client> {
    adapter::list_clients(manager).expect("standard manager")
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[rstest]
fn the_same_unit_always_receives_the_same_variant(runner: HardcodedRunner) {
    let first = runner
        .get_treatment_for_request(&session("abc"), b"{}", &GetTreatmentOptions::new("r-1"))
        .expect("treatment")
        .expect("experiment applies");
    let second = runner
        .get_treatment_for_request(&session("abc"), b"{}", &GetTreatmentOptions::new("r-2"))
        .expect("treatment")
        .expect("experiment applies");

    assert_eq!(first.experiment_name, "button-colour");
    assert_eq!(first.name, second.name);
    assert_eq!(first.config["unit"], "abc");
    assert_eq!(second.config["turing_request_id"], "r-2");
}

#[rstest]
fn units_spread_over_every_variant(runner: HardcodedRunner) {
    let assigned: BTreeSet<String> = (0..200)
        .map(|unit| {
            runner
                .get_treatment_for_request(
                    &session(&format!("unit-{unit}")),
                    b"",
                    &GetTreatmentOptions::default(),
                )
                .expect("treatment")
                .expect("experiment applies")
                .name
        })
        .collect();
    assert_eq!(
        assigned,
        BTreeSet::from(["control".to_owned(), "green".to_owned(), "red".to_owned()])
    );
}

#[rstest]
fn missing_required_units_are_extraction_errors(runner: HardcodedRunner) {
    let error = runner
        .get_treatment_for_request(&Header::new(), b"", &GetTreatmentOptions::default())
        .expect_err("unit is required");
    assert!(matches!(
        error,
        ExperimentError::Extraction(ExtractionError::FieldNotFound { .. })
    ));
    assert_eq!(
        error.to_string(),
        "Field SessionID not found in the request header"
    );
}

#[rstest]
fn missing_optional_units_skip_the_experiment() {
    let runner = HardcodedRunner::from_config(&json!({
        "assignments": [{
            "experiment": {"name": "ranking", "variants": [{"name": "control"}]},
            "unit": {"name": "customer", "field": "customer.id", "field_source": "payload"}
        }]
    }))
    .expect("runner config decodes");

    let none = runner
        .get_treatment_for_request(&Header::new(), br#"{"other": 1}"#, &GetTreatmentOptions::default())
        .expect("no error");
    assert_eq!(none, None);

    let some = runner
        .get_treatment_for_request(
            &Header::new(),
            br#"{"customer": {"id": 42}}"#,
            &GetTreatmentOptions::default(),
        )
        .expect("no error")
        .expect("experiment applies");
    assert_eq!(some.name, "control");
    assert_eq!(some.config["unit"], "42");
}

#[rstest]
fn unconfigured_runners_assign_nothing() {
    let mut runner = HardcodedRunner::default();
    runner.configure(&Value::Null).expect("null config");
    let treatment = runner
        .get_treatment_for_request(&session("abc"), b"", &GetTreatmentOptions::default())
        .expect("no error");
    assert_eq!(treatment, None);
}

#[rstest]
fn experiments_without_variants_cannot_be_assigned() {
    let experiment = Experiment {
        name: "empty".to_owned(),
        ..Experiment::default()
    };
    assert_eq!(assign(&experiment, "abc"), None);

    let single = Experiment {
        name: "single".to_owned(),
        variants: vec![Variant {
            name: "only".to_owned(),
        }],
        ..Experiment::default()
    };
    assert_eq!(assign(&single, "abc").map(|variant| variant.name.as_str()), Some("only"));
}
