//! Behaviour-driven tests for standard configuration validation.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use crate::error::ExperimentError;
use crate::manager::{
    BaseExperimentManager, BaseStandardExperimentManager, Client, Engine, ExperimentManager,
    ExperimentManagerType, StandardExperimentManagerConfig, adapter,
};

#[derive(Default)]
struct TestWorld {
    manager: Option<Box<dyn ExperimentManager>>,
    outcome: Option<Result<(), ExperimentError>>,
    listing: Option<Result<Vec<Client>, ExperimentError>>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld::default()
}

fn standard(client_selection: bool, experiment_selection: bool) -> Box<dyn ExperimentManager> {
    Box::new(BaseStandardExperimentManager::new(Engine {
        name: "standard".to_owned(),
        kind: ExperimentManagerType::Standard,
        standard_experiment_manager_config: Some(StandardExperimentManagerConfig {
            client_selection_enabled: client_selection,
            experiment_selection_enabled: experiment_selection,
            home_page_url: String::new(),
        }),
        ..Engine::default()
    }))
}

fn manager(world: &TestWorld) -> &dyn ExperimentManager {
    world.manager.as_deref().expect("no engine configured")
}

fn validation_error(world: &TestWorld) -> &ExperimentError {
    world
        .outcome
        .as_ref()
        .expect("no validation attempted")
        .as_ref()
        .expect_err("expected validation to fail")
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a standard engine with experiment selection enabled")]
fn given_experiment_selection(world: &mut TestWorld) {
    world.manager = Some(standard(false, true));
}

#[given("a standard engine with client and experiment selection enabled")]
fn given_full_selection(world: &mut TestWorld) {
    world.manager = Some(standard(true, true));
}

#[given("a standard engine without selection")]
fn given_no_selection(world: &mut TestWorld) {
    world.manager = Some(standard(false, false));
}

#[given("a custom engine")]
fn given_custom_engine(world: &mut TestWorld) {
    world.manager = Some(Box::new(BaseExperimentManager::new(Engine {
        name: "custom".to_owned(),
        kind: ExperimentManagerType::Custom,
        ..Engine::default()
    })));
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the configuration {config} is validated")]
fn when_validated(world: &mut TestWorld, config: String) {
    let document: Value =
        serde_json::from_str(config.trim_matches('\'')).expect("configuration is JSON");
    let outcome = manager(world).validate_experiment_config(&document);
    world.outcome = Some(outcome);
}

#[when("its clients are listed through the adapter")]
fn when_clients_listed(world: &mut TestWorld) {
    let listing = adapter::list_clients(manager(world));
    world.listing = Some(listing);
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("validation fails with {message}")]
fn then_validation_message(world: &mut TestWorld, message: String) {
    assert_eq!(
        validation_error(world).to_string(),
        message.trim_matches('"')
    );
}

#[then("validation reports {path} breaking {rule}")]
fn then_violation(world: &mut TestWorld, path: String, rule: String) {
    let ExperimentError::Validation(errors) = validation_error(world) else {
        panic!("expected validation errors");
    };
    let expected_path = path.trim_matches('"');
    let expected_rule = rule.trim_matches('"');
    assert!(
        errors.violations().iter().any(|violation| {
            violation.path == expected_path && violation.rule.to_string() == expected_rule
        }),
        "no {expected_rule} violation at {expected_path}: {errors:?}"
    );
}

#[then("the adapter reports {message}")]
fn then_adapter_message(world: &mut TestWorld, message: String) {
    let error = world
        .listing
        .as_ref()
        .expect("no listing attempted")
        .as_ref()
        .expect_err("expected the adapter to refuse");
    assert!(matches!(error, ExperimentError::StandardMethodUnsupported));
    assert_eq!(error.to_string(), message.trim_matches('"'));
}

#[scenario(path = "tests/features/experiment_validation.feature")]
fn experiment_validation_behaviour(world: TestWorld) {
    let _ = world;
}
