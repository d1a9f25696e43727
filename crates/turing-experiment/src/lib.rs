//! Experiment engine model for Turing routers.
//!
//! An experiment engine decides which treatment applies to an inference
//! request. Engines expose two capabilities:
//!
//! - an [`ExperimentManager`] describing the engine and validating the
//!   experiment configuration stored by Turing, optionally widened to a
//!   [`StandardExperimentManager`] for engines driven from the Turing UI;
//! - an [`ExperimentRunner`] resolving a [`Treatment`] for a live request.
//!
//! Compiled-in engines are looked up through a [`ManagerRegistry`] and a
//! [`RunnerRegistry`]. Engines running in a separate process are reached
//! through the `turing-plugins` crate, which decodes the same
//! [`EngineConfig`] to tell the two apart.
//!
//! # Example
//!
//! ```rust
//! use turing_experiment::{FieldSource, Header, RequestFields, extract};
//!
//! let header: Header = [("SessionID", "123")].into_iter().collect();
//! let payload = br#"{"customer": {"id": "test_customer"}}"#;
//! let request = RequestFields::http(&header, payload);
//!
//! let id = extract(&FieldSource::Payload, "customer.id", &request).expect("payload field");
//! assert_eq!(id, "test_customer");
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod request;
pub mod runner;

#[cfg(test)]
mod tests;

pub use self::config::{EngineConfig, PLUGIN_BINARY_KEY};
pub use self::error::{ExperimentError, ExtractionError};
pub use self::manager::{
    BaseExperimentManager, BaseStandardExperimentManager, Client, CustomExperimentManagerConfig,
    Engine, Experiment, ExperimentManager, ExperimentManagerType, FieldViolation, RemoteUi,
    StandardExperimentManager, StandardExperimentManagerConfig, TuringExperimentConfig,
    ValidationErrors, ValidationRule, Variable, VariableConfig, VariableType, Variables, Variant,
};
pub use self::registry::{Component, Constructor, ManagerRegistry, Registry, RunnerRegistry};
pub use self::request::{
    FieldSource, Header, NamedValue, RequestFields, RequestPart, ValueType, extract,
};
pub use self::runner::{ExperimentRunner, GetTreatmentOptions, Treatment};
