//! Errors raised by experiment engines and the helpers around them.
//!
//! [`ExtractionError`] covers reading request fields; [`ExperimentError`] is
//! the error type of every manager and runner operation. Both carry
//! structured fields so callers and the plugin transport can map them without
//! parsing messages.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::manager::ValidationErrors;
use crate::registry::Component;
use crate::request::RequestPart;

/// Failures while reading a named field out of an inference request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The field is absent from the selected part of the request.
    #[error("Field {field} not found in the request {part}")]
    FieldNotFound {
        /// Header name, payload path, or context variable that was requested.
        field: String,
        /// Request part that was searched.
        part: RequestPart,
    },

    /// The payload could not be interpreted as a JSON document.
    #[error("Field {field} could not be read from the request payload: {reason}")]
    UnsupportedType {
        /// Payload path that was requested.
        field: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// A prediction-context value carries a type tag that cannot be rendered.
    #[error("Field {field} in the request prediction context has unknown value type {value_type}")]
    UnknownValueType {
        /// Context variable name.
        field: String,
        /// Tag found on the variable.
        value_type: String,
    },

    /// The field source tag is not one of the known request parts.
    #[error("Unrecognized field source {tag}")]
    UnrecognizedSource {
        /// Tag that was supplied.
        tag: String,
    },
}

/// Errors returned by experiment managers, runners, and the registry.
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// A request field could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The manager does not provide the standard capability set.
    #[error("Method is only supported by standard experiment managers")]
    StandardMethodUnsupported,

    /// The experiment configuration failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// An engine configuration key carried a value of the wrong type.
    #[error("engine configuration key \"{key}\" must be a {expected}, found {actual}")]
    TypeMismatch {
        /// Offending key.
        key: String,
        /// Expected JSON type.
        expected: &'static str,
        /// JSON type and value that were found.
        actual: String,
    },

    /// A second constructor was registered under an existing name.
    #[error("{component} \"{name}\" is already registered")]
    DuplicateRegistration {
        /// Registry the name was registered in.
        component: Component,
        /// Engine name.
        name: String,
    },

    /// No constructor is registered under the requested name.
    #[error("no {component} found for name \"{name}\"")]
    NotFound {
        /// Registry that was searched.
        component: Component,
        /// Engine name.
        name: String,
    },

    /// A configuration document could not be decoded into the expected shape.
    #[error("invalid experiment configuration: {0}")]
    InvalidConfig(#[source] Arc<serde_json::Error>),

    /// An engine-specific failure described by the engine itself.
    #[error("{message}")]
    Engine {
        /// Message reported by the engine.
        message: String,
    },

    /// The plugin transport failed while servicing the call.
    #[error(transparent)]
    Plugin(Box<dyn StdError + Send + Sync>),
}

impl ExperimentError {
    /// Creates an engine-specific error from a message.
    #[must_use]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Wraps a JSON decoding failure.
    #[must_use]
    pub fn invalid_config(error: serde_json::Error) -> Self {
        Self::InvalidConfig(Arc::new(error))
    }
}
