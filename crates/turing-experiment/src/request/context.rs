//! Typed prediction-context variables carried by binary requests.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RequestPart, not_found};
use crate::error::ExtractionError;

/// Type tag of a [`NamedValue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    /// Rendered from `double_value`.
    Double,
    /// Rendered from `integer_value`.
    Integer,
    /// Rendered from `string_value`.
    String,
    /// A tag this runtime cannot render.
    Unknown(String),
}

impl From<String> for ValueType {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "double" => Self::Double,
            "integer" => Self::Integer,
            "string" => Self::String,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<ValueType> for String {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Unknown(tag) => tag,
            known => known.to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double => f.write_str("double"),
            Self::Integer => f.write_str("integer"),
            Self::String => f.write_str("string"),
            Self::Unknown(tag) => f.write_str(tag),
        }
    }
}

/// One named, typed variable of a prediction context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    /// Variable name.
    pub name: String,
    /// Which of the value fields is meaningful.
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Value when `value_type` is double.
    #[serde(default)]
    pub double_value: f64,
    /// Value when `value_type` is integer.
    #[serde(default)]
    pub integer_value: i64,
    /// Value when `value_type` is string.
    #[serde(default)]
    pub string_value: String,
}

impl NamedValue {
    /// Creates a double-typed variable.
    #[must_use]
    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self {
            double_value: value,
            ..Self::empty(name, ValueType::Double)
        }
    }

    /// Creates an integer-typed variable.
    #[must_use]
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self {
            integer_value: value,
            ..Self::empty(name, ValueType::Integer)
        }
    }

    /// Creates a string-typed variable.
    #[must_use]
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            string_value: value.into(),
            ..Self::empty(name, ValueType::String)
        }
    }

    fn empty(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            double_value: 0.0,
            integer_value: 0,
            string_value: String::new(),
        }
    }

    /// Renders the value selected by the type tag.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnknownValueType`] for an unknown tag.
    pub fn render(&self) -> Result<String, ExtractionError> {
        match &self.value_type {
            ValueType::Double => Ok(self.double_value.to_string()),
            ValueType::Integer => Ok(self.integer_value.to_string()),
            ValueType::String => Ok(self.string_value.clone()),
            ValueType::Unknown(tag) => Err(ExtractionError::UnknownValueType {
                field: self.name.clone(),
                value_type: tag.clone(),
            }),
        }
    }
}

pub(super) fn extract(field: &str, values: &[NamedValue]) -> Result<String, ExtractionError> {
    values
        .iter()
        .find(|value| value.name == field)
        .ok_or_else(|| not_found(field, RequestPart::PredictionContext))?
        .render()
}
