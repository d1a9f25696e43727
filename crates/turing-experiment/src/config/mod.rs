//! Decoding of engine configuration blocks.
//!
//! A configuration block is a JSON object. The reserved key
//! [`PLUGIN_BINARY_KEY`] selects an out-of-process engine; every other key is
//! engine-specific and passed through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExperimentError;

/// Reserved key naming the plugin binary of an out-of-process engine.
pub const PLUGIN_BINARY_KEY: &str = "plugin_binary";

/// Decoded engine configuration.
///
/// Keys are held in sorted maps, so the JSON serialisation of equal configs is
/// byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    plugin_binary: String,
    engine_configuration: BTreeMap<String, Value>,
}

impl EngineConfig {
    /// Creates a configuration from its parts.
    #[must_use]
    pub fn new(
        plugin_binary: impl Into<String>,
        engine_configuration: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            plugin_binary: plugin_binary.into(),
            engine_configuration,
        }
    }

    /// Splits a raw block into the plugin binary and pass-through keys.
    ///
    /// A `null` plugin binary is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::TypeMismatch`] when
    /// [`PLUGIN_BINARY_KEY`] holds anything other than a string.
    pub fn decode(raw: &Map<String, Value>) -> Result<Self, ExperimentError> {
        let mut plugin_binary = String::new();
        let mut engine_configuration = BTreeMap::new();
        for (key, value) in raw {
            if key != PLUGIN_BINARY_KEY {
                engine_configuration.insert(key.clone(), value.clone());
                continue;
            }
            match value {
                Value::String(binary) => plugin_binary.clone_from(binary),
                Value::Null => {}
                other => {
                    return Err(ExperimentError::TypeMismatch {
                        key: key.clone(),
                        expected: "string",
                        actual: format!("{} {other}", json_type(other)),
                    });
                }
            }
        }
        Ok(Self {
            plugin_binary,
            engine_configuration,
        })
    }

    /// Returns `true` when the engine runs in a plugin process.
    #[must_use]
    pub fn is_plugin(&self) -> bool {
        !self.plugin_binary.is_empty()
    }

    /// Returns the plugin binary path, empty for in-process engines.
    #[must_use]
    pub fn plugin_binary(&self) -> &str {
        &self.plugin_binary
    }

    /// Returns the pass-through keys.
    #[must_use]
    pub const fn engine_configuration(&self) -> &BTreeMap<String, Value> {
        &self.engine_configuration
    }

    /// Rebuilds the JSON object handed to the engine's own configuration.
    #[must_use]
    pub fn raw_engine_config(&self) -> Value {
        Value::Object(
            self.engine_configuration
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
