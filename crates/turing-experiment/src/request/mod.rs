//! Reading named fields out of inference requests.
//!
//! Experiment variables are configured with a [`FieldSource`] and a field
//! name. [`extract`] resolves that pair against a [`RequestFields`] view of
//! the request and returns the value as text:
//!
//! - `header`: case-insensitive header lookup; repeated headers are joined
//!   with `,`.
//! - `payload`: dot-separated path into the JSON body. Numeric segments and
//!   `[n]` suffixes index arrays.
//! - `prediction_context`: typed name/value variables supplied by binary
//!   (UPI) requests.
//!
//! Extraction is pure and may be called from any thread.

mod context;
mod header;
mod payload;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::ExtractionError;

pub use self::context::{NamedValue, ValueType};
pub use self::header::Header;

/// Part of the request a field is read from.
///
/// Unknown tags are preserved in [`FieldSource::Unrecognized`] so stored
/// configuration round-trips and validation can report the offending value.
/// The default is the empty tag, which no extraction accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldSource {
    /// HTTP request header.
    Header,
    /// JSON request body.
    Payload,
    /// Typed prediction-context variables.
    PredictionContext,
    /// Any other tag.
    Unrecognized(String),
}

impl FieldSource {
    /// Returns the wire tag for this source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Header => "header",
            Self::Payload => "payload",
            Self::PredictionContext => "prediction_context",
            Self::Unrecognized(tag) => tag.as_str(),
        }
    }

    /// Returns `true` for the three known request parts.
    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<&str> for FieldSource {
    fn from(tag: &str) -> Self {
        match tag {
            "header" => Self::Header,
            "payload" => Self::Payload,
            "prediction_context" => Self::PredictionContext,
            other => Self::Unrecognized(other.to_owned()),
        }
    }
}

impl Default for FieldSource {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl From<String> for FieldSource {
    fn from(tag: String) -> Self {
        match Self::from(tag.as_str()) {
            Self::Unrecognized(_) => Self::Unrecognized(tag),
            known => known,
        }
    }
}

impl From<FieldSource> for String {
    fn from(source: FieldSource) -> Self {
        match source {
            FieldSource::Unrecognized(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for FieldSource {
    type Err = ExtractionError;

    /// Parses a known tag, rejecting anything else.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match Self::from(tag) {
            Self::Unrecognized(_) => Err(ExtractionError::UnrecognizedSource {
                tag: tag.to_owned(),
            }),
            known => Ok(known),
        }
    }
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request part named in extraction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RequestPart {
    /// Header map.
    #[strum(serialize = "header")]
    Header,
    /// JSON body.
    #[strum(serialize = "payload")]
    Payload,
    /// Prediction-context variables.
    #[strum(serialize = "prediction context")]
    PredictionContext,
}

/// Borrowed view of the parts of a request that fields can be read from.
///
/// HTTP requests supply a header and a payload; binary requests supply a
/// prediction context. Parts that are absent behave as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFields<'a> {
    header: Option<&'a Header>,
    payload: Option<&'a [u8]>,
    prediction_context: Option<&'a [NamedValue]>,
}

impl<'a> RequestFields<'a> {
    /// View over an HTTP request.
    #[must_use]
    pub const fn http(header: &'a Header, payload: &'a [u8]) -> Self {
        Self {
            header: Some(header),
            payload: Some(payload),
            prediction_context: None,
        }
    }

    /// View over the prediction context of a binary request.
    #[must_use]
    pub const fn prediction_context(values: &'a [NamedValue]) -> Self {
        Self {
            header: None,
            payload: None,
            prediction_context: Some(values),
        }
    }

    /// Adds or replaces the header.
    #[must_use]
    pub const fn with_header(mut self, header: &'a Header) -> Self {
        self.header = Some(header);
        self
    }

    /// Adds or replaces the payload.
    #[must_use]
    pub const fn with_payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds or replaces the prediction context.
    #[must_use]
    pub const fn with_prediction_context(mut self, values: &'a [NamedValue]) -> Self {
        self.prediction_context = Some(values);
        self
    }
}

/// Reads `field` from the request part selected by `source`.
///
/// # Errors
///
/// Returns [`ExtractionError::FieldNotFound`] when the field is absent,
/// [`ExtractionError::UnsupportedType`] when the payload is not JSON,
/// [`ExtractionError::UnknownValueType`] for an unrenderable context value,
/// and [`ExtractionError::UnrecognizedSource`] for an unknown source tag.
pub fn extract(
    source: &FieldSource,
    field: &str,
    request: &RequestFields<'_>,
) -> Result<String, ExtractionError> {
    match source {
        FieldSource::Header => request
            .header
            .and_then(|header| header.get(field))
            .ok_or_else(|| not_found(field, RequestPart::Header)),
        FieldSource::Payload => payload::extract(field, request.payload.unwrap_or_default()),
        FieldSource::PredictionContext => {
            context::extract(field, request.prediction_context.unwrap_or_default())
        }
        FieldSource::Unrecognized(tag) => Err(ExtractionError::UnrecognizedSource {
            tag: tag.clone(),
        }),
    }
}

fn not_found(field: &str, part: RequestPart) -> ExtractionError {
    ExtractionError::FieldNotFound {
        field: field.to_owned(),
        part,
    }
}
