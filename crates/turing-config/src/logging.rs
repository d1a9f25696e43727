//! Log output settings shared by the engine host and plugin binaries.
//!
//! Plugin processes reserve stdout for the RPC channel, so every format
//! defined here is written to stderr. The host relays plugin stderr lines
//! into its own subscriber, which is why JSON is the default: relayed
//! records stay machine-readable end to end.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported log record encodings.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event.
    #[default]
    Json,
    /// Single-line human-readable output for interactive use.
    Compact,
}

impl LogFormat {
    /// Returns `true` when records are emitted as JSON objects.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}
