//! Built-in defaults applied when no layer supplies a value.

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds allowed for a plugin binary to start and complete its handshake.
pub const DEFAULT_PLUGIN_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Seconds allowed for a single request/response round trip with a plugin.
pub const DEFAULT_PLUGIN_CALL_TIMEOUT_SECS: u64 = 30;

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log record encoding.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default plugin handshake timeout in seconds.
#[must_use]
pub const fn default_plugin_connect_timeout_secs() -> u64 {
    DEFAULT_PLUGIN_CONNECT_TIMEOUT_SECS
}

/// Default plugin call timeout in seconds.
#[must_use]
pub const fn default_plugin_call_timeout_secs() -> u64 {
    DEFAULT_PLUGIN_CALL_TIMEOUT_SECS
}
