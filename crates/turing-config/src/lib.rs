//! Layered runtime configuration for Turing experiment-engine processes.
//!
//! [`Config`] is resolved by `ortho_config` from, in increasing precedence,
//! built-in defaults, configuration files, `TURING_*` environment
//! variables, and command-line flags. The same structure is loaded by the
//! engine host and by plugin binaries so both sides agree on log output and
//! plugin timeouts.
//!
//! ```no_run
//! use ortho_config::OrthoConfig;
//! use turing_config::Config;
//!
//! let config = Config::load().expect("configuration loads");
//! assert!(!config.log_filter().is_empty());
//! ```

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PLUGIN_CALL_TIMEOUT_SECS, DEFAULT_PLUGIN_CONNECT_TIMEOUT_SECS,
    default_log_filter, default_log_filter_string, default_log_format,
    default_plugin_call_timeout_secs, default_plugin_connect_timeout_secs,
};
pub use self::logging::LogFormat;

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TURING")]
pub struct Config {
    /// `tracing` filter directive, e.g. `info` or `turing_plugins=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Encoding used for log records.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Seconds a plugin binary may take to start and complete its handshake.
    #[serde(default = "default_plugin_connect_timeout_secs")]
    #[ortho_config(default = default_plugin_connect_timeout_secs())]
    pub plugin_connect_timeout_secs: u64,
    /// Seconds a single plugin call may take before it is abandoned.
    #[serde(default = "default_plugin_call_timeout_secs")]
    #[ortho_config(default = default_plugin_call_timeout_secs())]
    pub plugin_call_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            plugin_connect_timeout_secs: default_plugin_connect_timeout_secs(),
            plugin_call_timeout_secs: default_plugin_call_timeout_secs(),
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the plugin handshake timeout.
    #[must_use]
    pub const fn plugin_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_connect_timeout_secs)
    }

    /// Returns the per-call plugin timeout.
    #[must_use]
    pub const fn plugin_call_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_call_timeout_secs)
    }
}
