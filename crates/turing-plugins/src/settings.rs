//! Connection settings for plugin processes.

use std::time::Duration;

use turing_config::{
    Config, DEFAULT_PLUGIN_CALL_TIMEOUT_SECS, DEFAULT_PLUGIN_CONNECT_TIMEOUT_SECS,
};

use crate::protocol::HandshakeConfig;

/// Handshake parameters and time limits used when talking to a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
    handshake: HandshakeConfig,
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl PluginSettings {
    /// Derives settings from the runtime configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            handshake: HandshakeConfig::default(),
            connect_timeout: config.plugin_connect_timeout(),
            call_timeout: config.plugin_call_timeout(),
        }
    }

    /// Replaces the handshake parameters.
    #[must_use]
    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }

    /// Replaces the time allowed for the plugin to send its handshake.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replaces the time allowed for each call.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Handshake parameters.
    #[must_use]
    pub const fn handshake(&self) -> &HandshakeConfig {
        &self.handshake
    }

    /// Time allowed for the handshake.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Time allowed for each call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::default(),
            connect_timeout: Duration::from_secs(DEFAULT_PLUGIN_CONNECT_TIMEOUT_SECS),
            call_timeout: Duration::from_secs(DEFAULT_PLUGIN_CALL_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn timeouts_follow_the_runtime_configuration() {
        let config = Config {
            plugin_connect_timeout_secs: 2,
            plugin_call_timeout_secs: 7,
            ..Config::default()
        };
        let settings = PluginSettings::from_config(&config);
        assert_eq!(settings.connect_timeout(), Duration::from_secs(2));
        assert_eq!(settings.call_timeout(), Duration::from_secs(7));
        assert_eq!(settings.handshake(), &HandshakeConfig::default());
    }

    #[rstest]
    fn defaults_match_the_default_configuration() {
        assert_eq!(
            PluginSettings::default(),
            PluginSettings::from_config(&Config::default())
        );
    }

    #[rstest]
    fn builders_replace_individual_values() {
        let handshake = HandshakeConfig::new(9, "KEY", "value");
        let settings = PluginSettings::default()
            .with_handshake(handshake.clone())
            .with_call_timeout(Duration::from_millis(50));
        assert_eq!(settings.handshake(), &handshake);
        assert_eq!(settings.call_timeout(), Duration::from_millis(50));
        assert_eq!(
            settings.connect_timeout(),
            Duration::from_secs(DEFAULT_PLUGIN_CONNECT_TIMEOUT_SECS)
        );
    }
}
