//! Crate-level behaviour tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::client::PluginClient;
use crate::error::PluginError;
use crate::factory::PluginConnector;
use crate::protocol::HandshakeConfig;
use crate::settings::PluginSettings;
use crate::test_support::{full_services, loopback_with};


/// Connector serving every "binary" from an in-process loopback plugin.
///
/// Binaries named `missing` fail as if absent; binaries named `outdated`
/// answer with a newer protocol version.
#[derive(Default, Clone)]
struct LoopbackConnector {
    connects: Arc<AtomicUsize>,
}

impl LoopbackConnector {
    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl PluginConnector for LoopbackConnector {
    fn connect(&self, binary: &str, settings: &PluginSettings) -> Result<PluginClient, PluginError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if binary.ends_with("missing") {
            return PluginClient::connect(format!("/nonexistent/{binary}"), settings);
        }
        let defaults = HandshakeConfig::default();
        let version = if binary.ends_with("outdated") {
            defaults.protocol_version() + 1
        } else {
            defaults.protocol_version()
        };
        let plugin_handshake = HandshakeConfig::new(
            version,
            defaults.magic_cookie_key(),
            defaults.magic_cookie_value(),
        );
        let connected = loopback_with(full_services(), plugin_handshake, settings)
            .map_err(|source| PluginError::Transport {
                plugin: binary.to_owned(),
                source: source.into(),
            })?;
        connected.map(|loopback| loopback.client)
    }
}
