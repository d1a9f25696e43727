//! Unit tests for plugin error types.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::protocol::RemoteErrorCode;

#[test]
fn binary_not_found_names_the_binary() {
    let error = PluginError::BinaryNotFound {
        binary: PathBuf::from("/opt/engines/xp-plugin"),
        source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
    };
    let message = error.to_string();
    assert!(
        message.contains("/opt/engines/xp-plugin"),
        "expected binary in message: {message}"
    );
}

#[rstest]
#[case::timeout(
    PluginError::Timeout {
        plugin: "slow".into(),
        operation: "Plugin.ListClients".into(),
        timeout: Duration::from_secs(3),
    },
    "Plugin.ListClients"
)]
#[case::handshake(
    PluginError::HandshakeMismatch {
        plugin: "old".into(),
        message: "protocol version 2 does not match expected version 1".into(),
    },
    "protocol version 2"
)]
#[case::interface(
    PluginError::InterfaceMismatch {
        service: "experiment_runner".into(),
        expected: "ConfigurableExperimentRunner",
        actual: "Runner".into(),
    },
    "ConfigurableExperimentRunner"
)]
#[case::exited(PluginError::ProcessExited { plugin: "crashy".into() }, "crashy")]
fn error_message_includes_context(#[case] error: PluginError, #[case] expected: &str) {
    let message = error.to_string();
    assert!(
        message.contains(expected),
        "expected '{expected}' in message: {message}"
    );
}

#[test]
fn io_errors_convert_into_transport_errors() {
    let error = TransportError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
    assert!(matches!(error, TransportError::Io(_)));
    assert!(error.to_string().contains("pipe closed"));
}

#[test]
fn remote_standard_method_errors_map_to_the_domain_variant() {
    let error = PluginError::Remote(RemoteError::new(
        RemoteErrorCode::StandardMethod,
        "Method is only supported by standard experiment managers",
    ));
    assert!(matches!(
        ExperimentError::from(error),
        ExperimentError::StandardMethodUnsupported
    ));
}

#[test]
fn transport_failures_map_to_plugin_errors() {
    let error = PluginError::ProcessExited {
        plugin: "crashy".into(),
    };
    let converted = ExperimentError::from(error);
    assert!(matches!(converted, ExperimentError::Plugin(_)));
    assert_eq!(converted.to_string(), "plugin 'crashy' exited unexpectedly");
}

#[test]
fn serve_handshake_error_names_the_cookie_key() {
    let error = ServeError::Handshake {
        key: "TURING_EXPERIMENT_ENGINE_PLUGIN".into(),
    };
    assert!(error.to_string().contains("TURING_EXPERIMENT_ENGINE_PLUGIN"));
}
