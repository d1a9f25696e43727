//! Errors raised by the plugin transport.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use turing_experiment::ExperimentError;

use crate::protocol::RemoteError;

/// Errors reading or writing framed messages.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The peer closed the stream between messages.
    #[error("connection closed by peer")]
    Closed,

    /// A frame carried no `Content-Length` header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// A header line could not be parsed.
    #[error("invalid header format")]
    InvalidHeader,

    /// A frame announced a body larger than the transport accepts.
    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Announced body length.
        length: usize,
        /// Maximum accepted body length.
        limit: usize,
    },
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

/// Errors raised on the host side of a plugin connection.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin binary does not exist.
    #[error("plugin binary not found: {}", binary.display())]
    BinaryNotFound {
        /// Binary that was launched.
        binary: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin binary could not be launched.
    #[error("failed to launch plugin binary '{}': {source}", binary.display())]
    Spawn {
        /// Binary that was launched.
        binary: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin answered the handshake with an incompatible version or
    /// cookie.
    #[error("plugin '{plugin}' failed the handshake: {message}")]
    HandshakeMismatch {
        /// Plugin name.
        plugin: String,
        /// Which field disagreed.
        message: String,
    },

    /// The plugin does not offer the requested service.
    #[error("plugin does not offer service \"{service}\"")]
    UnknownService {
        /// Requested service id.
        service: String,
    },

    /// The plugin offers the service under an unexpected interface.
    #[error("plugin service \"{service}\" implements {actual}, expected {expected}")]
    InterfaceMismatch {
        /// Service id.
        service: String,
        /// Interface the host requires.
        expected: &'static str,
        /// Interface the plugin advertised.
        actual: String,
    },

    /// The plugin did not answer in time.
    #[error("plugin '{plugin}' did not answer {operation} within {timeout:?}")]
    Timeout {
        /// Plugin name.
        plugin: String,
        /// Handshake or method name.
        operation: String,
        /// Configured limit.
        timeout: Duration,
    },

    /// The plugin process exited or closed its output.
    #[error("plugin '{plugin}' exited unexpectedly")]
    ProcessExited {
        /// Plugin name.
        plugin: String,
    },

    /// A frame could not be read or written.
    #[error("transport error talking to plugin '{plugin}': {source}")]
    Transport {
        /// Plugin name.
        plugin: String,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// A message could not be encoded or decoded.
    #[error("plugin message codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The plugin reported an error for the call.
    #[error("plugin returned {}: {}", .0.code, .0.message)]
    Remote(RemoteError),
}

impl From<PluginError> for ExperimentError {
    /// Remote validation and capability failures keep their domain variant;
    /// everything else is reported as a plugin failure.
    fn from(error: PluginError) -> Self {
        match error {
            PluginError::Remote(remote) => remote.into_experiment_error(),
            other => Self::Plugin(Box::new(other)),
        }
    }
}

/// Errors raised while serving services from a plugin process.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The process was not launched by a compatible host.
    #[error(
        "this binary is an experiment engine plugin and must be launched by the Turing engine host ({key} is missing or invalid)"
    )]
    Handshake {
        /// Environment variable carrying the magic cookie.
        key: String,
    },

    /// No service was supplied.
    #[error("a plugin must offer at least one service")]
    NoServices,

    /// Reading a request or writing a response failed.
    #[error("plugin transport error: {0}")]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error("plugin message codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests;
