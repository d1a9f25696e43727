//! Out-of-process experiment engines for Turing.
//!
//! Experiment engines may be compiled into the host or shipped as separate
//! plugin binaries. This crate provides both halves of the plugin transport
//! and the factory that hides the difference from callers.
//!
//! # Architecture
//!
//! The host launches a plugin binary with the magic cookie in its environment
//! and talks to it over stdin/stdout using `Content-Length` framed JSON
//! ([`transport`]). The plugin announces itself with a [`Handshake`] listing
//! the services it offers; the host refuses plugins whose protocol version or
//! cookie differ from its own. Afterwards every manager or runner call is one
//! [`RpcRequest`]/[`RpcResponse`] round trip ([`protocol`]).
//!
//! - [`client`]: host side. [`PluginClient`] owns the child process and
//!   dispenses [`ManagerProxy`] and [`RunnerProxy`] stubs implementing the
//!   `turing-experiment` traits.
//! - [`server`]: plugin side. [`serve`] dispatches calls to the concrete
//!   engine supplied by the plugin binary.
//! - [`factory`]: [`EngineFactories`] decodes engine configuration, uses the
//!   in-process registries for compiled-in engines, and memoises plugin
//!   connections by configuration hash.
//! - [`telemetry`]: the `tracing` subscriber shared by hosts and plugins.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use turing_experiment::{ManagerRegistry, RunnerRegistry};
//! use turing_plugins::{EngineFactories, PluginSettings};
//!
//! let factories = EngineFactories::new(
//!     Arc::new(ManagerRegistry::default()),
//!     Arc::new(RunnerRegistry::default()),
//!     PluginSettings::default(),
//! );
//! let raw = json!({"plugin_binary": "/opt/engines/xp-plugin", "home": "https://xp"});
//! let factory = factories
//!     .factory("xp", raw.as_object().expect("object"))
//!     .expect("plugin starts");
//! let manager = factory.experiment_manager().expect("manager is configured");
//! ```

pub mod client;
pub mod error;
pub mod factory;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use self::client::{Dispensed, ManagerProxy, PluginClient, RunnerProxy};
pub use self::error::{PluginError, ServeError, TransportError};
pub use self::factory::{
    EngineFactories, EngineFactory, FactoryError, InProcessEngineFactory, PluginConnector,
    PluginEngineFactory, ProcessConnector, factory_key,
};
pub use self::protocol::{
    Handshake, HandshakeConfig, PROTOCOL_VERSION, PluginCall, RemoteError, RemoteErrorCode,
    RpcRequest, RpcResponse, ServiceId,
};
pub use self::server::{
    ConfigurableExperimentManager, ConfigurableExperimentRunner, PluginServices, serve,
    serve_with_io,
};
pub use self::settings::PluginSettings;
pub use self::telemetry::{TelemetryError, TelemetryHandle};
