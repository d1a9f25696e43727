//! Host side of the transport.
//!
//! [`PluginClient::connect`] launches a plugin binary, waits for its
//! handshake, and keeps the child process for the lifetime of the client.
//! [`PluginClient::dispense`] hands out proxies for the advertised services;
//! all proxies share the client's single connection.

mod connection;
mod lifecycle;
mod proxy;

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::Child;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use self::connection::RpcConnection;
use self::lifecycle::{CLIENT_TARGET, relay_stderr, spawn, terminate_child};
use crate::error::PluginError;
use crate::protocol::{Handshake, ServiceId};
use crate::settings::PluginSettings;

pub use self::proxy::{ManagerProxy, RunnerProxy};

/// A dispensed service.
#[derive(Debug)]
pub enum Dispensed {
    /// The `experiment_manager` service.
    Manager(ManagerProxy),
    /// The `experiment_runner` service.
    Runner(RunnerProxy),
}

/// A live connection to one plugin process.
pub struct PluginClient {
    name: String,
    handshake: Handshake,
    connection: Arc<RpcConnection>,
    process: Mutex<Option<Child>>,
}

impl PluginClient {
    /// Launches `binary` and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::BinaryNotFound`] or [`PluginError::Spawn`] when
    /// the process cannot start, [`PluginError::Timeout`] when no handshake
    /// arrives within the connect timeout, [`PluginError::HandshakeMismatch`]
    /// for an incompatible plugin, and [`PluginError::ProcessExited`] when the
    /// plugin exits first. The child is terminated on every failure.
    pub fn connect(binary: impl AsRef<Path>, settings: &PluginSettings) -> Result<Self, PluginError> {
        let path = binary.as_ref();
        let name = path.display().to_string();
        let mut child = spawn(path, settings)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            terminate_child(&mut child, &name);
            return Err(PluginError::Spawn {
                binary: path.to_path_buf(),
                source: Arc::new(io::Error::other("plugin stdio was not captured")),
            });
        };
        if let Some(stderr) = child.stderr.take() {
            relay_stderr(&name, stderr);
        }

        match Self::establish(name.clone(), stdout, stdin, settings) {
            Ok(client) => {
                *client.process.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);
                info!(target: CLIENT_TARGET, plugin = %name, pid = ?client.pid(), "plugin connected");
                Ok(client)
            }
            Err(error) => {
                terminate_child(&mut child, &name);
                Err(error)
            }
        }
    }

    /// Completes the handshake over already-open streams.
    ///
    /// The client owns no process; [`PluginClient::shutdown`] only closes
    /// `writer`.
    ///
    /// # Errors
    ///
    /// As [`PluginClient::connect`], minus the launch failures.
    pub fn establish<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        settings: &PluginSettings,
    ) -> Result<Self, PluginError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (connection, handshake) = RpcConnection::open(name.into(), reader, writer, settings)?;
        Ok(Self {
            name: connection.plugin().to_owned(),
            handshake,
            connection: Arc::new(connection),
            process: Mutex::new(None),
        })
    }

    /// Name used in logs and errors, the binary path for launched plugins.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plugin's handshake.
    #[must_use]
    pub const fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Process id of the plugin, when the client launched one that is still
    /// owned.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Child::id)
    }

    /// Returns `false` once the connection has closed or the plugin process
    /// has exited.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        if !self.connection.is_open() {
            return false;
        }
        let mut process = self.process.lock().unwrap_or_else(PoisonError::into_inner);
        match process.as_mut().map(Child::try_wait) {
            None | Some(Ok(None)) => true,
            Some(Ok(Some(_)) | Err(_)) => false,
        }
    }

    /// Returns a proxy for the service named `service`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::UnknownService`] when the id is not a known
    /// service or the plugin does not offer it, and
    /// [`PluginError::InterfaceMismatch`] when the plugin advertises it under
    /// a different interface.
    pub fn dispense(&self, service: &str) -> Result<Dispensed, PluginError> {
        let unknown = || PluginError::UnknownService {
            service: service.to_owned(),
        };
        let id: ServiceId = service.parse().map_err(|_| unknown())?;
        let advertised = self.handshake.service(service).ok_or_else(unknown)?;
        if advertised.interface != id.interface() {
            return Err(PluginError::InterfaceMismatch {
                service: service.to_owned(),
                expected: id.interface(),
                actual: advertised.interface.clone(),
            });
        }
        debug!(target: CLIENT_TARGET, plugin = %self.name, %service, "dispensed service");
        let connection = Arc::clone(&self.connection);
        Ok(match id {
            ServiceId::ExperimentManager => Dispensed::Manager(ManagerProxy::new(connection)),
            ServiceId::ExperimentRunner => Dispensed::Runner(RunnerProxy::new(connection)),
        })
    }

    /// Closes the connection and terminates the plugin process.
    ///
    /// Calls on proxies dispensed earlier fail with
    /// [`PluginError::ProcessExited`] afterwards. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.connection.close();
        let child = self
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut process) = child {
            terminate_child(&mut process, &self.name);
            info!(target: CLIENT_TARGET, plugin = %self.name, "plugin stopped");
        }
    }
}

impl Drop for PluginClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClient")
            .field("name", &self.name)
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}
