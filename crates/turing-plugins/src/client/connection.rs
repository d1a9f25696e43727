//! Request/response channel to one plugin.
//!
//! A background thread reads frames from the plugin and forwards them over a
//! channel, so every wait can be bounded by a timeout. Calls hold the state
//! lock for the whole round trip: one connection carries one call at a time.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::lifecycle::CLIENT_TARGET;
use crate::error::{PluginError, TransportError};
use crate::protocol::{Handshake, PluginCall, RpcRequest, RpcResponse, ServiceId};
use crate::settings::PluginSettings;
use crate::transport::{FrameReader, FrameWriter};

type Frame = Result<Vec<u8>, TransportError>;

enum ConnectionState {
    Open {
        writer: FrameWriter<Box<dyn Write + Send>>,
        frames: Receiver<Frame>,
    },
    Closed,
}

pub(crate) struct RpcConnection {
    plugin: String,
    call_timeout: Duration,
    next_id: AtomicU64,
    state: Mutex<ConnectionState>,
}

impl RpcConnection {
    /// Starts the reader thread and waits for the plugin's handshake.
    pub(crate) fn open<R, W>(
        plugin: String,
        reader: R,
        writer: W,
        settings: &PluginSettings,
    ) -> Result<(Self, Handshake), PluginError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let frames = spawn_reader(&plugin, reader)?;
        let handshake = receive_handshake(&plugin, &frames, settings)?;
        debug!(
            target: CLIENT_TARGET,
            plugin = %plugin,
            protocol_version = handshake.protocol_version,
            services = handshake.services.len(),
            "plugin handshake complete"
        );
        let writer: Box<dyn Write + Send> = Box::new(writer);
        let connection = Self {
            plugin,
            call_timeout: settings.call_timeout(),
            next_id: AtomicU64::new(1),
            state: Mutex::new(ConnectionState::Open {
                writer: FrameWriter::new(writer),
                frames,
            }),
        };
        Ok((connection, handshake))
    }

    pub(crate) fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Sends `call` to `service` and waits for the matching response.
    ///
    /// Transport failures and timeouts close the connection; later calls fail
    /// fast with [`PluginError::ProcessExited`].
    pub(crate) fn call(&self, service: ServiceId, call: PluginCall) -> Result<Value, PluginError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = call.method_name();
        let body = serde_json::to_vec(&RpcRequest { id, service, call })?;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let ConnectionState::Open { writer, frames } = &mut *state else {
            return Err(self.exited());
        };

        debug!(target: CLIENT_TARGET, plugin = %self.plugin, %service, method, id, "sending request");
        let result = match writer.send(&body) {
            Ok(()) => self.await_response(frames, id, method),
            Err(source) => Err(PluginError::Transport {
                plugin: self.plugin.clone(),
                source,
            }),
        };
        if matches!(
            result,
            Err(PluginError::Transport { .. }
                | PluginError::ProcessExited { .. }
                | PluginError::Timeout { .. })
        ) {
            warn!(target: CLIENT_TARGET, plugin = %self.plugin, method, id, "closing plugin connection");
            *state = ConnectionState::Closed;
        }
        result
    }

    /// Returns `false` once the connection has been closed.
    pub(crate) fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, ConnectionState::Open { .. })
    }

    /// Drops the writer, closing the plugin's stdin.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = ConnectionState::Closed;
    }

    fn await_response(
        &self,
        frames: &Receiver<Frame>,
        id: u64,
        method: &'static str,
    ) -> Result<Value, PluginError> {
        let deadline = Instant::now() + self.call_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match frames.recv_timeout(remaining) {
                Ok(Ok(frame)) => frame,
                Ok(Err(TransportError::Closed)) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.exited());
                }
                Ok(Err(source)) => {
                    return Err(PluginError::Transport {
                        plugin: self.plugin.clone(),
                        source,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(PluginError::Timeout {
                        plugin: self.plugin.clone(),
                        operation: method.to_owned(),
                        timeout: self.call_timeout,
                    });
                }
            };

            let response: RpcResponse = serde_json::from_slice(&frame)?;
            if response.id != id {
                warn!(
                    target: CLIENT_TARGET,
                    plugin = %self.plugin,
                    expected = id,
                    received = response.id,
                    "skipping response with non-matching ID"
                );
                continue;
            }
            return response.into_result().map_err(PluginError::Remote);
        }
    }

    fn exited(&self) -> PluginError {
        PluginError::ProcessExited {
            plugin: self.plugin.clone(),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    plugin: &str,
    reader: R,
) -> Result<Receiver<Frame>, PluginError> {
    let (sender, receiver) = mpsc::channel();
    let name = plugin.to_owned();
    thread::Builder::new()
        .name(format!("plugin-reader:{plugin}"))
        .spawn(move || {
            let mut frames = FrameReader::new(reader);
            loop {
                let frame = frames.receive();
                let finished = frame.is_err();
                if sender.send(frame).is_err() || finished {
                    debug!(target: CLIENT_TARGET, plugin = %name, "plugin reader stopped");
                    return;
                }
            }
        })
        .map_err(|source| PluginError::Transport {
            plugin: plugin.to_owned(),
            source: source.into(),
        })?;
    Ok(receiver)
}

fn receive_handshake(
    plugin: &str,
    frames: &Receiver<Frame>,
    settings: &PluginSettings,
) -> Result<Handshake, PluginError> {
    let frame = match frames.recv_timeout(settings.connect_timeout()) {
        Ok(Ok(frame)) => frame,
        Ok(Err(TransportError::Closed)) | Err(RecvTimeoutError::Disconnected) => {
            return Err(PluginError::ProcessExited {
                plugin: plugin.to_owned(),
            });
        }
        Ok(Err(source)) => {
            return Err(PluginError::Transport {
                plugin: plugin.to_owned(),
                source,
            });
        }
        Err(RecvTimeoutError::Timeout) => {
            return Err(PluginError::Timeout {
                plugin: plugin.to_owned(),
                operation: "handshake".to_owned(),
                timeout: settings.connect_timeout(),
            });
        }
    };

    let handshake: Handshake =
        serde_json::from_slice(&frame).map_err(|error| PluginError::HandshakeMismatch {
            plugin: plugin.to_owned(),
            message: format!("unreadable handshake: {error}"),
        })?;
    match settings.handshake().mismatch(&handshake) {
        Some(message) => Err(PluginError::HandshakeMismatch {
            plugin: plugin.to_owned(),
            message,
        }),
        None => Ok(handshake),
    }
}
