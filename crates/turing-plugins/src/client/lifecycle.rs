//! Plugin process launch and termination.

use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::PluginError;
use crate::settings::PluginSettings;

/// Log target for client operations.
pub(crate) const CLIENT_TARGET: &str = "turing_plugins::client";

/// Log target for lines a plugin writes to stderr.
const PLUGIN_OUTPUT_TARGET: &str = "turing_plugins::plugin";

const GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Launches `binary` with piped stdio and the handshake cookie in its
/// environment.
pub(super) fn spawn(binary: &Path, settings: &PluginSettings) -> Result<Child, PluginError> {
    let handshake = settings.handshake();
    debug!(
        target: CLIENT_TARGET,
        binary = %binary.display(),
        "spawning plugin process"
    );
    Command::new(binary)
        .env(handshake.magic_cookie_key(), handshake.magic_cookie_value())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                PluginError::BinaryNotFound {
                    binary: binary.to_path_buf(),
                    source: Arc::new(error),
                }
            } else {
                PluginError::Spawn {
                    binary: binary.to_path_buf(),
                    source: Arc::new(error),
                }
            }
        })
}

/// Re-emits every line the plugin writes to stderr through `tracing`.
///
/// The thread ends when the plugin closes stderr.
pub(super) fn relay_stderr(plugin: &str, stderr: ChildStderr) {
    let name = plugin.to_owned();
    let spawned = thread::Builder::new()
        .name(format!("plugin-stderr:{plugin}"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(text) if text.trim().is_empty() => {}
                    Ok(text) => info!(target: PLUGIN_OUTPUT_TARGET, plugin = %name, "{text}"),
                    Err(error) => {
                        debug!(target: PLUGIN_OUTPUT_TARGET, plugin = %name, %error, "stopped reading plugin stderr");
                        break;
                    }
                }
            }
        });
    if let Err(error) = spawned {
        warn!(target: CLIENT_TARGET, plugin, %error, "could not relay plugin stderr");
    }
}

fn kill(child: &mut Child, plugin: &str) {
    if let Err(error) = child.kill() {
        debug!(target: CLIENT_TARGET, plugin, %error, "kill failed");
    }
    if let Err(error) = child.wait() {
        debug!(target: CLIENT_TARGET, plugin, %error, "wait failed");
    }
}

/// Waits a short grace period for `child` to exit, then kills it.
///
/// Callers close the plugin's stdin first so a well-behaved plugin exits on
/// its own.
pub(crate) fn terminate_child(child: &mut Child, plugin: &str) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(target: CLIENT_TARGET, plugin, ?status, "plugin exited");
            return;
        }
        Ok(None) => {}
        Err(error) => {
            warn!(
                target: CLIENT_TARGET,
                plugin,
                %error,
                "failed to check plugin status, waiting before killing"
            );
        }
    }

    thread::sleep(GRACE_PERIOD);
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(target: CLIENT_TARGET, plugin, ?status, "plugin exited during grace period");
        }
        Ok(None) | Err(_) => {
            warn!(target: CLIENT_TARGET, plugin, "plugin did not exit, killing");
            kill(child, plugin);
        }
    }
}
