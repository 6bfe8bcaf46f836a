//! Host side of the Plugin Host Protocol: spawns an action plugin binary,
//! performs the handshake, and dispatches `Run` calls.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};
use wfe_core::{ActionReply, Error, Result};

use crate::protocol::{
    self, HostMessage, PluginMessage, DEFAULT_TIMEOUT, PROTOCOL_HANDSHAKE_MAGIC, PROTOCOL_VERSION,
};

/// A running action plugin process, past its handshake and ready for
/// `Run` calls.
pub struct PluginHost {
    name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl PluginHost {
    /// Spawn `binary_path` and complete the version handshake.
    pub async fn spawn(name: &str, binary_path: &Path, timeout: Duration) -> Result<Self> {
        let mut child = Command::new(binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::PluginTransport(format!("failed to spawn plugin {name:?}: {e}")))?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = BufReader::new(child.stdout.take().expect("stdout was piped"));

        let mut host = Self { name: name.to_string(), child, stdin, stdout };
        host.handshake(timeout).await?;
        Ok(host)
    }

    async fn handshake(&mut self, timeout: Duration) -> Result<()> {
        let hello = HostMessage::Hello { magic: PROTOCOL_HANDSHAKE_MAGIC.to_string(), version: PROTOCOL_VERSION };
        protocol::write_with_timeout(&mut self.stdin, &hello, timeout).await?;

        let reply: PluginMessage = protocol::read_with_timeout(&mut self.stdout, timeout).await?;
        match reply {
            PluginMessage::Hello { magic, version } if magic == PROTOCOL_HANDSHAKE_MAGIC && version == PROTOCOL_VERSION => {
                debug!(plugin = %self.name, "plugin handshake complete");
                Ok(())
            }
            PluginMessage::Hello { magic, version } => Err(protocol::ProtocolError::HandshakeMismatch {
                expected_magic: PROTOCOL_HANDSHAKE_MAGIC,
                expected_version: PROTOCOL_VERSION,
                got_magic: magic,
                got_version: version,
            }
            .into()),
            other => Err(Error::PluginTransport(format!("expected Hello during handshake, got {other:?}"))),
        }
    }

    /// Dispatch one `with` payload (already flattened) and return the
    /// plugin's status and flattened result map, whatever the status.
    ///
    /// A non-zero status is not decided here to be a failure: only the
    /// step executor knows whether a `test` expression overrides the
    /// status judgement (spec: "status=0 denotes success; any non-zero
    /// status marks the step as failed unless a `test` expression
    /// overrides the judgement"). `PluginMessage::Error`, by contrast, is a
    /// transport/plugin-side failure with no result at all and is always
    /// terminal here.
    pub async fn run(&mut self, with: HashMap<String, String>, timeout: Duration) -> Result<ActionReply> {
        let request = HostMessage::Run { with };
        protocol::write_with_timeout(&mut self.stdin, &request, timeout).await?;

        let reply: PluginMessage = protocol::read_with_timeout(&mut self.stdout, timeout).await?;
        match reply {
            PluginMessage::Result { status, res } => Ok(ActionReply { status, res }),
            PluginMessage::Error { message } => Err(Error::PluginError(message)),
            other => Err(Error::PluginTransport(format!("expected Result/Error, got {other:?}"))),
        }
    }

    /// Ask the plugin to exit cleanly, falling back to a kill if it
    /// doesn't within `timeout`.
    pub async fn shutdown(mut self, timeout: Duration) -> Result<()> {
        let _ = protocol::write_with_timeout(&mut self.stdin, &HostMessage::Shutdown, timeout).await;
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            _ => {
                warn!(plugin = %self.name, "plugin did not exit after Shutdown, killing");
                self.child.start_kill().map_err(|e| Error::PluginTransport(e.to_string()))?;
                Ok(())
            }
        }
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        // `shutdown` takes `self` by value; a host dropped without calling
        // it (panic unwind, early return) gets a best-effort kill instead
        // of leaking the child process.
        let _ = self.child.start_kill();
    }
}

/// Default per-call timeout when a step sets none.
pub fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}
