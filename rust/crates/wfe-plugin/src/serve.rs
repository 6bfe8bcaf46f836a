//! Plugin-side helper: answers the handshake and loops on `Run` requests
//! over stdin/stdout. Action plugin binaries call [`serve`] from `main`.

use std::collections::HashMap;
use std::future::Future;

use tokio::io::{stdin, stdout, BufReader};

use crate::protocol::{self, HostMessage, PluginMessage, DEFAULT_TIMEOUT, PROTOCOL_HANDSHAKE_MAGIC, PROTOCOL_VERSION};

/// What a plugin's handler returns for one `Run` call.
pub enum PluginOutcome {
    Ok { status: i64, res: HashMap<String, String> },
    Err(String),
}

impl PluginOutcome {
    pub fn ok(res: HashMap<String, String>) -> Self {
        PluginOutcome::Ok { status: 0, res }
    }
}

/// Drive the plugin side of the protocol until the host sends `Shutdown`
/// or closes the connection.
pub async fn serve<F, Fut>(mut handler: F) -> std::io::Result<()>
where
    F: FnMut(HashMap<String, String>) -> Fut,
    Fut: Future<Output = PluginOutcome>,
{
    let mut input = BufReader::new(stdin());
    let mut output = stdout();

    loop {
        let request: HostMessage = match protocol::read_with_timeout(&mut input, DEFAULT_TIMEOUT).await {
            Ok(req) => req,
            Err(protocol::ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(std::io::Error::other(e.to_string())),
        };

        match request {
            HostMessage::Hello { .. } => {
                let reply = PluginMessage::Hello { magic: PROTOCOL_HANDSHAKE_MAGIC.to_string(), version: PROTOCOL_VERSION };
                protocol::write_with_timeout(&mut output, &reply, DEFAULT_TIMEOUT)
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
            }
            HostMessage::Run { with } => {
                let outcome = handler(with).await;
                let reply = match outcome {
                    PluginOutcome::Ok { status, res } => PluginMessage::Result { status, res },
                    PluginOutcome::Err(message) => PluginMessage::Error { message },
                };
                protocol::write_with_timeout(&mut output, &reply, DEFAULT_TIMEOUT)
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
            }
            HostMessage::Shutdown => return Ok(()),
        }
    }
}
