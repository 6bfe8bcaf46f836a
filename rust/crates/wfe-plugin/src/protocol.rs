//! Wire format: 4-byte big-endian length prefix + JSON payload, exchanged
//! over an action plugin child process's stdin/stdout. Framing and the
//! handshake envelope follow the pack's `groblegark-oddjobs` daemon IPC
//! protocol; the message set itself is this engine's own (`Run`, not that
//! daemon's job-queue vocabulary).

use std::collections::HashMap;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Messages the host sends to the plugin process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum HostMessage {
    Hello { magic: String, version: u32 },
    Run { with: HashMap<String, String> },
    Shutdown,
}

/// Messages the plugin process sends back to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PluginMessage {
    Hello { magic: String, version: u32 },
    Result { status: i64, res: HashMap<String, String> },
    Error { message: String },
}

/// Fixed handshake string both sides must present before any `Run` is sent.
pub const PROTOCOL_HANDSHAKE_MAGIC: &str = "probe-rs-plugin-v1";

/// Protocol version. A plugin built against a different version fails the
/// handshake rather than risk misinterpreting the message set.
pub const PROTOCOL_VERSION: u32 = 1;

/// A single framed message is capped well above any realistic flattened
/// parameter map; a plugin that exceeds this is almost certainly
/// malfunctioning rather than sending legitimate payload.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Falls back to this when a step sets no explicit timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("plugin io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plugin message codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plugin message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("plugin process closed the connection")]
    ConnectionClosed,

    #[error("timed out waiting on plugin process")]
    Timeout,

    #[error("plugin handshake mismatch: expected magic {expected_magic:?} version {expected_version}, got magic {got_magic:?} version {got_version}")]
    HandshakeMismatch {
        expected_magic: &'static str,
        expected_version: u32,
        got_magic: String,
        got_version: u32,
    },
}

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: json.len(), max: MAX_MESSAGE_SIZE });
    }
    Ok(json)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_message<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_with_timeout<R, T>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_with_timeout<W, T>(writer: &mut W, msg: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let data = encode(msg)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

impl From<ProtocolError> for wfe_core::Error {
    fn from(e: ProtocolError) -> Self {
        wfe_core::Error::PluginTransport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_framed_message() {
        let msg = HostMessage::Run { with: HashMap::from([("a".to_string(), "1".to_string())]) };
        let mut buf: Vec<u8> = Vec::new();
        write_message(&mut buf, &encode(&msg).unwrap()).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let bytes = read_message(&mut cursor).await.unwrap();
        let decoded: HostMessage = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn empty_reader_is_connection_closed() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }
}
