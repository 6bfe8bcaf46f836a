//! Plugin Host Protocol.
//!
//! An action plugin is a child process speaking a small framed JSON RPC
//! over its stdin/stdout. [`PluginHost`] is the engine-side client;
//! [`serve`] is the helper a plugin binary's `main` calls to speak the
//! other end.

mod host;
mod protocol;
mod serve;

pub use host::{default_timeout, PluginHost};
pub use protocol::{
    HostMessage, PluginMessage, ProtocolError, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE,
    PROTOCOL_HANDSHAKE_MAGIC, PROTOCOL_VERSION,
};
pub use serve::{serve, PluginOutcome};
