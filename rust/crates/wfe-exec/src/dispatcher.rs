//! Seam between the executor and the plugin host.
//!
//! `wfe-exec` dispatches a step's already-flattened parameters without
//! knowing how the plugin binary for an action gets found or spawned.
//! `wfe-driver` supplies the production implementation, backed by
//! `wfe_plugin::PluginHost` (fresh process per call, per §5's "scoped
//! acquisition with guaranteed release"); tests supply a scripted one.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use wfe_core::{ActionReply, Result};

pub trait ActionDispatcher: Send + Sync + 'static {
    /// Run `action` with the flattened `with` payload, returning the
    /// plugin's status and flattened result map as-is. A non-zero status
    /// is not an error at this seam — the executor decides gate-vs-non-gate
    /// after consulting the step's `test` expression. `Err` here means the
    /// call itself failed (`wfe_core::Error::PluginTransport` or
    /// `PluginError`), with no result to judge at all.
    fn dispatch(
        &self,
        action: &str,
        with: HashMap<String, String>,
        timeout: Duration,
    ) -> impl Future<Output = Result<ActionReply>> + Send;
}
