//! Production `ActionDispatcher`: resolves an action name to a
//! `probe-rs-plugin-<name>` binary in the configured search path and
//! speaks the plugin host protocol to it.
//!
//! Each call spawns a fresh plugin process and shuts it down before
//! returning, rather than pooling a long-lived child — scoped acquisition
//! with guaranteed release on every exit path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use wfe_core::{ActionReply, Error, Result};
use wfe_exec::ActionDispatcher;
use wfe_plugin::PluginHost;

#[derive(Debug, Clone)]
pub struct PluginActionDispatcher {
    search_dirs: Vec<PathBuf>,
}

impl PluginActionDispatcher {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    fn resolve(&self, action: &str) -> Result<PathBuf> {
        let binary_name = format!("probe-rs-plugin-{action}");
        for dir in &self.search_dirs {
            let candidate = dir.join(&binary_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::Config(format!(
            "no plugin binary {binary_name:?} found in search path {:?}",
            self.search_dirs
        )))
    }
}

impl ActionDispatcher for PluginActionDispatcher {
    async fn dispatch(
        &self,
        action: &str,
        with: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<ActionReply> {
        let binary_path = self.resolve(action)?;
        let mut host = PluginHost::spawn(action, &binary_path, timeout).await?;
        let result = host.run(with, timeout).await;
        let _ = host.shutdown(timeout).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_fails_when_binary_is_absent() {
        let dispatcher = PluginActionDispatcher::new(vec![PathBuf::from("/nonexistent-dir")]);
        let err = dispatcher.resolve("echo").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
