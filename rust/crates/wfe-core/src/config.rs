//! Engine-level configuration
//!
//! Covers only the tunables that live outside a workflow document itself:
//! logging, the default step timeout/retry when a step doesn't specify its
//! own, and where plugin binaries are found. Loaded the way the teacher's
//! `Config::load` layers `config`-crate environment sources over defaults.

use serde::Deserialize;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,

    /// Execution defaults applied when a step omits the corresponding field.
    #[serde(default)]
    pub defaults: ExecutionDefaults,

    /// Where to look for action plugin binaries.
    #[serde(default)]
    pub plugins: PluginConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionDefaults {
    /// Per-step RPC deadline, in milliseconds, when a step sets no `timeout`.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Retry interval, in milliseconds, when a step's retry policy omits one.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Max concurrently-running jobs; 0 means unbounded (one task per
    /// runnable job).
    #[serde(default)]
    pub max_concurrent_jobs: usize,
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_concurrent_jobs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    /// Directories searched, in order, for `probe-rs-plugin-<name>` binaries.
    #[serde(default = "default_plugin_dirs")]
    pub search_dirs: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            search_dirs: default_plugin_dirs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_step_timeout_ms() -> u64 {
    30_000
}
fn default_retry_interval_ms() -> u64 {
    1_000
}
fn default_plugin_dirs() -> Vec<String> {
    vec![".".to_string()]
}

impl Config {
    /// Load configuration from environment (prefix `PROBE_`) and an
    /// optional `.env` file, layered over built-in defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .set_default("log.level", default_log_level())?
            .set_default("log.format", default_log_format())?
            .set_default("defaults.step_timeout_ms", default_step_timeout_ms())?
            .set_default("defaults.retry_interval_ms", default_retry_interval_ms())?
            .set_default("defaults.max_concurrent_jobs", 0)?
            .add_source(
                config::Environment::with_prefix("PROBE")
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let d = ExecutionDefaults::default();
        assert_eq!(d.step_timeout_ms, 30_000);
        assert_eq!(d.retry_interval_ms, 1_000);
        assert_eq!(d.max_concurrent_jobs, 0);
    }
}
