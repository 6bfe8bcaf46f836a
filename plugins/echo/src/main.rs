//! `echo` fixture action plugin.
//!
//! Echoes its `with` payload back as `res`, minus two reserved
//! test-control keys used only by integration tests:
//!
//! - `__test_delay_ms`: sleep this many milliseconds before replying, to
//!   exercise step/plugin timeouts.
//! - `__test_fail_count` (paired with `__test_state_file`): fail with a
//!   non-zero status this many times before succeeding, to exercise the
//!   engine's retry path across the fresh-process-per-attempt boundary a
//!   real plugin call crosses.
//!
//! Not a production action and never on `wfe-cli`'s default plugin search
//! path; it exists to give integration tests a real process to speak the
//! plugin host protocol to.

use std::collections::HashMap;
use std::time::Duration;

use wfe_plugin::{serve, PluginOutcome};

const DELAY_KEY: &str = "__test_delay_ms";
const FAIL_COUNT_KEY: &str = "__test_fail_count";
const STATE_FILE_KEY: &str = "__test_state_file";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    serve(handle).await
}

async fn handle(mut with: HashMap<String, String>) -> PluginOutcome {
    if let Some(delay_ms) = with.remove(DELAY_KEY).and_then(|s| s.parse::<u64>().ok()) {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let fail_count = with.remove(FAIL_COUNT_KEY).and_then(|s| s.parse::<u32>().ok());
    let state_file = with.remove(STATE_FILE_KEY);

    if let Some(fail_count) = fail_count {
        let Some(state_file) = state_file else {
            return PluginOutcome::Err(format!("{FAIL_COUNT_KEY} set without {STATE_FILE_KEY}"));
        };
        match bump_attempt_count(&state_file) {
            Ok(attempt) if attempt <= fail_count => {
                return PluginOutcome::Ok { status: 1, res: HashMap::from([("attempt".to_string(), attempt.to_string())]) };
            }
            Ok(attempt) => {
                with.insert("attempt".to_string(), attempt.to_string());
            }
            Err(e) => return PluginOutcome::Err(e.to_string()),
        }
    }

    PluginOutcome::ok(with)
}

/// Read-increment-write a counter file; returns the count *after*
/// incrementing, i.e. this call's 1-based attempt number.
fn bump_attempt_count(path: &str) -> std::io::Result<u32> {
    let current: u32 = std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(0);
    let next = current + 1;
    std::fs::write(path, next.to_string())?;
    Ok(next)
}
