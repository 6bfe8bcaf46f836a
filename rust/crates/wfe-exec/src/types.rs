//! Job and step definitions the executor consumes.
//!
//! This is the subset of a workflow document's `job`/`step` shape that
//! `wfe-exec` needs to run steps. Job-level `if` and `needs` stay with
//! `wfe-scheduler`'s `JobSpec` — only the scheduler decides whether a job is
//! ever admitted to `Running`; once it is, this is everything required to
//! drive its steps.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct JobDef {
    pub id: String,
    /// action name -> default parameters merged under every step using it.
    pub defaults: HashMap<String, Value>,
    pub repeat: Option<JobRepeat>,
    pub steps: Vec<StepDef>,
}

#[derive(Debug, Clone, Copy)]
pub struct JobRepeat {
    pub count: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct StepDef {
    pub name: String,
    pub uses: String,
    pub with: Value,
    pub if_expr: Option<String>,
    /// Expression evaluating to an array; the step body runs once per
    /// element with that element and its index bound in `env`.
    pub iter: Option<String>,
    pub retry: Option<RetryPolicy>,
    pub repeat: Option<StepRepeat>,
    /// Boolean expression over the step's result; falsy fails the step
    /// without halting the job (non-gate).
    pub test: Option<String>,
    /// output name -> expression captured into the job's output namespace.
    pub outputs: HashMap<String, String>,
    pub wait: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl StepDef {
    pub fn new(name: impl Into<String>, uses: impl Into<String>, with: Value) -> Self {
        Self {
            name: name.into(),
            uses: uses.into(),
            with,
            if_expr: None,
            iter: None,
            retry: None,
            repeat: None,
            test: None,
            outputs: HashMap::new(),
            wait: None,
            timeout: None,
        }
    }
}

/// Engine-level retry: only triggers on a retryable error classification
/// (`PluginTransport`, `ActionStatusNonZero`), and retries with a fixed
/// interval rather than back-off.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub initial_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct StepRepeat {
    pub count: u32,
    pub interval: Duration,
    /// Expression evaluated against the latest `res`; truthy stops the
    /// repeat loop early.
    pub until: Option<String>,
}
