//! What a job run reports back to the driver: one line per step attempt
//! plus the job's terminal outcome, in the shape `wfe-driver` flushes into
//! a per-job output buffer.

use std::time::Duration;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    Skipped,
    TestFailed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct StepLine {
    pub step_name: String,
    pub status: StepStatus,
    pub detail: Option<String>,
    pub duration: Duration,
    /// Request/response pair, populated only under `--verbose`.
    pub verbose: Option<(Value, Option<Value>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub outcome: JobOutcome,
    pub lines: Vec<StepLine>,
    pub outputs: Map<String, Value>,
    pub duration: Duration,
}
