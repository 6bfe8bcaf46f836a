//! Workflow document shape, as parsed from YAML, and its conversion into
//! the types `wfe-scheduler` and `wfe-exec` actually run on.
//!
//! Durations are plain milliseconds in the document (`wait_ms`,
//! `interval_ms`, ...) rather than a humantime-style string — the simplest
//! thing that round-trips through `serde_yaml` without another dependency.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorkflowDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// name -> expression, evaluated once at startup against `env` only.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    #[serde(default)]
    pub jobs: Vec<JobDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDoc {
    /// Falls back to `name` when absent; either way this is what `needs`
    /// references and what the report groups by.
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "if", default)]
    pub if_expr: Option<String>,
    #[serde(default)]
    pub needs: Vec<String>,
    /// action name -> default parameters merged under every step using it.
    #[serde(default)]
    pub defaults: HashMap<String, Value>,
    #[serde(default)]
    pub repeat: Option<JobRepeatDoc>,
    #[serde(default)]
    pub steps: Vec<StepDoc>,
}

impl JobDoc {
    pub fn effective_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JobRepeatDoc {
    pub count: u32,
    #[serde(default)]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepDoc {
    pub name: String,
    pub uses: String,
    #[serde(default)]
    pub with: Value,
    #[serde(rename = "if", default)]
    pub if_expr: Option<String>,
    #[serde(default)]
    pub iter: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryDoc>,
    #[serde(default)]
    pub repeat: Option<StepRepeatDoc>,
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub wait_ms: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryDoc {
    pub max_attempts: u32,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub initial_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepRepeatDoc {
    pub count: u32,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub until: Option<String>,
}

pub fn into_job_spec(job: &JobDoc) -> wfe_scheduler::JobSpec {
    wfe_scheduler::JobSpec {
        id: job.effective_id(),
        if_expr: job.if_expr.clone(),
        needs: job.needs.clone(),
    }
}

pub fn into_job_def(job: &JobDoc) -> wfe_exec::JobDef {
    wfe_exec::JobDef {
        id: job.effective_id(),
        defaults: job.defaults.clone(),
        repeat: job.repeat.map(|r| wfe_exec::JobRepeat {
            count: r.count,
            interval: Duration::from_millis(r.interval_ms),
        }),
        steps: job.steps.iter().map(into_step_def).collect(),
    }
}

fn into_step_def(step: &StepDoc) -> wfe_exec::StepDef {
    wfe_exec::StepDef {
        name: step.name.clone(),
        uses: step.uses.clone(),
        with: step.with.clone(),
        if_expr: step.if_expr.clone(),
        iter: step.iter.clone(),
        retry: step.retry.map(|r| wfe_exec::RetryPolicy {
            max_attempts: r.max_attempts,
            interval: Duration::from_millis(r.interval_ms),
            initial_delay: Duration::from_millis(r.initial_delay_ms),
        }),
        repeat: step.repeat.as_ref().map(|r| wfe_exec::StepRepeat {
            count: r.count,
            interval: Duration::from_millis(r.interval_ms),
            until: r.until.clone(),
        }),
        test: step.test.clone(),
        outputs: step.outputs.clone(),
        wait: step.wait_ms.map(Duration::from_millis),
        timeout: step.timeout_ms.map(Duration::from_millis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_falls_back_to_name() {
        let job = JobDoc {
            id: None,
            name: "build".to_string(),
            if_expr: None,
            needs: vec![],
            defaults: HashMap::new(),
            repeat: None,
            steps: vec![],
        };
        assert_eq!(job.effective_id(), "build");
    }

    #[test]
    fn parses_minimal_workflow_yaml() {
        let doc: WorkflowDoc = serde_yaml::from_str(
            r#"
name: demo
jobs:
  - name: a
    steps:
      - name: ping
        uses: echo
        with:
          msg: hello
"#,
        )
        .unwrap();
        assert_eq!(doc.jobs.len(), 1);
        assert_eq!(doc.jobs[0].steps[0].uses, "echo");
    }
}
