//! Runs one job's steps against a shared environment.
//!
//! Nesting order for a single step, outermost to innermost: `iter`, engine
//! `retry`, `repeat` — see the workflow's design notes on why this order,
//! not the order the fields are listed in, is the one a rebuild must
//! enforce. A retryable failure anywhere inside one `iter` element's
//! `retry`+`repeat` block restarts that block from its first repetition; a
//! `test` failure is recorded and the block keeps going (non-gate).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use wfe_core::{ActionReply, Error, Result};

use crate::dispatcher::ActionDispatcher;
use crate::report::{JobOutcome, JobReport, StepLine, StepStatus};
use crate::types::{JobDef, RetryPolicy, StepDef};

/// Everything the executor needs about the world outside this job: workflow
/// vars, the process environment (if exposed), and the read-only view of
/// ancestor jobs' captured outputs.
#[derive(Debug, Clone)]
pub struct JobRunEnv {
    pub vars: Value,
    pub process_env: Value,
    pub ancestor_outputs: Map<String, Value>,
    pub verbose: bool,
}

pub struct JobExecutor<D: ActionDispatcher> {
    dispatcher: D,
    default_step_timeout: Duration,
    default_retry_interval: Duration,
}

impl<D: ActionDispatcher> JobExecutor<D> {
    pub fn new(dispatcher: D, default_step_timeout: Duration, default_retry_interval: Duration) -> Self {
        Self { dispatcher, default_step_timeout, default_retry_interval }
    }

    /// Run `job`'s steps, honoring its job-level `repeat` if present. The
    /// job's own `if` has already been evaluated by the scheduler before
    /// this was ever called.
    pub async fn run(&self, job: &JobDef, run_env: JobRunEnv) -> JobReport {
        let started = Instant::now();
        let outer_count = job.repeat.map(|r| r.count).unwrap_or(1).max(1);
        let outer_interval = job.repeat.map(|r| r.interval).unwrap_or_default();

        let mut lines = Vec::new();
        let mut outputs = Map::new();
        let mut failed = false;

        for rep in 0..outer_count {
            if rep > 0 {
                tokio::time::sleep(outer_interval).await;
            }
            let mut state = RunState::new(&run_env, &job.id);
            let gate_err = self.run_steps(job, &mut state).await;
            lines.extend(state.lines);
            outputs.extend(state.outputs);
            if state.sticky_failed || gate_err.is_some() {
                failed = true;
            }
            if let Some(e) = gate_err {
                warn!(job = %job.id, error = %e, "job gated on step failure");
            }
        }

        debug!(job = %job.id, failed, "job run finished");
        JobReport {
            outcome: if failed { JobOutcome::Failed } else { JobOutcome::Completed },
            lines,
            outputs,
            duration: started.elapsed(),
        }
    }

    /// Run every step in declaration order; returns the first gate error,
    /// which halts the remaining steps.
    async fn run_steps(&self, job: &JobDef, state: &mut RunState<'_>) -> Option<Error> {
        for step in &job.steps {
            let env = state.env();
            let runnable = match &step.if_expr {
                Some(expr) => match wfe_expr::eval_bool(expr, &env) {
                    Ok(v) => v,
                    Err(e) => return Some(e),
                },
                None => true,
            };
            if !runnable {
                debug!(job = %job.id, step = %step.name, "step `if` is falsy, skipping");
                state.lines.push(StepLine {
                    step_name: step.name.clone(),
                    status: StepStatus::Skipped,
                    detail: None,
                    duration: Duration::ZERO,
                    verbose: None,
                });
                state.push_history(Value::Null);
                continue;
            }

            if let Err(e) = self.run_step(job, step, state).await {
                if e.is_gate() {
                    state.lines.push(StepLine {
                        step_name: step.name.clone(),
                        status: StepStatus::Failed,
                        detail: Some(e.to_string()),
                        duration: Duration::ZERO,
                        verbose: None,
                    });
                    return Some(e);
                }
            }
        }
        None
    }

    /// `iter` layer: run the body (wrapped in retry+repeat) once per
    /// element, or once with no binding when there's no `iter`.
    /// Per-element gate failures accumulate rather than aborting other
    /// elements; the step is reported gate-failed overall if any did.
    async fn run_step(&self, job: &JobDef, step: &StepDef, state: &mut RunState<'_>) -> Result<()> {
        let elements = match &step.iter {
            Some(expr) => {
                let env = state.env();
                let parsed = wfe_expr::parse(expr)?;
                match wfe_expr::eval(&parsed, &env) {
                    wfe_expr::EvalValue::Value(Value::Array(items)) => items,
                    _ => {
                        return Err(Error::Expr(format!(
                            "`iter` expression {expr:?} did not evaluate to an array"
                        )))
                    }
                }
            }
            None => vec![Value::Null],
        };

        let timeout = step.timeout.unwrap_or(self.default_step_timeout);
        let mut last_gate_err = None;

        for (idx, element) in elements.into_iter().enumerate() {
            let iter_binding = step.iter.as_ref().map(|_| (idx, element));
            if let Err(e) = self.run_retry(job, step, state, iter_binding, timeout).await {
                last_gate_err = Some(e);
                if step.iter.is_none() {
                    break;
                }
            }
        }

        match last_gate_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Engine-level `retry` layer: retries the whole `repeat` block on a
    /// retryable error, sleeping `initial_delay` before the first attempt
    /// and a fixed `interval` between the rest.
    async fn run_retry(
        &self,
        job: &JobDef,
        step: &StepDef,
        state: &mut RunState<'_>,
        iter_binding: Option<(usize, Value)>,
        timeout: Duration,
    ) -> Result<()> {
        let max_attempts = step.retry.map(|r| r.max_attempts).unwrap_or(1).max(1);
        let interval = step.retry.map(|r| r.interval).unwrap_or(self.default_retry_interval);
        let initial_delay = step.retry.map(|r| r.initial_delay).unwrap_or_default();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if attempt == 1 {
                if !initial_delay.is_zero() {
                    tokio::time::sleep(initial_delay).await;
                }
            } else {
                tokio::time::sleep(interval).await;
            }

            match self.run_repeat(job, step, state, iter_binding.clone(), timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(job = %job.id, step = %step.name, attempt, max_attempts, error = %e, "retrying step");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Innermost `repeat` layer: runs the body up to `count` times,
    /// stopping early when `until` is truthy against the latest result.
    async fn run_repeat(
        &self,
        job: &JobDef,
        step: &StepDef,
        state: &mut RunState<'_>,
        iter_binding: Option<(usize, Value)>,
        timeout: Duration,
    ) -> Result<()> {
        let count = step.repeat.as_ref().map(|r| r.count).unwrap_or(1).max(1);
        let interval = step.repeat.as_ref().map(|r| r.interval).unwrap_or_default();

        for rep in 0..count {
            if rep > 0 {
                tokio::time::sleep(interval).await;
            }
            let iteration_index = iter_binding.as_ref().map(|(i, _)| *i).unwrap_or(rep as usize);
            let outcome = self.run_body(job, step, state, iter_binding.clone(), iteration_index, timeout).await?;

            let counters = state.counters.entry(step.name.clone()).or_default();
            if outcome.test_failure.is_none() {
                counters.success += 1;
            } else {
                counters.failure += 1;
            }

            let latest_res = outcome.res.clone().unwrap_or(Value::Null);
            let latest_req = outcome.req.clone();
            state.push_history(latest_res.clone());

            let verbose_pair = state.run_env.verbose.then(|| (outcome.req.clone(), outcome.res.clone()));
            state.lines.push(StepLine {
                step_name: step.name.clone(),
                status: outcome.status(),
                detail: outcome.test_failure.clone(),
                duration: outcome.duration,
                verbose: verbose_pair,
            });

            if outcome.test_failure.is_some() {
                state.sticky_failed = true;
            }
            for (name, value) in outcome.outputs {
                state.outputs.insert(name, value);
            }

            if let Some(until_expr) = step.repeat.as_ref().and_then(|r| r.until.as_ref()) {
                let env = augment_with_res_req(&state.env(), &latest_res, &latest_req);
                if wfe_expr::eval_bool(until_expr, &env)? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// One execution of the step body: param expansion, defaults merge,
    /// dispatch, unflatten, `test`, `outputs`, `wait`.
    async fn run_body(
        &self,
        job: &JobDef,
        step: &StepDef,
        state: &RunState<'_>,
        iter_binding: Option<(usize, Value)>,
        iteration_index: usize,
        timeout: Duration,
    ) -> Result<BodyOutcome> {
        let started = Instant::now();
        let mut env = state.env();
        if let Value::Object(map) = &mut env {
            map.insert("i".to_string(), json!(iteration_index));
            if let Some((_, element)) = &iter_binding {
                map.insert("item".to_string(), element.clone());
            }
        }

        let templated = wfe_expr::eval_template_map(&step.with, &env)?;
        let merged = merge_defaults(templated, job.defaults.get(&step.uses));
        let payload = wfe_codec::flatten(&merged);

        let raw: ActionReply = self.dispatcher.dispatch(&step.uses, payload, timeout).await?;
        let res = wfe_codec::unflatten(&raw.res).map_err(|e| Error::Internal(e.to_string()))?;

        // A non-zero status only fails the step when no `test` expression
        // is present to override the judgement; when one is present, the
        // test's verdict is the whole story and the status is ignored.
        let mut test_failure = None;
        if let Some(test_expr) = &step.test {
            let test_env = augment_with_res_req(&env, &res, &merged);
            if !wfe_expr::eval_bool(test_expr, &test_env)? {
                test_failure = Some(test_expr.clone());
            }
        } else if raw.status != 0 {
            return Err(Error::ActionStatusNonZero { status: raw.status, detail: summarize(&raw.res) });
        }

        let mut outputs = HashMap::new();
        if !step.outputs.is_empty() {
            let out_env = augment_with_res_req(&env, &res, &merged);
            for (name, expr_src) in &step.outputs {
                let parsed = wfe_expr::parse(expr_src)?;
                let value = match wfe_expr::eval(&parsed, &out_env) {
                    wfe_expr::EvalValue::Value(v) => v,
                    wfe_expr::EvalValue::Missing => Value::Null,
                };
                outputs.insert(name.clone(), value);
            }
        }

        if let Some(wait) = step.wait {
            tokio::time::sleep(wait).await;
        }

        debug!(job = %job.id, step = %step.name, test_failed = test_failure.is_some(), "step attempt finished");
        Ok(BodyOutcome { req: merged, res: Some(res), test_failure, outputs, duration: started.elapsed() })
    }
}

struct BodyOutcome {
    req: Value,
    res: Option<Value>,
    test_failure: Option<String>,
    outputs: HashMap<String, Value>,
    duration: Duration,
}

impl BodyOutcome {
    fn status(&self) -> StepStatus {
        if self.test_failure.is_some() {
            StepStatus::TestFailed
        } else {
            StepStatus::Ok
        }
    }
}

#[derive(Default)]
struct StepCounters {
    success: u32,
    failure: u32,
}

/// Per-job-run mutable state threaded through the step loop: step history
/// (`env.steps`), captured outputs, repeat/iter counters, the rendered
/// lines, and the sticky `Failed` flag a non-gate `test` failure sets.
struct RunState<'a> {
    run_env: &'a JobRunEnv,
    history: Vec<Value>,
    outputs: HashMap<String, Value>,
    counters: HashMap<String, StepCounters>,
    lines: Vec<StepLine>,
    sticky_failed: bool,
}

impl<'a> RunState<'a> {
    fn new(run_env: &'a JobRunEnv, _job_id: &'a str) -> Self {
        Self {
            run_env,
            history: Vec::new(),
            outputs: HashMap::new(),
            counters: HashMap::new(),
            lines: Vec::new(),
            sticky_failed: false,
        }
    }

    fn push_history(&mut self, res: Value) {
        self.history.push(res);
    }

    fn env(&self) -> Value {
        json!({
            "vars": self.run_env.vars,
            "env": self.run_env.process_env,
            "outputs": Value::Object(self.run_env.ancestor_outputs.clone()),
            "steps": self.history,
        })
    }
}

/// Deep-merge `defaults` under `with`, filling only keys absent at any
/// nesting depth. Lists are replace-not-merge: a list present in `with`
/// wins outright, never element-wise merged with a default list.
fn merge_defaults(with: Value, defaults: Option<&Value>) -> Value {
    match (with, defaults) {
        (Value::Object(mut with_map), Some(Value::Object(default_map))) => {
            for (key, default_value) in default_map {
                match with_map.get_mut(key) {
                    Some(existing) => {
                        let taken = std::mem::take(existing);
                        *existing = merge_defaults(taken, Some(default_value));
                    }
                    None => {
                        with_map.insert(key.clone(), default_value.clone());
                    }
                }
            }
            Value::Object(with_map)
        }
        (with_value, _) => with_value,
    }
}

fn augment_with_res_req(env: &Value, res: &Value, req: &Value) -> Value {
    let mut out = env.clone();
    if let Value::Object(map) = &mut out {
        map.insert("res".to_string(), res.clone());
        map.insert("req".to_string(), req.clone());
    }
    out
}

/// Short, deterministic description of a flattened result map for
/// `Error::ActionStatusNonZero`'s detail field.
fn summarize(res: &HashMap<String, String>) -> String {
    if res.is_empty() {
        return "(empty result)".to_string();
    }
    let mut keys: Vec<&String> = res.keys().collect();
    keys.sort();
    keys.into_iter().take(5).map(|k| format!("{k}={}", res[k])).collect::<Vec<_>>().join(", ")
}

/// Legacy `res` builder for plugins written before the `#i#`/`#f#` prefix
/// convention existed. Unlike `wfe_codec::unflatten`, this never reconstructs
/// `__`-nested paths into objects/arrays — those plugins predate that
/// convention too and return a flat map. Not called anywhere on the
/// canonical step path; kept for a future compatibility shim that lets a
/// step opt a known-legacy action into this decode instead.
#[allow(dead_code)]
fn build_res_legacy(raw: &HashMap<String, String>) -> Value {
    Value::Object(wfe_codec::convert_numeric_strings(raw).into_iter().collect())
}
