//! Orchestrates one workflow run: builds the scheduler and per-job
//! executor, drives the scheduler's poll loop with a `tokio::spawn`ed task
//! per runnable job and an `mpsc` completion channel, and renders the
//! final declaration-ordered report.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::info;
use wfe_core::{Config, Result};
use wfe_exec::{JobExecutor, JobOutcome, JobReport, JobRunEnv};
use wfe_scheduler::Scheduler;

use crate::dispatch::PluginActionDispatcher;
use crate::model::{into_job_def, into_job_spec, WorkflowDoc};
use crate::report::{buffer_from_report, render_report, skipped_buffer, JobBuffer};
use crate::vars;

pub struct RunOptions {
    pub verbose: bool,
    pub include_rt: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: String,
    pub exit_code: i32,
}

pub async fn run(doc: WorkflowDoc, opts: RunOptions) -> Result<RunSummary> {
    let config = Config::load().unwrap_or_else(|_| Config {
        log: Default::default(),
        defaults: Default::default(),
        plugins: Default::default(),
    });

    let process_env = vars::process_env_value();
    let vars_value = vars::eval_vars(&doc.vars, &process_env)?;

    let job_specs = doc.jobs.iter().map(into_job_spec).collect();
    let mut scheduler = Scheduler::new(job_specs)?;
    let declaration_order: Vec<String> = scheduler.declaration_order().to_vec();

    let job_defs: HashMap<String, wfe_exec::JobDef> =
        doc.jobs.iter().map(|j| (j.effective_id(), into_job_def(j))).collect();

    let search_dirs: Vec<PathBuf> = config.plugins.search_dirs.iter().map(PathBuf::from).collect();
    let dispatcher = PluginActionDispatcher::new(search_dirs);
    let executor = Arc::new(JobExecutor::new(
        dispatcher,
        Duration::from_millis(config.defaults.step_timeout_ms),
        Duration::from_millis(config.defaults.retry_interval_ms),
    ));

    let outputs: Arc<RwLock<HashMap<String, Value>>> = Arc::new(RwLock::new(HashMap::new()));
    let mut buffers: HashMap<String, JobBuffer> = HashMap::new();
    let mut running: HashSet<String> = HashSet::new();

    let (tx, mut rx) = mpsc::channel::<(String, JobReport)>(declaration_order.len().max(1));

    loop {
        let env_for_if = {
            let out = outputs.read().await;
            scheduler_env(&vars_value, &process_env, &out)
        };
        let poll = scheduler.poll(&running, &env_for_if)?;

        for id in &poll.newly_skipped {
            buffers.insert(id.clone(), skipped_buffer(id));
        }

        for id in poll.runnable {
            scheduler.mark_running(&id);
            running.insert(id.clone());

            let job_def = job_defs[&id].clone();
            let run_env = {
                let out = outputs.read().await;
                JobRunEnv {
                    vars: vars_value.clone(),
                    process_env: process_env.clone(),
                    ancestor_outputs: out.clone().into_iter().collect(),
                    verbose: opts.verbose,
                }
            };

            let executor = executor.clone();
            let tx = tx.clone();
            let outputs = outputs.clone();
            tokio::spawn(async move {
                let report = executor.run(&job_def, run_env).await;
                {
                    let mut out = outputs.write().await;
                    out.insert(job_def.id.clone(), Value::Object(report.outputs.clone()));
                }
                let _ = tx.send((job_def.id.clone(), report)).await;
            });
        }

        if poll.finished {
            break;
        }
        if running.is_empty() {
            // Nothing runnable and nothing in flight but not finished: the
            // scheduler's own invariants rule this out for an acyclic
            // graph, but don't spin forever if they're ever violated.
            break;
        }

        if let Some((id, report)) = rx.recv().await {
            running.remove(&id);
            match report.outcome {
                JobOutcome::Completed => scheduler.mark_completed(&id),
                JobOutcome::Failed => scheduler.mark_failed(&id),
            }
            buffers.insert(id.clone(), buffer_from_report(&id, &report));
        }
    }

    let ordered: Vec<JobBuffer> = declaration_order
        .iter()
        .map(|id| buffers.remove(id).unwrap_or_else(|| skipped_buffer(id)))
        .collect();

    let exit_code = if scheduler.all_completed() { 0 } else { 1 };
    info!(exit_code, "workflow run finished");
    Ok(RunSummary { report: render_report(&ordered, opts.include_rt), exit_code })
}

fn scheduler_env(vars: &Value, process_env: &Value, outputs: &HashMap<String, Value>) -> Value {
    serde_json::json!({
        "vars": vars,
        "env": process_env,
        "outputs": outputs,
    })
}
