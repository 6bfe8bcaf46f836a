//! Job-level dependency scheduler.
//!
//! Generalizes the teacher's `fd_dag::DagScheduler` (`step_status` map,
//! `complete_step`/`fail_step`/`skip_step`, BFS `skip_dependents`) from a
//! step-level scheduler baked to `StepDefinition` into a job-level one: job
//! identity is an author-chosen string, readiness and cycle detection are
//! delegated to the generic algorithms in `wfe-dag`, and a job's `if` is
//! evaluated here (not by the executor) before it is ever admitted to
//! `Running`.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;
use tracing::{debug, info, warn};
use wfe_core::{Error, Result};

/// Minimal shape the scheduler needs to know about a job; step bodies are
/// opaque to it and live in the caller (`wfe-driver`).
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: String,
    pub if_expr: Option<String>,
    pub needs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped)
    }
}

/// What a `poll` found: jobs newly admitted to `Running`, jobs that were
/// skipped during this poll (either a falsy `if` or failure propagation),
/// and whether the run is finished.
#[derive(Debug, Clone, Default)]
pub struct PollResult {
    pub runnable: Vec<String>,
    pub newly_skipped: Vec<String>,
    pub finished: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    order: Vec<String>,
    jobs: HashMap<String, JobSpec>,
    /// Reverse of `needs`: job id -> ids that declare it in their `needs`.
    dependents: HashMap<String, Vec<String>>,
    status: HashMap<String, JobStatus>,
}

impl Scheduler {
    /// `AdmitJob` + `ValidateDependencies`: every `needs` entry must name a
    /// known job, and the dependency graph must be acyclic. Both checks run
    /// before any job is admitted, so a malformed workflow never starts a
    /// single job.
    pub fn new(jobs: Vec<JobSpec>) -> Result<Self> {
        let known: HashSet<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        for job in &jobs {
            for need in &job.needs {
                if !known.contains(need.as_str()) {
                    return Err(Error::Config(format!(
                        "job {:?} needs unknown job {:?}",
                        job.id, need
                    )));
                }
            }
        }

        let order: Vec<String> = jobs.iter().map(|j| j.id.clone()).collect();
        let needs_of: HashMap<String, Vec<String>> =
            jobs.iter().map(|j| (j.id.clone(), j.needs.clone())).collect();

        if let Some(cycle) = wfe_dag::detect_cycle(&order, |id| needs_of.get(id).cloned().unwrap_or_default()) {
            return Err(Error::CycleDetected(cycle.join(" \u{2192} ")));
        }

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for job in &jobs {
            for need in &job.needs {
                dependents.entry(need.clone()).or_default().push(job.id.clone());
            }
        }

        let status = order.iter().map(|id| (id.clone(), JobStatus::Pending)).collect();
        let jobs_map = jobs.into_iter().map(|j| (j.id.clone(), j)).collect();

        Ok(Self { order, jobs: jobs_map, dependents, status })
    }

    pub fn declaration_order(&self) -> &[String] {
        &self.order
    }

    pub fn status_of(&self, id: &str) -> Option<JobStatus> {
        self.status.get(id).copied()
    }

    pub fn all_completed(&self) -> bool {
        self.status.values().all(|s| *s == JobStatus::Completed)
    }

    fn all_terminal(&self) -> bool {
        self.status.values().all(|s| s.is_terminal())
    }

    /// One scheduling round. `running` is the set of job ids the caller
    /// currently has a task in flight for; `env` is the `vars`/`env`/
    /// `outputs` environment job-level `if` expressions evaluate against.
    pub fn poll(&mut self, running: &HashSet<String>, env: &Value) -> Result<PollResult> {
        let mut runnable = Vec::new();
        let mut newly_skipped = Vec::new();

        for id in self.order.clone() {
            if self.status[&id] != JobStatus::Pending {
                continue;
            }
            let deps_satisfied = self.jobs[&id]
                .needs
                .iter()
                .all(|need| self.status[need] == JobStatus::Completed);
            if !deps_satisfied {
                continue;
            }

            let truthy = match &self.jobs[&id].if_expr {
                Some(expr) => wfe_expr::eval_bool(expr, env)?,
                None => true,
            };
            if truthy {
                runnable.push(id);
            } else {
                debug!(job = %id, "job `if` is falsy, skipping");
                self.status.insert(id.clone(), JobStatus::Skipped);
                newly_skipped.push(id);
            }
        }

        if runnable.is_empty() && running.is_empty() {
            newly_skipped.extend(self.propagate_skips());
        }

        let finished = self.all_terminal() && runnable.is_empty() && running.is_empty();
        if finished {
            info!(failed = self.any_failed(), "workflow run finished");
        }

        Ok(PollResult { runnable, newly_skipped, finished })
    }

    pub fn mark_running(&mut self, id: &str) {
        self.status.insert(id.to_string(), JobStatus::Running);
    }

    pub fn mark_completed(&mut self, id: &str) {
        self.status.insert(id.to_string(), JobStatus::Completed);
        debug!(job = id, "job completed");
    }

    pub fn mark_failed(&mut self, id: &str) {
        self.status.insert(id.to_string(), JobStatus::Failed);
        warn!(job = id, "job failed");
    }

    fn any_failed(&self) -> bool {
        self.status.values().any(|s| *s == JobStatus::Failed)
    }

    /// BFS over the dependents graph from every currently `Failed` or
    /// `Skipped` job, marking any `Pending` job reachable from one
    /// `Skipped` too. A job already `Skipped` is itself a valid seed, so a
    /// single BFS captures the whole transitive closure in one pass.
    fn propagate_skips(&mut self) -> Vec<String> {
        let mut newly_skipped = Vec::new();
        let mut queue: VecDeque<String> = self
            .order
            .iter()
            .filter(|id| matches!(self.status[*id], JobStatus::Failed | JobStatus::Skipped))
            .cloned()
            .collect();
        let mut visited: HashSet<String> = queue.iter().cloned().collect();

        while let Some(id) = queue.pop_front() {
            let Some(children) = self.dependents.get(&id).cloned() else { continue };
            for child in children {
                if !visited.insert(child.clone()) {
                    continue;
                }
                if self.status[&child] == JobStatus::Pending {
                    self.status.insert(child.clone(), JobStatus::Skipped);
                    newly_skipped.push(child.clone());
                }
                queue.push_back(child);
            }
        }

        newly_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(id: &str, needs: &[&str]) -> JobSpec {
        JobSpec { id: id.to_string(), if_expr: None, needs: needs.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn linear_chain_runs_in_order() {
        let mut sched = Scheduler::new(vec![job("a", &[]), job("b", &["a"]), job("c", &["b"])]).unwrap();
        let env = json!({});
        let running = HashSet::new();

        let r = sched.poll(&running, &env).unwrap();
        assert_eq!(r.runnable, vec!["a"]);
        sched.mark_running("a");
        sched.mark_completed("a");

        let r = sched.poll(&running, &env).unwrap();
        assert_eq!(r.runnable, vec!["b"]);
        sched.mark_running("b");
        sched.mark_completed("b");

        let r = sched.poll(&running, &env).unwrap();
        assert_eq!(r.runnable, vec!["c"]);
        sched.mark_running("c");
        sched.mark_completed("c");

        let r = sched.poll(&running, &env).unwrap();
        assert!(r.finished);
    }

    #[test]
    fn diamond_with_failure_skips_downstream() {
        // A -> {B, C} -> D, B fails.
        let mut sched =
            Scheduler::new(vec![job("a", &[]), job("b", &["a"]), job("c", &["a"]), job("d", &["b", "c"])]).unwrap();
        let env = json!({});
        let running = HashSet::new();

        sched.poll(&running, &env).unwrap();
        sched.mark_running("a");
        sched.mark_completed("a");

        let r = sched.poll(&running, &env).unwrap();
        let mut runnable = r.runnable.clone();
        runnable.sort();
        assert_eq!(runnable, vec!["b", "c"]);

        sched.mark_running("b");
        sched.mark_failed("b");
        sched.mark_running("c");
        sched.mark_completed("c");

        let r = sched.poll(&running, &env).unwrap();
        assert_eq!(r.newly_skipped, vec!["d"]);
        assert!(r.finished);
        assert_eq!(sched.status_of("d"), Some(JobStatus::Skipped));
    }

    #[test]
    fn parallel_independent_jobs_all_runnable_together() {
        let mut sched = Scheduler::new(vec![job("x", &[]), job("y", &[]), job("z", &[])]).unwrap();
        let env = json!({});
        let r = sched.poll(&HashSet::new(), &env).unwrap();
        assert_eq!(r.runnable, vec!["x", "y", "z"]);
    }

    #[test]
    fn cycle_is_rejected_before_any_job_runs() {
        let err = Scheduler::new(vec![job("a", &["b"]), job("b", &["a"])]).unwrap_err();
        assert!(matches!(err, Error::CycleDetected(_)));
    }

    #[test]
    fn unknown_need_is_rejected() {
        let err = Scheduler::new(vec![job("a", &["ghost"])]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn falsy_if_skips_without_running() {
        let mut jobs = vec![job("a", &[])];
        jobs[0].if_expr = Some("false".to_string());
        let mut sched = Scheduler::new(jobs).unwrap();
        let r = sched.poll(&HashSet::new(), &json!({})).unwrap();
        assert!(r.runnable.is_empty());
        assert_eq!(r.newly_skipped, vec!["a"]);
        assert_eq!(sched.status_of("a"), Some(JobStatus::Skipped));
    }
}
