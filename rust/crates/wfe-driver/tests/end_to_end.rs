//! The six concrete end-to-end scenarios from the workflow engine's
//! concurrency model, driving the real `echo` fixture plugin over the
//! real plugin host protocol rather than a mocked dispatcher.

use std::io::Write;
use std::sync::Mutex;

use wfe_driver::{load_workflow, run, RunOptions};

/// `PluginActionDispatcher` resolves a binary from the process's current
/// directory by default, so tests that rely on it serialize on this lock
/// rather than racing each other's `set_current_dir`.
static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Copy the workspace-built `echo` plugin binary into a fresh directory
/// named the way `PluginActionDispatcher` expects (`probe-rs-plugin-echo`)
/// and `chdir` there for the duration of the future.
async fn with_echo_plugin<F, Fut>(f: F) -> Fut::Output
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let _guard = CWD_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("probe-rs-plugin-echo");
    std::fs::copy(env!("CARGO_BIN_FILE_PROBE_RS_PLUGIN_ECHO_probe-rs-plugin-echo"), &dest).unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let result = f().await;
    std::env::set_current_dir(original).unwrap();
    result
}

fn workflow(yaml: &str) -> wfe_driver::WorkflowDoc {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();
    load_workflow(&[f.path()]).unwrap()
}

#[tokio::test]
async fn linear_chain_runs_in_declaration_order() {
    let doc = workflow(
        r#"
name: linear
jobs:
  - name: a
    steps: [{name: ping, uses: echo, with: {msg: a}}]
  - name: b
    needs: [a]
    steps: [{name: ping, uses: echo, with: {msg: b}}]
  - name: c
    needs: [b]
    steps: [{name: ping, uses: echo, with: {msg: c}}]
"#,
    );

    let summary = with_echo_plugin(|| run(doc, RunOptions { verbose: false, include_rt: false })).await.unwrap();
    assert_eq!(summary.exit_code, 0);
    let a = summary.report.find("job a").unwrap();
    let b = summary.report.find("job b").unwrap();
    let c = summary.report.find("job c").unwrap();
    assert!(a < b && b < c);
    assert!(summary.report.contains("3/3 jobs completed"));
}

#[tokio::test]
async fn diamond_with_failure_skips_the_downstream_job() {
    let state_file = tempfile::NamedTempFile::new().unwrap();
    let doc = workflow(&format!(
        r#"
name: diamond
jobs:
  - name: a
    steps: [{{name: ping, uses: echo, with: {{msg: a}}}}]
  - name: b
    needs: [a]
    steps: [{{name: fail, uses: echo, with: {{__test_fail_count: "5", __test_state_file: "{state}"}}}}]
  - name: c
    needs: [a]
    steps: [{{name: ping, uses: echo, with: {{msg: c}}}}]
  - name: d
    needs: [b, c]
    steps: [{{name: ping, uses: echo, with: {{msg: d}}}}]
"#,
        state = state_file.path().display()
    ));

    let summary = with_echo_plugin(|| run(doc, RunOptions { verbose: false, include_rt: false })).await.unwrap();
    assert_eq!(summary.exit_code, 1);
    assert!(summary.report.contains("job a [completed]"));
    assert!(summary.report.contains("job b [failed]"));
    assert!(summary.report.contains("job c [completed]"));
    assert!(summary.report.contains("job d [skipped]"));
}

#[tokio::test]
async fn parallel_independent_jobs_report_in_declaration_order() {
    let doc = workflow(
        r#"
name: parallel
jobs:
  - name: x
    steps: [{name: ping, uses: echo, with: {__test_delay_ms: "30"}}]
  - name: y
    steps: [{name: ping, uses: echo, with: {__test_delay_ms: "10"}}]
  - name: z
    steps: [{name: ping, uses: echo, with: {__test_delay_ms: "20"}}]
"#,
    );

    let summary = with_echo_plugin(|| run(doc, RunOptions { verbose: false, include_rt: false })).await.unwrap();
    assert_eq!(summary.exit_code, 0);
    let x = summary.report.find("job x").unwrap();
    let y = summary.report.find("job y").unwrap();
    let z = summary.report.find("job z").unwrap();
    assert!(x < y && y < z, "report must stay in declaration order even though y finishes first");
}

#[tokio::test]
async fn cycle_is_rejected_before_any_job_runs() {
    let doc = workflow(
        r#"
name: cyclic
jobs:
  - name: a
    needs: [b]
    steps: []
  - name: b
    needs: [a]
    steps: []
"#,
    );

    let err = run(doc, RunOptions { verbose: false, include_rt: false }).await.unwrap_err();
    assert!(matches!(err, wfe_core::Error::CycleDetected(_)));
}

#[test]
fn flatten_unflatten_round_trips_a_nested_body() {
    let input = serde_json::json!({
        "user": {"name": "a", "age": 30},
        "tags": ["x", "y"],
    });
    let flat = wfe_codec::flatten(&input);
    assert_eq!(flat.get("user__name").unwrap(), "a");
    assert_eq!(flat.get("user__age").unwrap(), "#i#30");
    assert_eq!(flat.get("tags__0").unwrap(), "x");
    assert_eq!(flat.get("tags__1").unwrap(), "y");
    assert_eq!(wfe_codec::unflatten(&flat).unwrap(), input);
}

#[tokio::test]
async fn retry_succeeds_on_the_third_attempt() {
    let state_file = tempfile::NamedTempFile::new().unwrap();
    let doc = workflow(&format!(
        r#"
name: retry
jobs:
  - name: flaky
    steps:
      - name: call
        uses: echo
        with:
          __test_fail_count: "2"
          __test_state_file: "{state}"
        retry:
          max_attempts: 3
          interval_ms: 50
"#,
        state = state_file.path().display()
    ));

    let started = std::time::Instant::now();
    let summary = with_echo_plugin(|| run(doc, RunOptions { verbose: false, include_rt: false })).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.exit_code, 0);
    assert!(summary.report.contains("job flaky [completed]"));
    assert!(elapsed >= std::time::Duration::from_millis(100));
}
