//! Per-job text buffer and the final ordered report.
//!
//! Jobs complete in whatever order their tasks happen to finish in, but
//! the report is flushed in declaration order regardless — `run` collects
//! one [`JobBuffer`] per job as it finishes and [`render_report`] walks
//! the original declaration order at the end.

use std::time::Duration;

use wfe_exec::{JobOutcome, JobReport, StepLine, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFinalStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct JobBuffer {
    pub job_id: String,
    pub status: JobFinalStatus,
    pub duration: Duration,
    pub lines: Vec<String>,
}

pub fn buffer_from_report(job_id: &str, report: &JobReport) -> JobBuffer {
    let status = match report.outcome {
        JobOutcome::Completed => JobFinalStatus::Completed,
        JobOutcome::Failed => JobFinalStatus::Failed,
    };
    JobBuffer {
        job_id: job_id.to_string(),
        status,
        duration: report.duration,
        lines: report.lines.iter().map(render_step_line).collect(),
    }
}

pub fn skipped_buffer(job_id: &str) -> JobBuffer {
    JobBuffer {
        job_id: job_id.to_string(),
        status: JobFinalStatus::Skipped,
        duration: Duration::ZERO,
        lines: Vec::new(),
    }
}

fn render_step_line(line: &StepLine) -> String {
    let marker = match line.status {
        StepStatus::Ok => "ok",
        StepStatus::Skipped => "skip",
        StepStatus::TestFailed => "test-failed",
        StepStatus::Failed => "failed",
    };
    match &line.detail {
        Some(detail) => format!("  [{marker}] {} - {detail}", line.step_name),
        None => format!("  [{marker}] {}", line.step_name),
    }
}

/// Walk `buffers` in the caller-supplied (declaration) order and render the
/// plain-text report the driver prints to stdout.
pub fn render_report(buffers: &[JobBuffer], include_rt: bool) -> String {
    let mut out = String::new();
    for buf in buffers {
        out.push_str(&format!(
            "== job {} [{}] ==\n",
            buf.job_id,
            status_label(buf.status)
        ));
        for line in &buf.lines {
            out.push_str(line);
            out.push('\n');
        }
        if include_rt {
            out.push_str(&format!("  took {:?}\n", buf.duration));
        }
    }

    let total = buffers.len();
    let completed = buffers.iter().filter(|b| b.status == JobFinalStatus::Completed).count();
    out.push_str(&format!("\n{completed}/{total} jobs completed\n"));
    out
}

fn status_label(status: JobFinalStatus) -> &'static str {
    match status {
        JobFinalStatus::Completed => "completed",
        JobFinalStatus::Failed => "failed",
        JobFinalStatus::Skipped => "skipped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn report_preserves_declaration_order_regardless_of_input_order() {
        let a = buffer_from_report(
            "a",
            &JobReport { outcome: JobOutcome::Completed, lines: vec![], outputs: Map::new(), duration: Duration::ZERO },
        );
        let b = skipped_buffer("b");
        let text = render_report(&[a, b], false);
        assert!(text.find("job a").unwrap() < text.find("job b").unwrap());
        assert!(text.contains("1/2 jobs completed"));
    }
}
