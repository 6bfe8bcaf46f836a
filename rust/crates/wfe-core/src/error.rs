//! Error taxonomy for the workflow engine

/// Result type alias using the engine's `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-wide error taxonomy, matching the classification the run report
/// surfaces to the user (see `error_code` / `is_gate`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ==========================================================================
    // Pre-run errors — surfaced before any job executes, abort with exit 1
    // ==========================================================================
    #[error("config error: {0}")]
    Config(String),

    #[error("cycle detected in job dependency graph: {0}")]
    CycleDetected(String),

    // ==========================================================================
    // Step-level errors
    // ==========================================================================
    #[error("expression error: {0}")]
    Expr(String),

    #[error("plugin transport error: {0}")]
    PluginTransport(String),

    #[error("plugin error: {0}")]
    PluginError(String),

    #[error("test assertion failed: {0}")]
    TestFailed(String),

    #[error("action returned non-zero status ({status}): {detail}")]
    ActionStatusNonZero { status: i64, detail: String },

    // ==========================================================================
    // Internal
    // ==========================================================================
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable error code for reports and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::CycleDetected(_) => "CYCLE_DETECTED",
            Error::Expr(_) => "EXPR_ERROR",
            Error::PluginTransport(_) => "PLUGIN_TRANSPORT",
            Error::PluginError(_) => "PLUGIN_ERROR",
            Error::TestFailed(_) => "TEST_FAILED",
            Error::ActionStatusNonZero { .. } => "ACTION_STATUS_NON_ZERO",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this failure should halt remaining steps in the job (a
    /// "gate") or merely mark the step failed and let the job continue.
    ///
    /// Convention: a `test` failure is non-gate (the job keeps running
    /// subsequent steps); everything else that fails a step is a gate.
    pub fn is_gate(&self) -> bool {
        !matches!(self, Error::TestFailed(_))
    }

    /// Whether a step using this error's classification may be retried by
    /// the engine's top-level retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::PluginTransport(_) | Error::ActionStatusNonZero { .. }
        )
    }

    /// Process exit code implied when this error aborts the whole run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::CycleDetected(_) => 1,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_is_non_gate() {
        let e = Error::TestFailed("res.status == 0".into());
        assert!(!e.is_gate());
    }

    #[test]
    fn action_status_non_zero_is_gate_and_retryable() {
        let e = Error::ActionStatusNonZero {
            status: 1,
            detail: "boom".into(),
        };
        assert!(e.is_gate());
        assert!(e.is_retryable());
    }

    #[test]
    fn cycle_detected_is_gate() {
        let e = Error::CycleDetected("a -> b -> a".into());
        assert!(e.is_gate());
        assert!(!e.is_retryable());
    }
}
