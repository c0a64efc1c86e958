//! Prometheus metrics for the agent pipeline
//!
//! All metrics live in the default registry. [`render`] produces the text
//! exposition format for scraping or printing.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Loop Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completed agent runs by how the loop stopped.
    ///
    /// Labels:
    /// - termination: "summary" or "max_iterations"
    pub static ref AGENT_RUNS: CounterVec = register_counter_vec!(
        "sandsmith_agent_runs_total",
        "Agent runs by termination reason",
        &["termination"]
    ).expect("failed to register AGENT_RUNS metric");

    /// Agent turns taken per run.
    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "sandsmith_agent_iterations",
        "Agent turns per run",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0, 20.0]
    ).expect("failed to register AGENT_ITERATIONS metric");

    /// Tool invocations.
    ///
    /// Labels:
    /// - tool: "terminal", "createOrUpdateFiles", "readFiles" or the unknown name
    /// - status: "ok" or "failure"
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "sandsmith_tool_calls_total",
        "Tool invocations by tool and status",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Model call latency.
    pub static ref LLM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "sandsmith_llm_call_duration_seconds",
        "Model call latency in seconds",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register LLM_CALL_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Sandbox Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Wall time of `terminal` commands, timeouts included.
    pub static ref SANDBOX_COMMAND_DURATION: Histogram = register_histogram!(
        "sandsmith_sandbox_command_duration_seconds",
        "Sandbox command duration in seconds",
        vec![0.05, 0.25, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]
    ).expect("failed to register SANDBOX_COMMAND_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Workflow Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Named workflow step latency.
    pub static ref WORKFLOW_STEP_DURATION: HistogramVec = register_histogram_vec!(
        "sandsmith_workflow_step_duration_seconds",
        "Workflow step duration in seconds",
        &["step"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]
    ).expect("failed to register WORKFLOW_STEP_DURATION metric");

    /// Workflow steps that returned an error.
    pub static ref WORKFLOW_STEP_FAILURES: CounterVec = register_counter_vec!(
        "sandsmith_workflow_step_failures_total",
        "Workflow steps that failed",
        &["step"]
    ).expect("failed to register WORKFLOW_STEP_FAILURES metric");

    /// Persisted outcomes.
    ///
    /// Labels:
    /// - kind: "result" or "error"
    pub static ref OUTCOMES: CounterVec = register_counter_vec!(
        "sandsmith_outcomes_total",
        "Persisted run outcomes by kind",
        &["kind"]
    ).expect("failed to register OUTCOMES metric");
}

/// Render every registered metric in the Prometheus text format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        OUTCOMES.with_label_values(&["result"]).inc();
        TOOL_CALLS.with_label_values(&["terminal", "ok"]).inc();
        let text = render();
        assert!(text.contains("sandsmith_outcomes_total"));
        assert!(text.contains("sandsmith_tool_calls_total"));
    }
}
