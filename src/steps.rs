//! Named workflow steps
//!
//! Each unit of work in the workflow runs through [`StepRunner::run`], which
//! gives it a `workflow_step` span, records its duration and counts its
//! failures. Errors are returned untouched; retry policy belongs to whoever
//! drives the workflow.

use std::future::Future;
use std::time::Instant;

use tracing::{debug, info_span, warn, Instrument};

use crate::metrics::{WORKFLOW_STEP_DURATION, WORKFLOW_STEP_FAILURES};

#[derive(Debug, Clone)]
pub struct StepRunner {
    trace_id: String,
}

impl StepRunner {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Run `work` as the step `name`
    pub async fn run<T, E, Fut>(&self, name: &str, work: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let span = info_span!(
            "workflow_step",
            trace_id = %self.trace_id,
            step = name,
            otel.name = "workflow_step"
        );

        let started = Instant::now();
        let result = work.instrument(span).await;
        let elapsed = started.elapsed().as_secs_f64();
        WORKFLOW_STEP_DURATION.with_label_values(&[name]).observe(elapsed);

        match &result {
            Ok(_) => debug!(trace_id = %self.trace_id, step = name, duration_ms = elapsed * 1000.0, "Step completed"),
            Err(e) => {
                WORKFLOW_STEP_FAILURES.with_label_values(&[name]).inc();
                warn!(trace_id = %self.trace_id, step = name, error = %e, "Step failed");
            }
        }
        result
    }
}
