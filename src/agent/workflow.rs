//! End-to-end code agent workflow
//!
//! ```text
//! TriggerEvent{project_id, value}
//!      │
//!      ├─ get-sandbox-id ........ Sandbox::create(template)
//!      ├─ get-previous-messages . history window, oldest first
//!      ├─ code-agent ............ AgentController loop (agent ⇄ tools)
//!      ├─ post-process .......... title + response generators
//!      ├─ get-sandbox-url ....... https://{host(app_port)}
//!      └─ save-result ........... classify, persist message (+ fragment)
//!      │
//!      ▼
//!   Outcome{url, title, summary, files}
//! ```
//!
//! Infrastructure failures (sandbox unreachable, store errors, model
//! transport errors) end the workflow with a [`WorkflowError`]. Tool
//! failures never do; the agent sees them as tool output.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use super::controller::{AgentConfig, AgentController, AgentError, RunResult};
use super::history::load_history;
use super::outcome::{classify, persist_outcome, Outcome, OutcomeKind};
use super::postprocess::{PostProcessed, PostProcessor, FALLBACK_TITLE};
use super::prompts::CODE_AGENT_PROMPT;
use super::reasoning::ReasoningAgent;
use super::router::SummaryRouter;
use super::state::SharedRunState;
use crate::llm::{ModelClient, ModelError};
use crate::ollama::tool_use::ChatMessage;
use crate::sandbox::{sandbox_url, Sandbox, SandboxError};
use crate::steps::StepRunner;
use crate::store::{Fragment, MessageStore, StoreError};
use crate::tools::ToolSet;

/// Name the router uses for the coding agent
pub const CODE_AGENT: &str = "code-agent";

/// A user request for a project
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub project_id: String,
    pub value: String,
}

impl TriggerEvent {
    pub fn new(project_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            value: value.into(),
        }
    }
}

/// Error type for workflow runs
#[derive(Debug)]
pub enum WorkflowError {
    Sandbox(SandboxError),
    Store(StoreError),
    Agent(AgentError),
    Model(ModelError),
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Sandbox(e) => write!(f, "Sandbox error: {}", e),
            WorkflowError::Store(e) => write!(f, "Store error: {}", e),
            WorkflowError::Agent(e) => write!(f, "Agent error: {}", e),
            WorkflowError::Model(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<SandboxError> for WorkflowError {
    fn from(e: SandboxError) -> Self {
        WorkflowError::Sandbox(e)
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        WorkflowError::Store(e)
    }
}

impl From<AgentError> for WorkflowError {
    fn from(e: AgentError) -> Self {
        WorkflowError::Agent(e)
    }
}

impl From<ModelError> for WorkflowError {
    fn from(e: ModelError) -> Self {
        WorkflowError::Model(e)
    }
}

/// Wires the model, sandbox and store into one coding-agent run
pub struct CodeAgentWorkflow {
    model: Arc<dyn ModelClient>,
    sandbox: Arc<dyn Sandbox>,
    store: Arc<dyn MessageStore>,
    config: AgentConfig,
}

impl CodeAgentWorkflow {
    /// # Arguments
    /// * `model` - Model used by the agent and the post-processors
    /// * `sandbox` - Backend the run's session is created on
    /// * `store` - History source and outcome sink
    /// * `config` - Agent configuration
    pub fn new(
        model: Arc<dyn ModelClient>,
        sandbox: Arc<dyn Sandbox>,
        store: Arc<dyn MessageStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            sandbox,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Handle one trigger event
    pub async fn run(&self, event: &TriggerEvent) -> Result<Outcome, WorkflowError> {
        let steps = StepRunner::new(Uuid::now_v7().to_string());
        info!(
            trace_id = %steps.trace_id(),
            project_id = %event.project_id,
            "Workflow triggered"
        );

        let session_id = steps
            .run("get-sandbox-id", self.sandbox.create(&self.config.template))
            .await?;

        let history = steps
            .run(
                "get-previous-messages",
                load_history(self.store.as_ref(), &event.project_id, self.config.history_limit),
            )
            .await?;
        let transcript = with_request(history, &event.value);

        let run = steps
            .run("code-agent", self.run_agent(&session_id, transcript))
            .await?;

        let summary = run.final_state.summary().to_string();
        let post = steps
            .run("post-process", PostProcessor::new(self.model.clone(), &self.config.postprocess_model).run(&summary))
            .await?;

        let url = steps
            .run("get-sandbox-url", async {
                let session = self.sandbox.connect(&session_id).await?;
                Ok::<_, SandboxError>(sandbox_url(session.as_ref(), self.config.app_port))
            })
            .await?;

        let kind = classify(&run.final_state);
        let (_, files) = run.final_state.into_parts();
        let PostProcessed { title, response } = post;

        let fragment = Fragment {
            sandbox_url: url.clone(),
            title: title.clone(),
            files: files.clone(),
        };
        steps
            .run(
                "save-result",
                persist_outcome(self.store.as_ref(), &event.project_id, kind, &response, fragment),
            )
            .await?;

        let title = match kind {
            OutcomeKind::Result => title,
            OutcomeKind::Error => FALLBACK_TITLE.to_string(),
        };
        Ok(Outcome {
            url,
            title,
            summary,
            files,
        })
    }

    async fn run_agent(
        &self,
        session_id: &str,
        transcript: Vec<ChatMessage>,
    ) -> Result<RunResult, AgentError> {
        let tools = ToolSet::new(
            self.sandbox.clone(),
            session_id,
            Duration::from_secs(self.config.command_timeout_secs),
        );
        let prompt = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| CODE_AGENT_PROMPT.to_string());
        let agent = ReasoningAgent::new(
            CODE_AGENT,
            prompt,
            &self.config.model,
            &self.config.termination_marker,
            self.model.clone(),
            tools,
        );
        let router = SummaryRouter::new(CODE_AGENT, self.config.max_iterations);

        AgentController::new(agent, Box::new(router))
            .run(transcript, SharedRunState::new())
            .await
    }
}

/// Append the request unless history already ends with it
///
/// Callers usually persist the user message before triggering a run, so
/// the newest history entry is often the request itself.
pub fn with_request(mut history: Vec<ChatMessage>, request: &str) -> Vec<ChatMessage> {
    let request_message = ChatMessage::user(request);
    if history.last() != Some(&request_message) {
        history.push(request_message);
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_appended() {
        let transcript = with_request(vec![ChatMessage::assistant("hi")], "add a readme");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1], ChatMessage::user("add a readme"));
    }

    #[test]
    fn test_persisted_request_not_duplicated() {
        let history = vec![ChatMessage::assistant("hi"), ChatMessage::user("add a readme")];
        assert_eq!(with_request(history, "add a readme").len(), 2);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(with_request(Vec::new(), "x"), vec![ChatMessage::user("x")]);
    }
}
