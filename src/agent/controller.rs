//! Agent Controller - the orchestration loop
//!
//! The controller owns the running transcript and the [`SharedRunState`]
//! for one run. Each iteration it asks the router for a decision, runs the
//! selected agent for one turn and records the turn's termination signal.
//! Turns never overlap, so the state needs no locking.

use std::collections::HashMap;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::reasoning::ReasoningAgent;
use super::router::{Route, RouteContext, Router, RouterState, Termination};
use super::state::SharedRunState;
use crate::llm::ModelError;
use crate::metrics::{AGENT_ITERATIONS, AGENT_RUNS};
use crate::ollama::tool_use::ChatMessage;

/// Configuration for an agent run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model for the coding agent (e.g., "qwen3")
    pub model: String,
    /// Model for the title and response generators
    pub postprocess_model: String,
    /// Maximum number of agent turns before stopping
    pub max_iterations: usize,
    /// Sandbox template for new sessions
    pub template: String,
    /// Number of past messages fed to the agent
    pub history_limit: usize,
    /// Upper bound for one `terminal` call in seconds
    pub command_timeout_secs: u64,
    /// Substring that marks a completion summary
    pub termination_marker: String,
    /// Port the generated app is served on inside the sandbox
    pub app_port: u16,
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "qwen3".to_string(),
            postprocess_model: "qwen3".to_string(),
            max_iterations: 10,
            template: "sandsmith-nextjs".to_string(),
            history_limit: 5,
            command_timeout_secs: 120,
            termination_marker: "<task_summary>".to_string(),
            app_port: 3000,
            system_prompt: None,
        }
    }
}

/// Result of a finished loop
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Shared state at termination
    pub final_state: SharedRunState,
    /// Agent turns executed
    pub iterations: usize,
    /// Always `DoneSummary` or `DoneMaxIter`
    pub state: RouterState,
    /// Tool calls executed across all turns
    pub tool_calls: usize,
    /// Unique trace ID for this run
    pub trace_id: String,
}

/// Error type for the loop
#[derive(Debug)]
pub enum AgentError {
    /// Model call failed
    Model(ModelError),
    /// Router selected an agent that is not registered
    UnknownAgent(String),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Model(e) => write!(f, "Model error: {}", e),
            AgentError::UnknownAgent(name) => write!(f, "Router selected unknown agent '{}'", name),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<ModelError> for AgentError {
    fn from(e: ModelError) -> Self {
        AgentError::Model(e)
    }
}

/// Loop driver over a set of agents
pub struct AgentController {
    agents: HashMap<String, ReasoningAgent>,
    router: Box<dyn Router>,
}

impl AgentController {
    /// Create a controller with a single agent
    ///
    /// # Arguments
    /// * `agent` - Agent the router can select by name
    /// * `router` - Routing policy evaluated before every turn
    pub fn new(agent: ReasoningAgent, router: Box<dyn Router>) -> Self {
        let mut agents = HashMap::new();
        agents.insert(agent.name().to_string(), agent);
        Self { agents, router }
    }

    /// Register another agent the router may select
    pub fn with_agent(mut self, agent: ReasoningAgent) -> Self {
        self.agents.insert(agent.name().to_string(), agent);
        self
    }

    /// Run the loop until the router stops it
    ///
    /// # Arguments
    /// * `transcript` - Prior turns plus the user request, oldest first
    /// * `state` - Seeded shared state (usually empty)
    pub async fn run(
        &self,
        mut transcript: Vec<ChatMessage>,
        mut state: SharedRunState,
    ) -> Result<RunResult, AgentError> {
        let trace_id = Uuid::now_v7().to_string();
        let root_span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            transcript_len = transcript.len(),
            otel.name = "agent_run"
        );

        async move {
            info!(trace_id = %trace_id, "Starting agent run");

            let mut iterations = 0;
            let mut tool_calls = 0;
            let mut last_agent: Option<String> = None;

            let termination = loop {
                let route = self.router.route(&RouteContext {
                    state: &state,
                    iterations,
                    last_agent: last_agent.as_deref(),
                });

                let name = match route {
                    Route::Stop(termination) => break termination,
                    Route::Run(name) => name,
                };
                let agent = self
                    .agents
                    .get(&name)
                    .ok_or_else(|| AgentError::UnknownAgent(name.clone()))?;

                let turn_span = info_span!(
                    "agent_turn",
                    trace_id = %trace_id,
                    iteration = iterations + 1,
                    agent = %name,
                    otel.name = "agent_turn"
                );
                let turn = agent
                    .turn(&mut transcript, &mut state)
                    .instrument(turn_span)
                    .await?;

                iterations += 1;
                tool_calls += turn.tool_calls.len();

                if let Some(summary) = turn.termination {
                    debug!(trace_id = %trace_id, iteration = iterations, "Termination marker found");
                    state.record_summary(summary);
                }
                last_agent = Some(name);
            };

            match termination {
                Termination::Summary => {
                    info!(trace_id = %trace_id, iterations, tool_calls, files = state.files().len(), "Agent run completed")
                }
                Termination::MaxIterations => {
                    warn!(trace_id = %trace_id, iterations, "Max iterations reached")
                }
            }
            AGENT_RUNS.with_label_values(&[termination.as_str()]).inc();
            AGENT_ITERATIONS.observe(iterations as f64);

            Ok::<_, AgentError>(RunResult {
                final_state: state,
                iterations,
                state: termination.into(),
                tool_calls,
                trace_id,
            })
        }
        .instrument(root_span)
        .await
    }
}
