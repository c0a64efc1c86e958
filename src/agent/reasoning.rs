//! The coding agent
//!
//! One turn is one model call followed by the tool calls that reply
//! requested, executed in order. The turn reports a termination signal
//! instead of writing the summary itself; the loop driver decides what to
//! do with it.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::state::SharedRunState;
use crate::llm::{ModelClient, ModelError, ModelRequest};
use crate::metrics::LLM_CALL_DURATION;
use crate::ollama::tool_use::{ChatMessage, Tool, ToolCall};
use crate::tools::{ToolOutcome, ToolSet};

/// What happened during one turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTurn {
    /// Last textual output of the reply, if any
    pub text: Option<String>,
    /// Tool calls executed, in order, with their outcomes
    pub tool_calls: Vec<(ToolCall, ToolOutcome)>,
    /// Full text to record as summary when the marker was present
    pub termination: Option<String>,
}

/// Return `text` when it contains `marker`
pub fn detect_termination(text: &str, marker: &str) -> Option<String> {
    if !marker.is_empty() && text.contains(marker) {
        Some(text.to_string())
    } else {
        None
    }
}

/// An LLM-driven actor bound to a tool set
pub struct ReasoningAgent {
    name: String,
    system_prompt: String,
    model: String,
    marker: String,
    client: Arc<dyn ModelClient>,
    tools: ToolSet,
    definitions: Vec<Tool>,
}

impl ReasoningAgent {
    /// # Arguments
    /// * `name` - Name the router uses to select this agent
    /// * `system_prompt` - Fixed instruction for every call
    /// * `model` - Model identifier
    /// * `marker` - Termination marker substring
    /// * `client` - Model to call
    /// * `tools` - Tool set bound to this run's sandbox
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        marker: impl Into<String>,
        client: Arc<dyn ModelClient>,
        tools: ToolSet,
    ) -> Self {
        let definitions = tools.definitions();
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            model: model.into(),
            marker: marker.into(),
            client,
            tools,
            definitions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one turn
    ///
    /// The reply and every tool result are appended to `transcript`. Tool
    /// calls may mutate `state`; the summary is left for the caller.
    pub async fn turn(
        &self,
        transcript: &mut Vec<ChatMessage>,
        state: &mut SharedRunState,
    ) -> Result<AgentTurn, ModelError> {
        let started = Instant::now();
        let reply = self
            .client
            .complete(ModelRequest {
                system: &self.system_prompt,
                model: &self.model,
                tools: &self.definitions,
                messages: transcript.as_slice(),
            })
            .await?;
        let elapsed = started.elapsed().as_secs_f64();
        LLM_CALL_DURATION
            .with_label_values(&[&self.model])
            .observe(elapsed);

        let text = reply.last_text();
        let calls = reply.tool_calls();
        debug!(
            agent = %self.name,
            duration_ms = elapsed * 1000.0,
            tool_calls = calls.len(),
            has_text = text.is_some(),
            "Model replied"
        );

        transcript.push(ChatMessage::assistant_with_tools(
            text.clone().unwrap_or_default(),
            calls.clone(),
        ));

        let mut executed = Vec::with_capacity(calls.len());
        for call in calls {
            info!(agent = %self.name, tool = %call.function.name, "Executing tool call");
            let outcome = self.tools.dispatch(&call, state).await;
            transcript.push(ChatMessage::tool(
                call.function.name.clone(),
                outcome.text(),
            ));
            executed.push((call, outcome));
        }

        let termination = text
            .as_deref()
            .and_then(|t| detect_termination(t, &self.marker));

        Ok(AgentTurn {
            text,
            tool_calls: executed,
            termination,
        })
    }
}
