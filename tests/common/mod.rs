//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sandsmith::agent::prompts::{FRAGMENT_TITLE_PROMPT, RESPONSE_PROMPT};
use sandsmith::llm::{ModelClient, ModelError, ModelReply, ModelRequest, Segment};
use sandsmith::ollama::tool_use::{ChatMessage, ToolCall};

/// Model double with a queue of agent replies and fixed generator replies
///
/// Requests are told apart by their system prompt. When the agent queue
/// runs dry every further agent turn gets `idle`.
pub struct ScriptedModel {
    agent_replies: Mutex<VecDeque<ModelReply>>,
    idle: ModelReply,
    title: ModelReply,
    response: ModelReply,
    agent_calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(agent_replies: Vec<ModelReply>) -> Self {
        Self {
            agent_replies: Mutex::new(agent_replies.into()),
            idle: ModelReply::text("Still working on it."),
            title: ModelReply::text("Readme Setup"),
            response: ModelReply::text("I added a README for you."),
            agent_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_title(mut self, reply: ModelReply) -> Self {
        self.title = reply;
        self
    }

    pub fn with_response(mut self, reply: ModelReply) -> Self {
        self.response = reply;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of agent turns the model has served
    pub fn agent_turns(&self) -> usize {
        self.agent_calls.lock().unwrap().len()
    }

    /// Transcript sent with the n-th agent call
    pub fn agent_transcript(&self, n: usize) -> Vec<ChatMessage> {
        self.agent_calls.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        if request.system == FRAGMENT_TITLE_PROMPT {
            return Ok(self.title.clone());
        }
        if request.system == RESPONSE_PROMPT {
            return Ok(self.response.clone());
        }

        self.agent_calls
            .lock()
            .unwrap()
            .push(request.messages.to_vec());
        let next = self.agent_replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.idle.clone()))
    }
}

pub fn write_files(files: &[(&str, &str)]) -> ModelReply {
    let entries: Vec<_> = files
        .iter()
        .map(|(path, content)| serde_json::json!({"path": path, "content": content}))
        .collect();
    ModelReply::new(vec![Segment::ToolCall(ToolCall::new(
        "createOrUpdateFiles",
        serde_json::json!({ "files": entries }),
    ))])
}

pub fn terminal(command: &str) -> ModelReply {
    ModelReply::new(vec![Segment::ToolCall(ToolCall::new(
        "terminal",
        serde_json::json!({ "command": command }),
    ))])
}

pub fn summary(text: &str) -> ModelReply {
    ModelReply::text(format!("<task_summary>\n{}\n</task_summary>", text))
}
