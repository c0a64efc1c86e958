//! Model invocation seam
//!
//! The agent loop and the post-processors only talk to a language model
//! through [`ModelClient`]. A reply is an ordered list of [`Segment`]s so
//! callers never probe JSON shapes at runtime: text arrives either as one
//! string or as an ordered list of fragments, and anything else is a tool
//! call.

use async_trait::async_trait;

use crate::ollama::tool_use::{ChatMessage, Tool, ToolCall};

/// One piece of model output
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Plain text content
    Text(String),
    /// Text delivered as ordered fragments (multi-part content)
    TextParts(Vec<String>),
    /// A request to run a tool
    ToolCall(ToolCall),
}

impl Segment {
    /// Text carried by this segment, fragments joined with no separator
    pub fn as_text(&self) -> Option<String> {
        match self {
            Segment::Text(text) => Some(text.clone()),
            Segment::TextParts(parts) => Some(parts.concat()),
            Segment::ToolCall(_) => None,
        }
    }
}

/// Complete reply from a single model call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub segments: Vec<Segment>,
}

impl ModelReply {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Convenience constructor for a text-only reply
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Segment::Text(text.into())])
    }

    /// The last textual segment of the reply, if any
    pub fn last_text(&self) -> Option<String> {
        self.segments.iter().rev().find_map(Segment::as_text)
    }

    /// Tool calls in the order the model requested them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Everything a model call needs
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// Fixed system instruction for the actor
    pub system: &'a str,
    /// Model identifier (e.g., "qwen3")
    pub model: &'a str,
    /// Tools the model may call (empty for single-shot generators)
    pub tools: &'a [Tool],
    /// Running transcript, oldest first, without the system message
    pub messages: &'a [ChatMessage],
}

/// Error type for model calls
#[derive(Debug)]
pub enum ModelError {
    /// HTTP transport failure
    Request(reqwest::Error),
    /// Non-success HTTP status with the response body
    Status(u16, String),
    /// Response body was not the expected JSON
    Parse(serde_json::Error),
    /// Server answered with an empty body
    EmptyResponse,
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Request(e) => write!(f, "Request error: {}", e),
            ModelError::Status(code, body) => write!(f, "Model server returned {}: {}", code, body),
            ModelError::Parse(e) => write!(f, "Parse error: {}", e),
            ModelError::EmptyResponse => write!(f, "Empty response from model server"),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Request(e)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Parse(e)
    }
}

/// A language model that can be asked for one reply
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError>;
}
