//! Title and response generation
//!
//! Two single-shot model calls turn the final summary into a fragment title
//! and a reply for the user. Both use the same extraction over the first
//! output segment:
//!
//! | First segment      | Result                          |
//! |--------------------|---------------------------------|
//! | `Text(s)`          | `s`                             |
//! | `TextParts(parts)` | parts joined with no separator  |
//! | tool call / none   | fallback                        |

use std::sync::Arc;

use tracing::{debug, warn};

use super::prompts::{FRAGMENT_TITLE_PROMPT, RESPONSE_PROMPT};
use crate::llm::{ModelClient, ModelError, ModelRequest, Segment};
use crate::ollama::tool_use::ChatMessage;

/// Title used when the model gives no text
pub const FALLBACK_TITLE: &str = "Fragment";
/// Response used when the model gives no text
pub const FALLBACK_RESPONSE: &str = "Here you go";

/// Text of the first segment, or `fallback` when it is not textual
pub fn extract_text(segments: &[Segment], fallback: &str) -> String {
    match segments.first() {
        Some(Segment::Text(text)) => text.clone(),
        Some(Segment::TextParts(parts)) => parts.concat(),
        Some(Segment::ToolCall(_)) | None => fallback.to_string(),
    }
}

/// Generated title and user-facing reply
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessed {
    pub title: String,
    pub response: String,
}

pub struct PostProcessor {
    client: Arc<dyn ModelClient>,
    model: String,
}

impl PostProcessor {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Generate a short title for `summary`
    pub async fn title(&self, summary: &str) -> Result<String, ModelError> {
        self.generate(FRAGMENT_TITLE_PROMPT, summary, FALLBACK_TITLE).await
    }

    /// Generate the reply shown to the user
    pub async fn response(&self, summary: &str) -> Result<String, ModelError> {
        self.generate(RESPONSE_PROMPT, summary, FALLBACK_RESPONSE).await
    }

    /// Run both generators
    pub async fn run(&self, summary: &str) -> Result<PostProcessed, ModelError> {
        let title = self.title(summary).await?;
        let response = self.response(summary).await?;
        Ok(PostProcessed { title, response })
    }

    async fn generate(&self, system: &str, summary: &str, fallback: &str) -> Result<String, ModelError> {
        let messages = [ChatMessage::user(summary)];
        let reply = self
            .client
            .complete(ModelRequest {
                system,
                model: &self.model,
                tools: &[],
                messages: &messages,
            })
            .await?;

        let text = extract_text(&reply.segments, fallback);
        if text == fallback {
            warn!(fallback, "Generator returned no text, using fallback");
        } else {
            debug!(len = text.len(), "Generated text");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::tool_use::ToolCall;

    #[test]
    fn test_text_parts_are_concatenated() {
        let segments = vec![Segment::TextParts(vec!["Hel".to_string(), "lo".to_string()])];
        assert_eq!(extract_text(&segments, FALLBACK_TITLE), "Hello");
    }

    #[test]
    fn test_plain_text() {
        let segments = vec![Segment::Text("Hi".to_string())];
        assert_eq!(extract_text(&segments, FALLBACK_TITLE), "Hi");
    }

    #[test]
    fn test_tool_call_falls_back() {
        let segments = vec![
            Segment::ToolCall(ToolCall::new("terminal", serde_json::json!({}))),
            Segment::Text("ignored".to_string()),
        ];
        assert_eq!(extract_text(&segments, FALLBACK_TITLE), "Fragment");
        assert_eq!(extract_text(&segments, FALLBACK_RESPONSE), "Here you go");
    }

    #[test]
    fn test_empty_output_falls_back() {
        assert_eq!(extract_text(&[], FALLBACK_RESPONSE), "Here you go");
    }
}
