//! Ollama Chat API with tool calling support
//!
//! This module provides a client for Ollama's `/api/chat` endpoint,
//! which supports tool/function calling for agentic workflows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{ModelClient, ModelError, ModelReply, ModelRequest, Segment};

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Name of the tool that produced this message (role "tool" only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }

    /// Assistant message that requested tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::assistant(content);
        if !tool_calls.is_empty() {
            message.tool_calls = Some(tool_calls);
        }
        message
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::with_role("tool", content);
        message.tool_name = Some(tool_name.into());
        message
    }
}

/// A tool call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

impl Tool {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Assistant content as returned by the server
///
/// Ollama sends a plain string; OpenAI-compatible servers may send an
/// array of typed parts instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of multi-part content
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Assistant message inside a chat response
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ResponseMessage,
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
    temperature: f32,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            temperature: 0.1,
        }
    }

    /// Send a chat request with optional tools
    ///
    /// # Arguments
    /// * `messages` - The conversation history, system message included
    /// * `model` - The model name (e.g., "qwen3")
    /// * `tools` - Optional list of tools the model can use
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, ModelError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": self.temperature
            }
        });

        if let Some(t) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::to_value(t)?;
        }

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16(), text));
        }

        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        Ok(chat_response)
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(request.system));
        messages.extend_from_slice(request.messages);

        let response = self
            .chat(&messages, request.model, Some(request.tools))
            .await?;

        tracing::debug!(
            model = request.model,
            eval_count = response.eval_count,
            eval_duration_ns = response.eval_duration,
            "Chat response received"
        );

        Ok(reply_from_message(response.message))
    }
}

/// Convert a raw assistant message into ordered reply segments
///
/// Textual content comes first, followed by tool calls. When the server
/// reports no native tool calls, calls printed as JSON in the text are
/// recovered so the model still gets its tools executed.
pub fn reply_from_message(message: ResponseMessage) -> ModelReply {
    let mut segments = Vec::new();
    let native_calls = message.tool_calls.unwrap_or_default();

    match message.content {
        Some(MessageContent::Text(text)) => {
            if !native_calls.is_empty() {
                if !text.is_empty() {
                    segments.push(Segment::Text(text));
                }
            } else if let Some(call) = try_parse_tool_call(text.trim()) {
                // The whole message is a tool call printed as text
                segments.push(Segment::ToolCall(call));
            } else {
                let recovered = parse_tool_calls_from_text(&text);
                if !text.is_empty() {
                    segments.push(Segment::Text(text));
                }
                segments.extend(recovered.into_iter().map(Segment::ToolCall));
            }
        }
        Some(MessageContent::Parts(parts)) => {
            let texts: Vec<String> = parts
                .into_iter()
                .filter(|part| part.kind.is_empty() || part.kind == "text")
                .filter_map(|part| part.text)
                .collect();
            if !texts.is_empty() {
                segments.push(Segment::TextParts(texts));
            }
        }
        None => {}
    }

    segments.extend(native_calls.into_iter().map(Segment::ToolCall));
    ModelReply::new(segments)
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();

    let content = content.trim();

    // Try parsing the entire content as a tool call
    if let Some(tool_call) = try_parse_tool_call(content) {
        tool_calls.push(tool_call);
        return tool_calls;
    }

    // Look for balanced {...} objects within the text
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        if let Some(tool_call) = try_parse_tool_call(&content[s..=i]) {
                            tool_calls.push(tool_call);
                        }
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    tool_calls
}

/// Try to parse a single tool call from a JSON string
fn try_parse_tool_call(json_str: &str) -> Option<ToolCall> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
        return parse_tool_call_from_value(&value);
    }

    // Unescaped quotes inside a shell command are the usual culprit
    let fixed = try_fix_malformed_json(json_str)?;
    let value = serde_json::from_str::<serde_json::Value>(&fixed).ok()?;
    parse_tool_call_from_value(&value)
}

/// Escape stray double quotes inside a `"command": "..."` value
///
/// Pattern: {"name": "terminal", "arguments": {"command": "echo "hello""}}
fn try_fix_malformed_json(json_str: &str) -> Option<String> {
    let command_marker = "\"command\": \"";
    let command_start = json_str.find(command_marker)?;
    let value_start = command_start + command_marker.len();

    let remaining = &json_str[value_start..];
    let end_pattern = remaining.rfind("\"}}")?;
    let command = &remaining[..end_pattern];

    let escaped = command
        .replace("\\\"", "\u{FFFF}") // Temporarily replace already-escaped quotes
        .replace('"', "\\\"")
        .replace('\u{FFFF}', "\\\"");

    let prefix = &json_str[..value_start];
    let suffix = &json_str[value_start + end_pattern..];

    Some(format!("{}{}{}", prefix, escaped, suffix))
}

/// Parse a tool call from a JSON Value
///
/// Accepts `{"name": ..., "arguments": {...}}` and the `"parameters"`
/// spelling some models use instead.
fn parse_tool_call_from_value(value: &serde_json::Value) -> Option<ToolCall> {
    let name = value.get("name").and_then(|n| n.as_str())?;

    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))?
        .clone();

    // Some models double-encode the arguments as a JSON string
    let arguments = match arguments {
        serde_json::Value::String(raw) => serde_json::from_str(&raw).ok()?,
        other => other,
    };

    Some(ToolCall::new(name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: Option<MessageContent>, tool_calls: Option<Vec<ToolCall>>) -> ResponseMessage {
        ResponseMessage {
            role: "assistant".to_string(),
            content,
            tool_calls,
        }
    }

    #[test]
    fn test_tool_message_carries_name() {
        let msg = ChatMessage::tool("terminal", "ok");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"tool\""));
        assert!(json.contains("\"tool_name\":\"terminal\""));
    }

    #[test]
    fn test_assistant_without_tools_skips_field() {
        let msg = ChatMessage::assistant_with_tools("done", vec![]);
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_response_string_content() {
        let raw = r#"{"message":{"role":"assistant","content":"Hi"},"done":true}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        let reply = reply_from_message(response.message);
        assert_eq!(reply.segments, vec![Segment::Text("Hi".to_string())]);
    }

    #[test]
    fn test_response_part_content() {
        let raw = r#"{"message":{"role":"assistant","content":[{"type":"text","text":"Hel"},{"type":"image"},{"type":"text","text":"lo"}]},"done":true}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        let reply = reply_from_message(response.message);
        assert_eq!(
            reply.segments,
            vec![Segment::TextParts(vec!["Hel".to_string(), "lo".to_string()])]
        );
    }

    #[test]
    fn test_native_tool_calls_follow_text() {
        let call = ToolCall::new("terminal", serde_json::json!({"command": "ls"}));
        let reply = reply_from_message(message(
            Some(MessageContent::Text("Listing files".to_string())),
            Some(vec![call.clone()]),
        ));
        assert_eq!(
            reply.segments,
            vec![
                Segment::Text("Listing files".to_string()),
                Segment::ToolCall(call)
            ]
        );
    }

    #[test]
    fn test_text_only_tool_call_is_recovered() {
        let text = r#"{"name": "terminal", "arguments": {"command": "npm test"}}"#;
        let reply = reply_from_message(message(Some(MessageContent::Text(text.to_string())), None));
        assert_eq!(reply.segments.len(), 1);
        assert!(reply.last_text().is_none());
        assert_eq!(reply.tool_calls()[0].function.arguments["command"], "npm test");
    }

    #[test]
    fn test_embedded_tool_call_keeps_text() {
        let text = r#"Let me look. {"name": "readFiles", "parameters": {"files": ["app.tsx"]}}"#;
        let reply = reply_from_message(message(Some(MessageContent::Text(text.to_string())), None));
        assert_eq!(reply.last_text().as_deref(), Some(text));
        assert_eq!(reply.tool_calls()[0].function.name, "readFiles");
    }

    #[test]
    fn test_malformed_command_quotes() {
        let text = r#"{"name": "terminal", "arguments": {"command": "echo "hello""}}"#;
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments["command"], "echo \"hello\"");
    }

    #[test]
    fn test_string_encoded_arguments() {
        let text = r#"{"name": "terminal", "arguments": "{\"command\": \"ls\"}"}"#;
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls[0].function.arguments["command"], "ls");
    }

    #[test]
    fn test_plain_text_has_no_calls() {
        assert!(parse_tool_calls_from_text("All done, nothing to run.").is_empty());
        assert!(parse_tool_calls_from_text("a stray } brace").is_empty());
    }

    #[test]
    fn test_empty_message_has_no_segments() {
        let reply = reply_from_message(message(None, None));
        assert!(reply.segments.is_empty());
    }
}
