//! Ollama LLM integration module
//!
//! This module provides a client for Ollama's `/api/chat` endpoint that
//! implements [`crate::llm::ModelClient`].

pub mod tool_use;

// Re-export public types so callers can `use crate::ollama::ChatClient`
pub use tool_use::{ChatClient, ChatMessage, FunctionCall, Tool, ToolCall, ToolFunction};
