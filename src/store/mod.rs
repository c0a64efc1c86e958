//! Persistence for conversation messages and code fragments
//!
//! Every project has an ordered list of messages. Assistant results carry
//! an optional [`Fragment`]: the sandbox URL, a title and the files the
//! agent produced.

pub mod json;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use json::JsonStore;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Kind of message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Result,
    Error,
}

/// Artifact bundle saved with a successful result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub sandbox_url: String,
    pub title: String,
    pub files: BTreeMap<String, String>,
}

/// A message to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub project_id: String,
    pub content: String,
    pub role: MessageRole,
    pub message_type: MessageType,
    pub fragment: Option<Fragment>,
}

impl NewMessage {
    /// A user request
    pub fn user(project_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            content: content.into(),
            role: MessageRole::User,
            message_type: MessageType::Result,
            fragment: None,
        }
    }

    /// An assistant result, optionally with a fragment
    pub fn result(
        project_id: impl Into<String>,
        content: impl Into<String>,
        fragment: Option<Fragment>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            content: content.into(),
            role: MessageRole::Assistant,
            message_type: MessageType::Result,
            fragment,
        }
    }

    /// An assistant error message
    pub fn error(project_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            content: content.into(),
            role: MessageRole::Assistant,
            message_type: MessageType::Error,
            fragment: None,
        }
    }
}

/// A persisted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub project_id: String,
    pub content: String,
    pub role: MessageRole,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Fragment>,
}

/// Error type for store operations
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serde(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
            StoreError::Serde(e) => write!(f, "Store serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e)
    }
}

/// Message persistence and history queries
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message (and its fragment, if any)
    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;

    /// Messages for a project, newest first, at most `limit` of them
    async fn recent_messages(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}
