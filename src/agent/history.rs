//! Conversation loader
//!
//! Turns a project's persisted messages into transcript context for the
//! coding agent.

use crate::ollama::tool_use::ChatMessage;
use crate::store::{MessageRole, MessageStore, StoreError, StoredMessage};

/// Load up to `limit` of the newest messages, oldest first
///
/// An empty project yields an empty transcript.
pub async fn load_history(
    store: &dyn MessageStore,
    project_id: &str,
    limit: usize,
) -> Result<Vec<ChatMessage>, StoreError> {
    let newest_first = store.recent_messages(project_id, limit).await?;
    Ok(to_transcript(newest_first))
}

/// Map newest-first stored messages to oldest-first chat turns
pub fn to_transcript(newest_first: Vec<StoredMessage>) -> Vec<ChatMessage> {
    newest_first
        .into_iter()
        .rev()
        .map(|message| match message.role {
            MessageRole::Assistant => ChatMessage::assistant(message.content),
            MessageRole::User => ChatMessage::user(message.content),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonStore, MessageType, NewMessage};

    fn stored(role: MessageRole, content: &str) -> StoredMessage {
        StoredMessage {
            id: content.to_string(),
            project_id: "p".to_string(),
            content: content.to_string(),
            role,
            message_type: MessageType::Result,
            created_at: String::new(),
            fragment: None,
        }
    }

    #[test]
    fn test_reverses_to_oldest_first() {
        let transcript = to_transcript(vec![
            stored(MessageRole::Assistant, "second"),
            stored(MessageRole::User, "first"),
        ]);
        assert_eq!(transcript[0], ChatMessage::user("first"));
        assert_eq!(transcript[1], ChatMessage::assistant("second"));
    }

    #[tokio::test]
    async fn test_empty_project() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        assert!(load_history(&store, "p1", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_window_keeps_newest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        for i in 0..7 {
            store
                .create_message(NewMessage::user("p1", format!("m{}", i)))
                .await
                .unwrap();
        }
        let history = load_history(&store, "p1", 5).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4", "m5", "m6"]);
    }
}
