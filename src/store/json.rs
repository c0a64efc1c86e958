//! File-backed message store
//!
//! One JSON file per project (`{base_dir}/{project_id}.json`) holding the
//! project's messages in creation order. Writes go to a temporary file
//! first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MessageStore, NewMessage, StoreError, StoredMessage};

/// JSON file message store
pub struct JsonStore {
    /// Base directory for project files
    base_dir: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Create a new store (creates the directory if needed)
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Create with default directory (~/.sandsmith/projects)
    pub fn default_store() -> std::io::Result<Self> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(PathBuf::from(home).join(".sandsmith").join("projects"))
    }

    /// All messages of a project, oldest first
    pub async fn messages(&self, project_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        load_messages(&self.project_path(project_id)).await
    }

    /// Get the file path for a project
    fn project_path(&self, project_id: &str) -> PathBuf {
        let safe: String = project_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl MessageStore for JsonStore {
    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.project_path(&message.project_id);
        let mut messages = load_messages(&path).await?;

        let stored = StoredMessage {
            id: uuid::Uuid::now_v7().to_string(),
            project_id: message.project_id,
            content: message.content,
            role: message.role,
            message_type: message.message_type,
            created_at: chrono::Utc::now().to_rfc3339(),
            fragment: message.fragment,
        };
        messages.push(stored.clone());

        let json = serde_json::to_string_pretty(&messages)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(stored)
    }

    async fn recent_messages(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = load_messages(&self.project_path(project_id)).await?;
        Ok(messages.into_iter().rev().take(limit).collect())
    }
}

/// Load a project file; a missing file is an empty project
async fn load_messages(path: &Path) -> Result<Vec<StoredMessage>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => Ok(serde_json::from_str(&json)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fragment, MessageRole, MessageType};

    #[tokio::test]
    async fn test_missing_project_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        assert!(store.recent_messages("nope", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_messages_newest_first_with_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        for i in 0..4 {
            store
                .create_message(NewMessage::user("p1", format!("m{}", i)))
                .await
                .unwrap();
        }
        let recent = store.recent_messages("p1", 3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m2", "m1"]);
    }

    #[tokio::test]
    async fn test_fragment_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        let fragment = Fragment {
            sandbox_url: "https://3000-sbx.example".to_string(),
            title: "Readme".to_string(),
            files: [("README.md".to_string(), "# hi".to_string())].into(),
        };
        store
            .create_message(NewMessage::result("p1", "Added a readme", Some(fragment.clone())))
            .await
            .unwrap();

        let reopened = JsonStore::new(tmp.path()).unwrap();
        let messages = reopened.messages("p1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[0].message_type, MessageType::Result);
        assert_eq!(messages[0].fragment.as_ref(), Some(&fragment));
    }

    #[tokio::test]
    async fn test_projects_are_separate_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        store.create_message(NewMessage::user("a", "x")).await.unwrap();
        store.create_message(NewMessage::error("b", "y")).await.unwrap();
        assert_eq!(store.messages("a").await.unwrap().len(), 1);
        assert_eq!(store.messages("b").await.unwrap()[0].message_type, MessageType::Error);
    }

    #[test]
    fn test_project_path_is_sanitized() {
        let store = JsonStore::new(std::env::temp_dir().join("sandsmith-path-test")).unwrap();
        let path = store.project_path("../evil/id");
        assert_eq!(path.file_name().unwrap(), "___evil_id.json");
    }
}
