//! File tools: `createOrUpdateFiles` and `readFiles`

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ToolOutcome, ToolSet, READ_FILES, WRITE_FILES};
use crate::agent::state::FileMap;
use crate::ollama::tool_use::Tool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteArgs {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ReadArgs {
    pub files: Vec<String>,
}

pub fn write_definition() -> Tool {
    Tool::function(
        WRITE_FILES,
        "Create or update files in the sandbox. Paths are relative to the project root.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["path", "content"]
                    }
                }
            },
            "required": ["files"]
        }),
    )
}

pub fn read_definition() -> Tool {
    Tool::function(
        READ_FILES,
        "Read files from the sandbox. Returns a JSON list of {path, content}.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["files"]
        }),
    )
}

/// Write `entries` in order and return `current` merged with them
///
/// The first failing write aborts the batch. Files written before it stay
/// in the sandbox but are not part of any returned map.
pub async fn write(
    tools: &ToolSet,
    current: &FileMap,
    entries: &[FileEntry],
) -> Result<FileMap, String> {
    let session = tools.connect().await.map_err(|e| format!("Error: {}", e))?;

    let mut merged = current.clone();
    let mut written = Vec::new();
    for entry in entries {
        if let Err(e) = session.write_file(&entry.path, &entry.content).await {
            if !written.is_empty() {
                warn!(
                    failed = %entry.path,
                    written = ?written,
                    "Partial write: files already in sandbox are not recorded"
                );
            }
            return Err(format!("Error: {}", e));
        }
        merged.insert(entry.path.clone(), entry.content.clone());
        written.push(entry.path.as_str());
    }

    debug!(count = written.len(), total = merged.len(), "Files written");
    Ok(merged)
}

/// Read every path, returning a JSON list of `{path, content}`
pub async fn read(tools: &ToolSet, paths: &[String]) -> ToolOutcome {
    let session = match tools.connect().await {
        Ok(session) => session,
        Err(e) => return ToolOutcome::Failure(format!("Error: {}", e)),
    };

    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        match session.read_file(path).await {
            Ok(content) => contents.push(FileEntry {
                path: path.clone(),
                content,
            }),
            Err(e) => return ToolOutcome::Failure(format!("Error: {}", e)),
        }
    }

    match serde_json::to_string(&contents) {
        Ok(json) => ToolOutcome::Ok(json),
        Err(e) => ToolOutcome::Failure(format!("Error: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{LocalSandbox, Sandbox};
    use std::sync::Arc;
    use std::time::Duration;

    async fn toolset(root: &std::path::Path) -> ToolSet {
        let sandbox = Arc::new(LocalSandbox::new(root).unwrap());
        let id = sandbox.create("none").await.unwrap();
        ToolSet::new(sandbox, id, Duration::from_secs(10))
    }

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_keeps_unrelated_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let current: FileMap = [("keep.txt".to_string(), "old".to_string())].into();

        let merged = write(&tools, &current, &[entry("new.txt", "fresh")]).await.unwrap();
        assert_eq!(merged.get("keep.txt").map(String::as_str), Some("old"));
        assert_eq!(merged.get("new.txt").map(String::as_str), Some("fresh"));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        write(&tools, &FileMap::new(), &[entry("app/page.tsx", "export {}")])
            .await
            .unwrap();

        let outcome = read(&tools, &["app/page.tsx".to_string()]).await;
        let ToolOutcome::Ok(json) = outcome else {
            panic!("read failed: {:?}", outcome);
        };
        let entries: Vec<FileEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(entries, vec![entry("app/page.tsx", "export {}")]);
    }

    #[tokio::test]
    async fn test_read_missing_file_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let outcome = read(&tools, &["nope.txt".to_string()]).await;
        assert!(matches!(outcome, ToolOutcome::Failure(ref m) if m.starts_with("Error: ")));
    }
}
