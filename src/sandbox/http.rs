//! HTTP client for a remote sandbox service
//!
//! Endpoints (relative to the configured base URL):
//!
//! | Method | Path                          | Body / Response                          |
//! |--------|-------------------------------|------------------------------------------|
//! | POST   | `/sandboxes`                  | `{"template"}` → `{"sandbox_id"}`        |
//! | GET    | `/sandboxes/{id}`             | 200 if the session is alive, 404 if not  |
//! | POST   | `/sandboxes/{id}/commands`    | `{"command"}` → NDJSON [`CommandEvent`]s |
//! | PUT    | `/sandboxes/{id}/files?path=` | raw file content                         |
//! | GET    | `/sandboxes/{id}/files?path=` | raw file content                         |
//!
//! Apps inside a session are exposed at `{port}-{id}.{domain}`.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;

use super::{CommandResult, OutputChunk, Sandbox, SandboxError, SandboxSession};

/// One line of the command output stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommandEvent {
    Stdout { stdout: String },
    Stderr { stderr: String },
    Exit { exit_code: i32 },
    Error { error: String },
}

/// Remote sandbox backend
#[derive(Clone)]
pub struct HttpSandbox {
    base_url: String,
    domain: String,
    client: reqwest::Client,
}

impl HttpSandbox {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Sandbox API base URL (e.g., "http://localhost:49982")
    /// * `domain` - Domain under which session ports are exposed
    pub fn new(base_url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            domain: domain.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct CreateResponse {
    sandbox_id: String,
}

#[async_trait]
impl Sandbox for HttpSandbox {
    async fn create(&self, template: &str) -> Result<String, SandboxError> {
        let response = self
            .client
            .post(format!("{}/sandboxes", self.base_url))
            .json(&serde_json::json!({ "template": template }))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        let created: CreateResponse = serde_json::from_str(&body)?;
        Ok(created.sandbox_id)
    }

    async fn connect(&self, session_id: &str) -> Result<Box<dyn SandboxSession>, SandboxError> {
        let response = self
            .client
            .get(format!("{}/sandboxes/{}", self.base_url, session_id))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SandboxError::NotFound(session_id.to_string()));
        }
        check_status(response).await?;

        Ok(Box::new(HttpSession {
            id: session_id.to_string(),
            session_url: format!("{}/sandboxes/{}", self.base_url, session_id),
            domain: self.domain.clone(),
            client: self.client.clone(),
        }))
    }
}

/// A session on the remote sandbox service
pub struct HttpSession {
    id: String,
    session_url: String,
    domain: String,
    client: reqwest::Client,
}

#[async_trait]
impl SandboxSession for HttpSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_command(
        &self,
        command: &str,
        on_output: &mut (dyn FnMut(OutputChunk) + Send),
    ) -> Result<CommandResult, SandboxError> {
        let response = self
            .client
            .post(format!("{}/commands", self.session_url))
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await?;
        let mut bytes_stream = check_status(response).await?.bytes_stream();

        let mut result = CommandResult::default();
        let mut exit_code = None;
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes_stream.next().await {
            pending.extend_from_slice(&chunk?);
            for line in drain_lines(&mut pending) {
                let event = decode_event(&line)?;
                apply_event(event, &mut result, &mut exit_code, on_output)?;
            }
        }
        let tail = String::from_utf8_lossy(&pending);
        if !tail.trim().is_empty() {
            let event = decode_event(&tail)?;
            apply_event(event, &mut result, &mut exit_code, on_output)?;
        }

        result.exit_code = exit_code.ok_or_else(|| {
            SandboxError::Command("command stream ended without an exit code".to_string())
        })?;
        Ok(result)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let response = self
            .client
            .put(format!("{}/files", self.session_url))
            .query(&[("path", path)])
            .body(content.to_string())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        let response = self
            .client
            .get(format!("{}/files", self.session_url))
            .query(&[("path", path)])
            .send()
            .await?;
        Ok(check_status(response).await?.text().await?)
    }

    fn host(&self, port: u16) -> String {
        format!("{}-{}.{}", port, self.id, self.domain)
    }
}

/// Turn a non-success response into [`SandboxError::Status`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SandboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SandboxError::Status(status.as_u16(), body))
}

/// Remove and return every complete line from `buffer`
///
/// Lines are split on raw bytes before decoding, so a character cut by a
/// network chunk boundary is decoded whole. Blank lines are dropped; a
/// trailing partial line stays in the buffer.
pub fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };
    let rest = buffer.split_off(last_newline + 1);
    let complete = std::mem::replace(buffer, rest);
    complete
        .split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn decode_event(line: &str) -> Result<CommandEvent, SandboxError> {
    Ok(serde_json::from_str(line.trim())?)
}

fn apply_event(
    event: CommandEvent,
    result: &mut CommandResult,
    exit_code: &mut Option<i32>,
    on_output: &mut (dyn FnMut(OutputChunk) + Send),
) -> Result<(), SandboxError> {
    match event {
        CommandEvent::Stdout { stdout } => {
            result.stdout.push_str(&stdout);
            on_output(OutputChunk::Stdout(stdout));
        }
        CommandEvent::Stderr { stderr } => {
            result.stderr.push_str(&stderr);
            on_output(OutputChunk::Stderr(stderr));
        }
        CommandEvent::Exit { exit_code: code } => *exit_code = Some(code),
        CommandEvent::Error { error } => return Err(SandboxError::Command(error)),
    }
    Ok(())
}
