//! Tools exposed to the coding agent
//!
//! Every tool works on one sandbox session, connected by id for each call.
//! Failures never cross the agent boundary as errors: a handler returns a
//! [`ToolOutcome`] and both variants reach the model as ordinary tool
//! output text.
//!
//! | Tool                  | Arguments                      | Output on success            |
//! |-----------------------|--------------------------------|------------------------------|
//! | `terminal`            | `{command}`                    | stdout                       |
//! | `createOrUpdateFiles` | `{files: [{path, content}]}`   | merged file map (JSON)       |
//! | `readFiles`           | `{files: [path]}`              | `[{path, content}]` (JSON)   |

pub mod files;
pub mod terminal;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{info_span, warn, Instrument};

use crate::agent::state::SharedRunState;
use crate::metrics::TOOL_CALLS;
use crate::ollama::tool_use::{Tool, ToolCall};
use crate::sandbox::{Sandbox, SandboxError, SandboxSession};

pub const TERMINAL: &str = "terminal";
pub const WRITE_FILES: &str = "createOrUpdateFiles";
pub const READ_FILES: &str = "readFiles";

/// Result of a tool call, delivered to the model either way
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Ok(String),
    Failure(String),
}

impl ToolOutcome {
    /// Text handed back to the model
    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Ok(text) | ToolOutcome::Failure(text) => text,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ToolOutcome::Ok(_))
    }

    fn status(&self) -> &'static str {
        if self.is_ok() {
            "ok"
        } else {
            "failure"
        }
    }
}

/// The three sandbox tools, bound to one session id
pub struct ToolSet {
    sandbox: Arc<dyn Sandbox>,
    session_id: String,
    command_timeout: Duration,
}

impl ToolSet {
    /// # Arguments
    /// * `sandbox` - Sandbox backend to connect through
    /// * `session_id` - Session owned by this run
    /// * `command_timeout` - Upper bound for one `terminal` call
    pub fn new(sandbox: Arc<dyn Sandbox>, session_id: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            sandbox,
            session_id: session_id.into(),
            command_timeout,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Tool definitions advertised to the model
    pub fn definitions(&self) -> Vec<Tool> {
        vec![
            terminal::definition(),
            files::write_definition(),
            files::read_definition(),
        ]
    }

    /// Execute one tool call against the session
    ///
    /// Calls run strictly one at a time; `state` changes made here are
    /// visible to the next call.
    pub async fn dispatch(&self, call: &ToolCall, state: &mut SharedRunState) -> ToolOutcome {
        let name = call.function.name.as_str();
        let span = info_span!("tool_call", tool = %name, session_id = %self.session_id, otel.name = "tool_call");

        let outcome = async {
            match name {
                TERMINAL => match parse_args::<terminal::TerminalArgs>(call) {
                    Ok(args) => terminal::run(self, &args.command).await,
                    Err(failure) => failure,
                },
                WRITE_FILES => match parse_args::<files::WriteArgs>(call) {
                    Ok(args) => match files::write(self, state.files(), &args.files).await {
                        Ok(merged) => {
                            let payload = serde_json::to_string(&merged).unwrap_or_default();
                            state.apply_files(merged);
                            ToolOutcome::Ok(payload)
                        }
                        Err(message) => ToolOutcome::Failure(message),
                    },
                    Err(failure) => failure,
                },
                READ_FILES => match parse_args::<files::ReadArgs>(call) {
                    Ok(args) => files::read(self, &args.files).await,
                    Err(failure) => failure,
                },
                other => ToolOutcome::Failure(format!(
                    "Error: unknown tool '{}'. Available tools: {}, {}, {}",
                    other, TERMINAL, WRITE_FILES, READ_FILES
                )),
            }
        }
        .instrument(span)
        .await;

        if let ToolOutcome::Failure(message) = &outcome {
            warn!(tool = %name, error = %message, "Tool call failed");
        }
        TOOL_CALLS.with_label_values(&[name, outcome.status()]).inc();
        outcome
    }

    async fn connect(&self) -> Result<Box<dyn SandboxSession>, SandboxError> {
        self.sandbox.connect(&self.session_id).await
    }
}

/// Decode tool arguments, turning bad input into a failure the model can read
fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ToolOutcome> {
    serde_json::from_value(call.function.arguments.clone()).map_err(|e| {
        ToolOutcome::Failure(format!(
            "Error: invalid arguments for {}: {}",
            call.function.name, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::LocalSandbox;

    async fn toolset(root: &std::path::Path) -> ToolSet {
        let sandbox = Arc::new(LocalSandbox::new(root).unwrap());
        let id = sandbox.create("none").await.unwrap();
        ToolSet::new(sandbox, id, Duration::from_secs(10))
    }

    #[test]
    fn test_outcome_text() {
        assert_eq!(ToolOutcome::Ok("a".into()).text(), "a");
        assert_eq!(ToolOutcome::Failure("b".into()).text(), "b");
        assert!(!ToolOutcome::Failure("b".into()).is_ok());
    }

    #[tokio::test]
    async fn test_definitions_names() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let names: Vec<_> = tools
            .definitions()
            .into_iter()
            .map(|t| t.function.name)
            .collect();
        assert_eq!(names, vec![TERMINAL, WRITE_FILES, READ_FILES]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let mut state = SharedRunState::new();
        let outcome = tools
            .dispatch(&ToolCall::new("deploy", serde_json::json!({})), &mut state)
            .await;
        assert!(matches!(outcome, ToolOutcome::Failure(ref m) if m.contains("unknown tool")));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let mut state = SharedRunState::new();
        let outcome = tools
            .dispatch(&ToolCall::new(TERMINAL, serde_json::json!({"cmd": "ls"})), &mut state)
            .await;
        assert!(matches!(outcome, ToolOutcome::Failure(ref m) if m.contains("invalid arguments")));
    }

    #[tokio::test]
    async fn test_write_merges_by_path() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let mut state = SharedRunState::new();

        let write = |path: &str, content: &str| {
            ToolCall::new(
                WRITE_FILES,
                serde_json::json!({"files": [{"path": path, "content": content}]}),
            )
        };

        assert!(tools.dispatch(&write("a", "1"), &mut state).await.is_ok());
        assert!(tools.dispatch(&write("b", "2"), &mut state).await.is_ok());
        assert!(tools.dispatch(&write("a", "3"), &mut state).await.is_ok());

        let expected: crate::agent::state::FileMap =
            [("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())].into();
        assert_eq!(state.files(), &expected);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = toolset(tmp.path()).await;
        let mut state = SharedRunState::new();

        let call = ToolCall::new(
            WRITE_FILES,
            serde_json::json!({"files": [
                {"path": "ok.txt", "content": "fine"},
                {"path": "../escape.txt", "content": "nope"}
            ]}),
        );
        let outcome = tools.dispatch(&call, &mut state).await;

        assert!(!outcome.is_ok());
        assert!(state.files().is_empty());
        // The first write already reached the sandbox
        assert!(tmp.path().join(tools.session_id()).join("ok.txt").exists());
    }
}
