//! `terminal` tool: run a shell command in the sandbox

use std::time::Instant;

use serde::Deserialize;
use tracing::debug;

use super::{ToolOutcome, ToolSet, TERMINAL};
use crate::metrics::SANDBOX_COMMAND_DURATION;
use crate::ollama::tool_use::Tool;
use crate::sandbox::OutputChunk;

#[derive(Debug, Deserialize)]
pub struct TerminalArgs {
    pub command: String,
}

pub fn definition() -> Tool {
    Tool::function(
        TERMINAL,
        "Run a shell command in the sandbox (e.g. npm install <package> --yes). Returns stdout.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to run"
                }
            },
            "required": ["command"]
        }),
    )
}

/// Stdout and stderr collected while a command streams
#[derive(Debug, Default)]
struct Buffers {
    stdout: String,
    stderr: String,
}

/// Run `command`, returning stdout on success
///
/// Non-zero exits, sandbox errors and timeouts all become a failure that
/// embeds the output buffered so far.
pub async fn run(tools: &ToolSet, command: &str) -> ToolOutcome {
    let mut buffers = Buffers::default();
    let started = Instant::now();

    let result = {
        let mut on_output = |chunk: OutputChunk| match chunk {
            OutputChunk::Stdout(data) => buffers.stdout.push_str(&data),
            OutputChunk::Stderr(data) => buffers.stderr.push_str(&data),
        };

        let execution = async {
            let session = tools.connect().await?;
            session.run_command(command, &mut on_output).await
        };

        tokio::time::timeout(tools.command_timeout, execution).await
    };

    SANDBOX_COMMAND_DURATION.observe(started.elapsed().as_secs_f64());

    let error = match result {
        Ok(Ok(done)) if done.success() => {
            debug!(command, stdout_len = done.stdout.len(), "Command succeeded");
            return ToolOutcome::Ok(done.stdout);
        }
        Ok(Ok(done)) => format!("exit status {}", done.exit_code),
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}s", tools.command_timeout.as_secs()),
    };

    ToolOutcome::Failure(diagnostic(&error, &buffers))
}

fn diagnostic(error: &str, buffers: &Buffers) -> String {
    format!(
        "Command failed: {}\nstdout: {}\nstderr: {}",
        error, buffers.stdout, buffers.stderr
    )
}
