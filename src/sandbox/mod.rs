//! Sandbox execution environments
//!
//! A sandbox is an isolated shell + filesystem addressed by a session id.
//! The agent's tools reach it through two traits:
//!
//! ```text
//! Sandbox::create(template) ──► session id (once per run)
//!        │
//! Sandbox::connect(id) ──► SandboxSession (once per tool call)
//!        │
//!        ├── run_command(cmd, on_output) ──► stdout/stderr chunks + exit code
//!        ├── write_file(path, content)
//!        ├── read_file(path)
//!        └── host(port) ──► externally reachable hostname
//! ```
//!
//! Backends:
//! - [`HttpSandbox`] - remote sandbox service over HTTP, command output
//!   streamed back as newline-delimited JSON
//! - [`LocalSandbox`] - one directory per session, commands run with `/bin/sh`

pub mod http;
pub mod local;

use async_trait::async_trait;

pub use http::HttpSandbox;
pub use local::LocalSandbox;

/// A chunk of streaming output from a running command
#[derive(Debug, Clone, PartialEq)]
pub enum OutputChunk {
    Stdout(String),
    Stderr(String),
}

/// Final result after a command completes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Error type for sandbox operations
#[derive(Debug)]
pub enum SandboxError {
    /// The backend could not be reached
    Connection(String),
    /// No session exists with this id
    NotFound(String),
    /// Backend answered with a non-success status
    Status(u16, String),
    /// Path would leave the session's filesystem
    InvalidPath(String),
    /// Command could not be started or its stream broke off
    Command(String),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::Connection(msg) => write!(f, "Sandbox connection error: {}", msg),
            SandboxError::NotFound(id) => write!(f, "Sandbox {} not found", id),
            SandboxError::Status(code, body) => write!(f, "Sandbox returned {}: {}", code, body),
            SandboxError::InvalidPath(path) => write!(f, "Invalid sandbox path: {}", path),
            SandboxError::Command(msg) => write!(f, "Command error: {}", msg),
            SandboxError::Io(e) => write!(f, "I/O error: {}", e),
            SandboxError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for SandboxError {}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        SandboxError::Io(e)
    }
}

impl From<serde_json::Error> for SandboxError {
    fn from(e: serde_json::Error) -> Self {
        SandboxError::Parse(e)
    }
}

impl From<reqwest::Error> for SandboxError {
    fn from(e: reqwest::Error) -> Self {
        SandboxError::Connection(e.to_string())
    }
}

/// Factory for sandbox sessions
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Create a new session from a template and return its id
    async fn create(&self, template: &str) -> Result<String, SandboxError>;

    /// Connect to an existing session
    async fn connect(&self, session_id: &str) -> Result<Box<dyn SandboxSession>, SandboxError>;
}

/// A connected sandbox session
#[async_trait]
pub trait SandboxSession: Send + Sync {
    fn id(&self) -> &str;

    /// Run a shell command, calling `on_output` for each chunk as it arrives
    ///
    /// A non-zero exit code is reported in the result, not as an error.
    async fn run_command(
        &self,
        command: &str,
        on_output: &mut (dyn FnMut(OutputChunk) + Send),
    ) -> Result<CommandResult, SandboxError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError>;

    async fn read_file(&self, path: &str) -> Result<String, SandboxError>;

    /// Hostname at which `port` inside the sandbox is reachable
    fn host(&self, port: u16) -> String;
}

/// Decode the complete UTF-8 prefix of `pending`
///
/// A multibyte sequence cut off at the end stays in `pending` until the
/// next read completes it. Bytes that can never be valid become U+FFFD.
pub fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut decoded = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                decoded.push_str(text);
                pending.clear();
                return decoded;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                decoded.push_str(std::str::from_utf8(&pending[..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(invalid) => {
                        decoded.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + invalid);
                    }
                    None => {
                        pending.drain(..valid);
                        return decoded;
                    }
                }
            }
        }
    }
}

/// Public URL for an app served from the sandbox
pub fn sandbox_url(session: &dyn SandboxSession, port: u16) -> String {
    format!("https://{}", session.host(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_utf8_keeps_split_sequence() {
        let mut pending = b"ab\xc3".to_vec();
        assert_eq!(take_utf8(&mut pending), "ab");
        assert_eq!(pending, vec![0xc3]);

        pending.extend_from_slice(b"\xa9!");
        assert_eq!(take_utf8(&mut pending), "\u{e9}!");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_utf8_replaces_invalid_bytes() {
        let mut pending = b"a\xffb".to_vec();
        assert_eq!(take_utf8(&mut pending), "a\u{FFFD}b");
        assert!(pending.is_empty());
    }
}
