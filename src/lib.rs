//! Sandsmith - LLM coding agent orchestration over sandboxed environments
//!
//! Given a user request and the project's conversation history, sandsmith
//! runs a tool-using agent against an isolated sandbox until the agent
//! signals completion, then generates a title and reply and persists the
//! resulting code fragment.
//!
//! # Modules
//!
//! - `agent` - orchestration loop, routing, post-processing, persistence of outcomes
//! - `tools` - terminal and file tools bound to a sandbox session
//! - `llm` - model invocation seam and output segments
//! - `ollama` - Ollama `/api/chat` client
//! - `sandbox` - sandbox traits with HTTP and local backends
//! - `store` - message and fragment persistence
//! - `steps` - named workflow steps
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - console and OpenTelemetry setup
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sandsmith::{AgentConfig, ChatClient, CodeAgentWorkflow, JsonStore, LocalSandbox, TriggerEvent};
//!
//! let workflow = CodeAgentWorkflow::new(
//!     Arc::new(ChatClient::new("http://localhost:11434")),
//!     Arc::new(LocalSandbox::default_root()?),
//!     Arc::new(JsonStore::default_store()?),
//!     AgentConfig::default(),
//! );
//! let outcome = workflow.run(&TriggerEvent::new("p1", "add a readme")).await?;
//! ```

pub mod agent;
pub mod llm;
pub mod metrics;
pub mod ollama;
pub mod sandbox;
pub mod steps;
pub mod store;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, CodeAgentWorkflow, Outcome, SharedRunState, TriggerEvent};
pub use llm::{ModelClient, ModelReply, Segment};
pub use ollama::ChatClient;
pub use sandbox::{HttpSandbox, LocalSandbox};
pub use store::JsonStore;
