//! Agent orchestration
//!
//! # Architecture
//!
//! ```text
//! TriggerEvent → history (oldest first) + request
//!                  ↓
//!           AgentController ── Router: Run(agent) | Stop(summary | max_iter)
//!                  ↓
//!           ReasoningAgent turn: one model call
//!                  ↓
//!           ToolSet: terminal / createOrUpdateFiles / readFiles
//!                  ↓ (tool results appended, SharedRunState.files merged)
//!           termination marker? → SharedRunState.summary
//!                  ↓
//!           PostProcessor (title, response) → classify → persist
//! ```

pub mod controller;
pub mod history;
pub mod outcome;
pub mod postprocess;
pub mod prompts;
pub mod reasoning;
pub mod router;
pub mod state;
pub mod workflow;

pub use controller::{AgentConfig, AgentController, AgentError, RunResult};
pub use history::load_history;
pub use outcome::{classify, persist_outcome, Outcome, OutcomeKind, ERROR_MESSAGE};
pub use postprocess::{extract_text, PostProcessor, FALLBACK_RESPONSE, FALLBACK_TITLE};
pub use reasoning::{detect_termination, AgentTurn, ReasoningAgent};
pub use router::{Route, RouteContext, Router, RouterState, SummaryRouter, Termination};
pub use state::{FileMap, SharedRunState};
pub use workflow::{CodeAgentWorkflow, TriggerEvent, WorkflowError, CODE_AGENT};
