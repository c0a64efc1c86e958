//! Routing policy for the agent loop
//!
//! Before every would-be turn the loop driver asks a [`Router`] what to do
//! next, given a read-only view of the run:
//!
//! ```text
//!            ┌──────────── Run(agent) ◄──────────┐
//!            ▼                                   │
//!   RUNNING ──► summary recorded?  ── yes ──► DONE_SUMMARY
//!            │
//!            └► iterations == cap?  ── yes ──► DONE_MAX_ITER
//! ```

use super::state::SharedRunState;

/// Loop state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Running,
    DoneSummary,
    DoneMaxIter,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The agent signalled completion
    Summary,
    /// The iteration cap was reached first
    MaxIterations,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Summary => "summary",
            Termination::MaxIterations => "max_iterations",
        }
    }
}

impl From<Termination> for RouterState {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Summary => RouterState::DoneSummary,
            Termination::MaxIterations => RouterState::DoneMaxIter,
        }
    }
}

/// Routing decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Invoke the named agent for one more turn
    Run(String),
    Stop(Termination),
}

/// What the router gets to look at
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub state: &'a SharedRunState,
    /// Turns completed so far
    pub iterations: usize,
    /// Agent that ran the last turn, if any
    pub last_agent: Option<&'a str>,
}

/// Decides the next step of the loop
pub trait Router: Send + Sync {
    fn route(&self, ctx: &RouteContext<'_>) -> Route;
}

/// Re-run one agent until it records a summary or the cap is hit
#[derive(Debug, Clone)]
pub struct SummaryRouter {
    agent: String,
    max_iterations: usize,
}

impl SummaryRouter {
    pub fn new(agent: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            agent: agent.into(),
            max_iterations,
        }
    }
}

impl Router for SummaryRouter {
    fn route(&self, ctx: &RouteContext<'_>) -> Route {
        if ctx.state.has_summary() {
            return Route::Stop(Termination::Summary);
        }
        if ctx.iterations >= self.max_iterations {
            return Route::Stop(Termination::MaxIterations);
        }
        Route::Run(self.agent.clone())
    }
}
