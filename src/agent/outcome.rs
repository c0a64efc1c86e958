//! Outcome classification and persistence
//!
//! A run succeeded only when it produced both a summary and at least one
//! file. Failures are persisted as one generic apology; successes as the
//! generated reply plus a [`Fragment`].

use serde::Serialize;
use tracing::info;

use super::state::{FileMap, SharedRunState};
use crate::metrics::OUTCOMES;
use crate::store::{Fragment, MessageStore, NewMessage, StoreError, StoredMessage};

/// Message persisted for failed runs
pub const ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Result,
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Result => "result",
            OutcomeKind::Error => "error",
        }
    }
}

/// Classify the final state of a run
pub fn classify(state: &SharedRunState) -> OutcomeKind {
    if !state.has_summary() || state.files().is_empty() {
        OutcomeKind::Error
    } else {
        OutcomeKind::Result
    }
}

/// What the workflow hands back to its caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub files: FileMap,
}

/// Persist the message for a classified run
///
/// # Arguments
/// * `kind` - Result of [`classify`]
/// * `response` - Generated reply (ignored for errors)
/// * `fragment` - Sandbox URL, title and files (ignored for errors)
pub async fn persist_outcome(
    store: &dyn MessageStore,
    project_id: &str,
    kind: OutcomeKind,
    response: &str,
    fragment: Fragment,
) -> Result<StoredMessage, StoreError> {
    let message = match kind {
        OutcomeKind::Error => NewMessage::error(project_id, ERROR_MESSAGE),
        OutcomeKind::Result => NewMessage::result(project_id, response, Some(fragment)),
    };
    let stored = store.create_message(message).await?;
    OUTCOMES.with_label_values(&[kind.as_str()]).inc();
    info!(project_id, kind = kind.as_str(), message_id = %stored.id, "Outcome persisted");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonStore, MessageType};

    fn state(summary: &str, files: &[(&str, &str)]) -> SharedRunState {
        SharedRunState::from_parts(
            summary,
            files
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(&state("", &[("a", "1")])), OutcomeKind::Error);
        assert_eq!(classify(&state("<task_summary>done", &[])), OutcomeKind::Error);
        assert_eq!(
            classify(&state("<task_summary>done", &[("a", "1")])),
            OutcomeKind::Result
        );
    }

    fn fragment() -> Fragment {
        Fragment {
            sandbox_url: "https://localhost:3000".to_string(),
            title: "Counter".to_string(),
            files: [("a".to_string(), "1".to_string())].into(),
        }
    }

    #[tokio::test]
    async fn test_error_persists_apology_without_fragment() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        let stored = persist_outcome(&store, "p1", OutcomeKind::Error, "ignored", fragment())
            .await
            .unwrap();
        assert_eq!(stored.content, ERROR_MESSAGE);
        assert_eq!(stored.message_type, MessageType::Error);
        assert!(stored.fragment.is_none());
    }

    #[tokio::test]
    async fn test_result_persists_fragment() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        let stored = persist_outcome(&store, "p1", OutcomeKind::Result, "Built it", fragment())
            .await
            .unwrap();
        assert_eq!(stored.content, "Built it");
        assert_eq!(stored.message_type, MessageType::Result);
        assert_eq!(stored.fragment, Some(fragment()));
    }
}
