//! Shared run state
//!
//! One [`SharedRunState`] exists per run. Tool handlers get `&mut` access
//! to it while they execute, the router only ever sees `&SharedRunState`
//! between turns. Field writers:
//!
//! - `files` - the file-writing tool, merged by path
//! - `summary` - the loop driver, from the termination signal of a turn

use std::collections::BTreeMap;

/// Logical path → file content
pub type FileMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedRunState {
    summary: String,
    files: FileMap,
}

impl SharedRunState {
    /// Empty state: no summary, no files
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state, e.g. with files from a previous fragment
    pub fn from_parts(summary: impl Into<String>, files: FileMap) -> Self {
        Self {
            summary: summary.into(),
            files,
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn files(&self) -> &FileMap {
        &self.files
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty()
    }

    /// Record the completion summary
    ///
    /// Empty text is ignored so a recorded summary is never cleared.
    pub(crate) fn record_summary(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.summary = text;
        }
    }

    /// Replace the file map with the merged map returned by a successful write
    pub(crate) fn apply_files(&mut self, files: FileMap) {
        self.files = files;
    }

    pub fn into_parts(self) -> (String, FileMap) {
        (self.summary, self.files)
    }
}
