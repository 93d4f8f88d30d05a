//! Apply, then lint, then commit.
//!
//! ```text
//! Parsing -> Validating -> Applying -> Linting -> (Committing | Reporting)
//! ```
//!
//! Each batch ends in one [`TerminalState`]. Nothing is retried.

use crate::executor::{ChangeRequest, ChangeSetExecutor, ExecuteError, ExecutionOutcome};
use crate::git::{commit_gate, Repository};
use crate::lint::{lint_files, Linter};
use crate::store::FileStore;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Committed,
    /// Applied and clean, but no commit was made
    Applied,
    LintFailed,
    ApplyFailed,
    ReadFailed,
}

impl ExecutionOutcome {
    pub fn terminal_state(&self) -> TerminalState {
        if self.commit.is_some() {
            TerminalState::Committed
        } else if self.has_lint_errors() {
            TerminalState::LintFailed
        } else {
            TerminalState::Applied
        }
    }

    pub fn has_lint_errors(&self) -> bool {
        self.lint_report
            .as_deref()
            .is_some_and(|report| !report.trim().is_empty())
    }
}

/// Collaborators for one batch run.
pub struct Workflow<'a> {
    pub workspace: &'a Path,
    pub executor: &'a ChangeSetExecutor,
    pub linter: Option<&'a dyn Linter>,
    pub repository: Option<&'a dyn Repository>,
    pub auto_commit: bool,
}

impl Workflow<'_> {
    pub fn run(
        &self,
        changes: &[ChangeRequest],
        store: &mut dyn FileStore,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let mut outcome = match self.executor.execute(changes, store) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::info!(state = ?err.terminal_state(), file = %err.file().display(), "batch failed");
                return Err(err);
            }
        };

        if let Some(linter) = self.linter {
            if !outcome.touched.is_empty() {
                outcome.lint_report = Some(lint_files(linter, self.workspace, &outcome.touched));
            } else {
                outcome.lint_report = Some(String::new());
            }
        }

        let may_commit = self.auto_commit && !outcome.touched.is_empty() && !outcome.has_lint_errors();
        if let (true, Some(repository)) = (may_commit, self.repository) {
            outcome.commit = commit_gate(repository, &outcome.touched).map(|info| info.id);
        }

        tracing::info!(
            state = ?outcome.terminal_state(),
            applied = outcome.applied,
            "batch finished"
        );
        Ok(outcome)
    }
}
