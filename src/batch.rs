//! The YAML batch document and the feedback texts sent back to clients.

use crate::executor::{ChangeRequest, ExecuteError, ExecutionOutcome};
use serde_yaml::Value;
use thiserror::Error;

const FILES_HEADER: &str = "Here is the full code of your requested file(s):\n\n";
const FILES_INVITATION: &str = "\n\nIf you need to see other files to complete the analysis, \
ask me in YAML with files_needed: ['filename.py'] and I'll provide them.";
const UNREADABLE: &str = "(File not found or unreadable)";

/// Problems with the document itself. These are client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Invalid YAML: {0}")]
    InvalidYaml(String),

    #[error("YAML must be a dictionary")]
    NotAMapping,

    #[error("files_needed must be a list")]
    FilesNeededNotList,

    #[error("code_changes must be a list")]
    CodeChangesNotList,

    #[error("YAML must contain 'files_needed' or 'code_changes'")]
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRequest {
    FilesNeeded(Vec<String>),
    CodeChanges(Vec<ChangeRequest>),
}

impl BatchRequest {
    /// Parse a batch document. `files_needed` wins when both keys are present.
    pub fn parse(text: &str) -> Result<Self, BatchError> {
        let document: Value =
            serde_yaml::from_str(text).map_err(|e| BatchError::InvalidYaml(e.to_string()))?;
        let Value::Mapping(mapping) = document else {
            return Err(BatchError::NotAMapping);
        };

        if let Some(files) = mapping.get("files_needed") {
            let Value::Sequence(items) = files else {
                return Err(BatchError::FilesNeededNotList);
            };
            let names = items.iter().filter_map(scalar_name).collect();
            return Ok(BatchRequest::FilesNeeded(names));
        }

        if let Some(changes) = mapping.get("code_changes") {
            let Value::Sequence(items) = changes else {
                return Err(BatchError::CodeChangesNotList);
            };
            return Ok(BatchRequest::CodeChanges(
                items.iter().map(ChangeRequest::from_value).collect(),
            ));
        }

        Err(BatchError::NothingToDo)
    }
}

fn scalar_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Feedback after the batch applied, linted clean (or unlinted) and maybe committed.
pub fn success_feedback(outcome: &ExecutionOutcome) -> String {
    let mut text = format!("✅ Applied {} change(s)", outcome.applied);
    if outcome.lint_report.is_some() {
        text.push_str(" and linted clean");
    }
    if let Some(id) = &outcome.commit {
        text.push_str(&format!("\nCommit: {}", id.get(..7).unwrap_or(id)));
    }
    text.push_str("\n\nPlease verify changes and provide next steps in YAML.");
    text
}

pub fn lint_feedback(report: &str) -> String {
    format!(
        "⚠️ Linting errors found:\n\n{report}\n\nPlease fix these issues and provide corrected code in YAML."
    )
}

pub fn error_feedback(error: &ExecuteError) -> String {
    format!("❌ Error applying changes:\n{error}\n\nPlease review and give corrected code in YAML.")
}

/// Feedback for a finished batch, whichever way it ended.
pub fn outcome_feedback(result: &Result<ExecutionOutcome, ExecuteError>) -> String {
    match result {
        Ok(outcome) => match outcome.lint_report.as_deref() {
            Some(report) if outcome.has_lint_errors() => lint_feedback(report),
            _ => success_feedback(outcome),
        },
        Err(err) => error_feedback(err),
    }
}

/// Render requested files; `None` content means the file could not be read.
pub fn files_feedback(files: &[(String, Option<String>)]) -> String {
    let mut text = FILES_HEADER.to_string();
    for (name, content) in files {
        text.push_str(&format!("### {name}\n```\n"));
        text.push_str(content.as_deref().unwrap_or(UNREADABLE));
        text.push_str("\n```\n\n");
    }
    text.push_str(FILES_INVITATION);
    text
}
