//! Applies a batch of SEARCH/REPLACE requests through a [`FileStore`].

use crate::patch::{PatchApplier, PatchError};
use crate::store::{FileStore, StoreError};
use crate::workflow::TerminalState;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One requested edit as it arrives in a batch.
///
/// Fields are optional because malformed entries are skipped rather than
/// rejected. Scalars such as numbers and booleans are taken as their text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChangeRequest {
    #[serde(default, deserialize_with = "scalar_text")]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub replace: Option<String>,
}

impl ChangeRequest {
    pub fn new(
        file: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            file: Some(file.into()),
            search: Some(search.into()),
            replace: Some(replace.into()),
        }
    }

    /// Lenient conversion from one YAML list entry.
    pub fn from_value(value: &serde_yaml::Value) -> Self {
        if !value.is_mapping() {
            return Self::default();
        }
        serde_yaml::from_value(value.clone()).unwrap_or_default()
    }

    /// The three fields, if all are present and the file name is non-empty.
    fn parts(&self) -> Option<(&str, &str, &str)> {
        match (&self.file, &self.search, &self.replace) {
            (Some(file), Some(search), Some(replace)) if !file.is_empty() => {
                Some((file.as_str(), search.as_str(), replace.as_str()))
            }
            _ => None,
        }
    }
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_yaml::Value;

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

/// Per-request record. Skipped requests carry `applied: false` and a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeResult {
    pub file: Option<PathBuf>,
    pub applied: bool,
    pub error: Option<String>,
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub applied: usize,
    pub touched: BTreeSet<PathBuf>,
    pub results: Vec<ChangeResult>,
    pub lint_report: Option<String>,
    pub commit: Option<String>,
}

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Unable to read {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("SEARCH block failed to match in {file}:\n{search}{}", hint_suffix(.hint))]
    NoMatch {
        file: PathBuf,
        search: String,
        hint: Option<String>,
    },

    #[error("Malformed edit for {file}: {source}")]
    MalformedEdit {
        file: PathBuf,
        #[source]
        source: PatchError,
    },

    #[error("Unable to write {file}: {source}")]
    Write {
        file: PathBuf,
        #[source]
        source: StoreError,
    },
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(lines) => format!("\n\nDid you mean to match these lines?\n{lines}"),
        None => String::new(),
    }
}

impl ExecuteError {
    pub fn file(&self) -> &Path {
        match self {
            ExecuteError::Read { file, .. }
            | ExecuteError::NoMatch { file, .. }
            | ExecuteError::MalformedEdit { file, .. }
            | ExecuteError::Write { file, .. } => file,
        }
    }

    pub fn terminal_state(&self) -> TerminalState {
        match self {
            ExecuteError::Read { .. } => TerminalState::ReadFailed,
            _ => TerminalState::ApplyFailed,
        }
    }
}

/// Drives [`PatchApplier`] over a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct ChangeSetExecutor {
    applier: PatchApplier,
}

impl ChangeSetExecutor {
    pub fn new(applier: PatchApplier) -> Self {
        Self { applier }
    }

    /// Apply every well-formed request, stopping at the first failure.
    ///
    /// Files written before a failure stay written.
    pub fn execute(
        &self,
        changes: &[ChangeRequest],
        store: &mut dyn FileStore,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let mut outcome = ExecutionOutcome::default();

        for (index, change) in changes.iter().enumerate() {
            let Some((file, search, replace)) = change.parts() else {
                tracing::debug!(index, "skipping change with missing file, search or replace");
                outcome.results.push(ChangeResult {
                    file: change.file.as_deref().map(PathBuf::from),
                    applied: false,
                    error: Some("missing file, search or replace".to_string()),
                });
                continue;
            };

            let path = store
                .resolve(Path::new(file))
                .map_err(|source| ExecuteError::Read {
                    file: PathBuf::from(file),
                    source,
                })?;
            let current = store.read(&path).map_err(|source| ExecuteError::Read {
                file: path.clone(),
                source,
            })?;

            let patched = self
                .applier
                .apply(&path, &current, search, replace)
                .map_err(|err| match err {
                    PatchError::NoMatch { search, hint } => ExecuteError::NoMatch {
                        file: path.clone(),
                        search,
                        hint,
                    },
                    source => ExecuteError::MalformedEdit {
                        file: path.clone(),
                        source,
                    },
                })?;
            tracing::debug!(file = %path.display(), strategy = ?patched.strategy, "matched");

            store
                .write(&path, &patched.text)
                .map_err(|source| ExecuteError::Write {
                    file: path.clone(),
                    source,
                })?;

            outcome.applied += 1;
            outcome.touched.insert(path.clone());
            outcome.results.push(ChangeResult {
                file: Some(path),
                applied: true,
                error: None,
            });
        }

        tracing::info!(
            applied = outcome.applied,
            files = outcome.touched.len(),
            "change set applied"
        );
        Ok(outcome)
    }
}
