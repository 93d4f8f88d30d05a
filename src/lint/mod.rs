//! Post-apply checks over touched files.
//!
//! A [`Linter`] turns one file into a report; an empty report means clean.
//! [`lint_files`] is the gate that runs a linter over a whole change set.

pub mod cargo;
pub mod command;
pub mod syntax;

pub use cargo::CargoLinter;
pub use command::CommandLinter;
pub use syntax::SyntaxLinter;

use crate::process::ProcessError;
use crate::ts::TreeSitterError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LintError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),

    #[error("cargo check output could not be read: {0}")]
    Cargo(String),
}

/// Checks one workspace-relative file and reports problems as text.
pub trait Linter: Send {
    fn lint(&self, workspace: &Path, file: &Path) -> Result<String, LintError>;
}

impl<L: Linter + ?Sized> Linter for Box<L> {
    fn lint(&self, workspace: &Path, file: &Path) -> Result<String, LintError> {
        (**self).lint(workspace, file)
    }
}

/// Lint every touched file and join the non-empty reports with `\n`.
///
/// A linter failure on one file is logged and that file skipped; it never
/// fails the gate.
pub fn lint_files(linter: &dyn Linter, workspace: &Path, files: &BTreeSet<PathBuf>) -> String {
    let mut reports = Vec::new();
    for file in files {
        match linter.lint(workspace, file) {
            Ok(report) if report.trim().is_empty() => {}
            Ok(report) => reports.push(report),
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "linter failed, skipping file");
            }
        }
    }
    reports.join("\n")
}

/// Runs several linters in order and joins what they report.
#[derive(Default)]
pub struct CompositeLinter {
    linters: Vec<Box<dyn Linter>>,
}

impl CompositeLinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, linter: impl Linter + 'static) -> Self {
        self.linters.push(Box::new(linter));
        self
    }

    pub fn push(&mut self, linter: Box<dyn Linter>) {
        self.linters.push(linter);
    }

    pub fn is_empty(&self) -> bool {
        self.linters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.linters.len()
    }
}

impl Linter for CompositeLinter {
    fn lint(&self, workspace: &Path, file: &Path) -> Result<String, LintError> {
        let mut reports = Vec::new();
        let mut first_error = None;

        for linter in &self.linters {
            match linter.lint(workspace, file) {
                Ok(report) if report.trim().is_empty() => {}
                Ok(report) => reports.push(report),
                Err(err) => {
                    tracing::debug!(file = %file.display(), error = %err, "composite member failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if reports.is_empty() => Err(err),
            _ => Ok(reports.join("\n")),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Returns canned reports; files named in `failing` error out.
    #[derive(Default)]
    pub struct FakeLinter {
        pub reports: HashMap<PathBuf, String>,
        pub failing: Vec<PathBuf>,
    }

    impl FakeLinter {
        pub fn report(mut self, file: &str, text: &str) -> Self {
            self.reports.insert(PathBuf::from(file), text.to_string());
            self
        }

        pub fn fail(mut self, file: &str) -> Self {
            self.failing.push(PathBuf::from(file));
            self
        }
    }

    impl Linter for FakeLinter {
        fn lint(&self, _workspace: &Path, file: &Path) -> Result<String, LintError> {
            if self.failing.iter().any(|f| f == file) {
                return Err(LintError::Cargo("boom".to_string()));
            }
            Ok(self.reports.get(file).cloned().unwrap_or_default())
        }
    }
}
