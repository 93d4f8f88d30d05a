//! External lint commands keyed by file extension.

use crate::lint::{LintError, Linter};
use crate::process::run_with_timeout;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Key that matches files of any extension.
pub const ANY_EXTENSION: &str = "*";

/// Runs a configured command with the file path appended.
///
/// A command for the file's own extension wins over the catch-all. A
/// non-zero exit is a finding; its output becomes the report.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    commands: BTreeMap<String, Vec<String>>,
    timeout: Duration,
}

impl CommandLinter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            commands: BTreeMap::new(),
            timeout,
        }
    }

    /// Register `command` for files ending in `.extension` (or `*`).
    ///
    /// The line is split on whitespace; quotes are not interpreted. Use
    /// [`CommandLinter::with_argv`] for arguments containing spaces.
    pub fn with_command(self, extension: &str, command: &str) -> Self {
        self.with_argv(extension, command.split_whitespace())
    }

    pub fn with_argv<I, S>(mut self, extension: &str, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.commands
            .insert(key, argv.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn command_for(&self, file: &Path) -> Option<&[String]> {
        let ext = file
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        ext.and_then(|ext| self.commands.get(&ext))
            .or_else(|| self.commands.get(ANY_EXTENSION))
            .map(Vec::as_slice)
    }
}

impl Linter for CommandLinter {
    fn lint(&self, workspace: &Path, file: &Path) -> Result<String, LintError> {
        let Some(argv) = self.command_for(file) else {
            return Ok(String::new());
        };
        let Some((program, args)) = argv.split_first() else {
            return Ok(String::new());
        };

        let mut command = Command::new(program);
        command.args(args).arg(file).current_dir(workspace);
        let command_line = argv.join(" ");

        let output = run_with_timeout(command, self.timeout)?;
        if output.success() {
            return Ok(String::new());
        }

        let mut body = output.combined();
        if body.is_empty() {
            body = format!("exited with {}", output.status);
        }
        Ok(format!(
            "## Running: {command_line} {}\n\n{body}",
            file.display()
        ))
    }
}
