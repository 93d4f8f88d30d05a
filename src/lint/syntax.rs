//! Parse-error linting with tree-sitter.

use crate::lint::{LintError, Linter};
use crate::pool;
use crate::ts::{Lang, SyntaxIssue};
use std::path::Path;

/// Reports ERROR and MISSING nodes for files in a supported language.
///
/// Unknown extensions are clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxLinter;

impl SyntaxLinter {
    pub fn new() -> Self {
        Self
    }

    /// Lint already-loaded source. `file` names the report lines and picks the grammar.
    pub fn check_source(&self, file: &Path, source: &str) -> Result<String, LintError> {
        let Some(lang) = Lang::from_path(file) else {
            return Ok(String::new());
        };

        let issues = pool::with_parser(lang, |parser| {
            parser
                .parse_with_source(source)
                .map(|parsed| parsed.syntax_issues())
        })??;

        Ok(render(file, &issues))
    }
}

fn render(file: &Path, issues: &[SyntaxIssue]) -> String {
    issues
        .iter()
        .map(|issue| {
            format!(
                "{}:{}:{}: syntax error near `{}`",
                file.display(),
                issue.line,
                issue.column,
                issue.context
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Linter for SyntaxLinter {
    fn lint(&self, workspace: &Path, file: &Path) -> Result<String, LintError> {
        if Lang::from_path(file).is_none() {
            return Ok(String::new());
        }
        let path = workspace.join(file);
        let source = std::fs::read_to_string(&path).map_err(|source| LintError::Io {
            path: path.clone(),
            source,
        })?;
        self.check_source(file, &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_source_is_clean() {
        let report = SyntaxLinter::new()
            .check_source(Path::new("ok.rs"), "fn main() {}\n")
            .unwrap();
        assert_eq!(report, "");
    }

    #[test]
    fn test_broken_source_reports_position() {
        let report = SyntaxLinter::new()
            .check_source(Path::new("src/bad.rs"), "fn main( {\n")
            .unwrap();
        assert!(report.starts_with("src/bad.rs:1:"), "{report}");
        assert!(report.contains("near `"));
    }

    #[test]
    fn test_unknown_extension_is_clean() {
        let report = SyntaxLinter::new()
            .check_source(Path::new("notes.txt"), "((((")
            .unwrap();
        assert_eq!(report, "");
    }

    #[test]
    fn test_lint_reads_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{\"a\": }").unwrap();
        let report = SyntaxLinter::new().lint(dir.path(), Path::new("bad.json")).unwrap();
        assert!(report.starts_with("bad.json:1:"), "{report}");
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SyntaxLinter::new().lint(dir.path(), Path::new("gone.py"));
        assert!(matches!(result, Err(LintError::Io { .. })));
    }
}
