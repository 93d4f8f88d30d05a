//! `cargo check` diagnostics as lint reports.

use crate::lint::{LintError, Linter};
use crate::process::run_with_timeout;
use cargo_metadata::diagnostic::{Diagnostic, DiagnosticLevel};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Runs `cargo check --message-format=json` in the workspace and reports
/// error-level diagnostics whose primary span lies in the linted file.
///
/// Non-Rust files are clean without running cargo.
#[derive(Debug, Clone)]
pub struct CargoLinter {
    timeout: Duration,
}

impl CargoLinter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Linter for CargoLinter {
    fn lint(&self, workspace: &Path, file: &Path) -> Result<String, LintError> {
        if file.extension().and_then(|ext| ext.to_str()) != Some("rs") {
            return Ok(String::new());
        }

        let mut cmd = Command::new("cargo");
        cmd.current_dir(workspace)
            .args(["check", "--message-format=json", "--quiet"])
            .env("CARGO_TERM_COLOR", "never");

        let output = run_with_timeout(cmd, self.timeout)?;
        let errors = errors_in_file(&output.stdout, file)?;
        Ok(errors.join("\n"))
    }
}

/// Collect rendered error diagnostics for `file` from cargo's JSON stream.
pub fn errors_in_file(stream: &str, file: &Path) -> Result<Vec<String>, LintError> {
    let mut reports = Vec::new();

    for line in stream.lines() {
        // Build scripts and proc macros may print plain text
        if !line.starts_with('{') {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if value.get("reason").and_then(|r| r.as_str()) != Some("compiler-message") {
            continue;
        }
        let Some(message) = value.get("message") else {
            continue;
        };
        let diagnostic: Diagnostic = serde_json::from_value(message.clone())
            .map_err(|e| LintError::Cargo(e.to_string()))?;

        if !matches!(diagnostic.level, DiagnosticLevel::Error) {
            continue;
        }
        let Some(span) = diagnostic
            .spans
            .iter()
            .find(|span| span.is_primary && Path::new(&span.file_name) == file)
        else {
            continue;
        };

        let report = match &diagnostic.rendered {
            Some(rendered) => rendered.trim_end().to_string(),
            None => format!(
                "{}:{}:{}: error: {}",
                span.file_name, span.line_start, span.column_start, diagnostic.message
            ),
        };
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(level: &str, file: &str, primary: bool, rendered: Option<&str>) -> String {
        serde_json::json!({
            "reason": "compiler-message",
            "message": {
                "message": "mismatched types",
                "code": { "code": "E0308", "explanation": null },
                "level": level,
                "spans": [{
                    "file_name": file,
                    "byte_start": 10,
                    "byte_end": 12,
                    "line_start": 3,
                    "line_end": 3,
                    "column_start": 5,
                    "column_end": 7,
                    "is_primary": primary,
                    "text": [],
                    "label": null,
                    "suggested_replacement": null,
                    "suggestion_applicability": null,
                    "expansion": null
                }],
                "children": [],
                "rendered": rendered
            }
        })
        .to_string()
    }

    #[test]
    fn test_picks_errors_in_linted_file() {
        let stream = [
            "Compiling junk output".to_string(),
            message("error", "src/lib.rs", true, None),
            message("warning", "src/lib.rs", true, None),
            message("error", "src/other.rs", true, None),
            message("error", "src/lib.rs", false, None),
            r#"{"reason":"build-finished","success":false}"#.to_string(),
        ]
        .join("\n");

        let reports = errors_in_file(&stream, Path::new("src/lib.rs")).unwrap();
        assert_eq!(reports, vec!["src/lib.rs:3:5: error: mismatched types".to_string()]);
    }

    #[test]
    fn test_prefers_rendered_text() {
        let stream = message("error", "src/main.rs", true, Some("error[E0308]: mismatched types\n"));
        let reports = errors_in_file(&stream, Path::new("src/main.rs")).unwrap();
        assert_eq!(reports, vec!["error[E0308]: mismatched types".to_string()]);
    }

    #[test]
    fn test_non_rust_file_is_clean() {
        let linter = CargoLinter::new(Duration::from_secs(1));
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(linter.lint(dir.path(), Path::new("app.py")).unwrap(), "");
    }
}
