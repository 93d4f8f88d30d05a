//! `patch-bridge.toml` loading and validation.
//!
//! Every section is optional; missing values take the defaults below.

pub mod loader;
pub mod schema;

pub use loader::{
    load_for_workspace, load_from_path, load_from_str, ConfigError, ConfigOrigin, ConfigProblem,
    CONFIG_FILE_NAME,
};
pub use schema::{
    BridgeConfig, ChatConfig, EditConfig, GitConfig, LintCommand, LintConfig, RepoMapConfig,
    ServerConfig,
    ValidationError, ValidationIssue,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.repo_map.map_bytes, 4096);
        assert!(config.edit.auto_commits);
    }

    #[test]
    fn test_full_file() {
        let config = load_from_str(
            r#"
[server]
host = "0.0.0.0"
port = 8080

[edit]
fence = ["<source>", "</source>"]
auto_commits = false

[lint]
cargo = true
timeout_secs = 5
[lint.commands]
py = "flake8 --select=E9,F821"
rs = ["sh", "-c", "grep -q 'fn ' \"$0\""]
"*" = "true"

[chat]
command = ["aider", "--yes", "--message"]

[repo_map]
map_bytes = 0
"#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.edit.fence.0, "<source>");
        assert!(!config.edit.auto_commits);
        assert!(config.lint.cargo && config.lint.syntax);
        assert_eq!(config.lint.commands["py"], LintCommand::from("flake8 --select=E9,F821"));
        assert_eq!(config.lint.commands["py"].argv(), ["flake8", "--select=E9,F821"]);
        assert_eq!(config.lint.commands["rs"].argv()[2], "grep -q 'fn ' \"$0\"");
        assert_eq!(config.chat.command.as_ref().unwrap().len(), 3);
        assert_eq!(config.repo_map.map_bytes, 0);
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let err = load_from_str(
            "[server]\nport = 0\n[edit]\nfence = [\"\", \"```\"]\n[git]\ntimeout_secs = 0\n[chat]\ncommand = []\n",
        )
        .unwrap_err();
        assert_eq!(err.origin, ConfigOrigin::Inline);
        let Some(source) = err.validation() else {
            panic!("expected validation error, got {err}");
        };
        assert_eq!(source.issues.len(), 4);
        assert!(source.to_string().contains("server.port"));
        assert!(err.to_string().starts_with("inline bridge config was rejected: "), "{err}");
    }

    #[test]
    fn test_unknown_key_is_malformed_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server]\nprot = 1\n").unwrap();

        let err = load_for_workspace(dir.path(), None).unwrap_err();
        assert!(matches!(err.problem, ConfigProblem::Malformed(_)));
        assert_eq!(err.origin, ConfigOrigin::File(path.clone()));
        assert!(err.to_string().starts_with(&format!("{} is not a valid patch-bridge.toml", path.display())));
    }

    #[test]
    fn test_missing_workspace_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_for_workspace(dir.path(), None).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_unreadable() {
        let err = load_for_workspace(Path::new("."), Some(Path::new("/nonexistent/bridge.toml")))
            .unwrap_err();
        assert!(matches!(err.problem, ConfigProblem::Unreadable(_)));
        assert!(err.to_string().starts_with("cannot open /nonexistent/bridge.toml: "), "{err}");
    }
}
