use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub edit: EditConfig,
    #[serde(default)]
    pub lint: LintConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub repo_map: RepoMapConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EditConfig {
    /// Opening and closing fence
    pub fence: (String, String),
    pub auto_commits: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            fence: ("```".to_string(), "```".to_string()),
            auto_commits: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    pub enabled: bool,
    pub syntax: bool,
    pub cargo: bool,
    pub timeout_secs: u64,
    /// Extension (or `*`) to command
    pub commands: BTreeMap<String, LintCommand>,
}

/// `"flake8 --select=E9"` is split on whitespace with no quoting rules;
/// `["sh", "-c", "lint \"$0\""]` is passed through as argv.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum LintCommand {
    Line(String),
    Argv(Vec<String>),
}

impl LintCommand {
    pub fn argv(&self) -> Vec<String> {
        match self {
            LintCommand::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            LintCommand::Argv(argv) => argv.clone(),
        }
    }
}

impl From<&str> for LintCommand {
    fn from(line: &str) -> Self {
        LintCommand::Line(line.to_string())
    }
}

impl From<String> for LintCommand {
    fn from(line: String) -> Self {
        LintCommand::Line(line)
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            syntax: true,
            cargo: false,
            timeout_secs: 60,
            commands: BTreeMap::new(),
        }
    }
}

impl LintConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl GitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// Agent command; the message and in-chat files are appended
    pub command: Option<Vec<String>>,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 600,
        }
    }
}

impl ChatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoMapConfig {
    /// Byte budget for the map; 0 disables it
    pub map_bytes: usize,
}

impl Default for RepoMapConfig {
    fn default() -> Self {
        Self {
            map_bytes: crate::repomap::DEFAULT_MAP_BYTES,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ValidationIssue::InvalidValue {
                field: "server.port",
                message: "must be non-zero".to_string(),
            });
        }
        if self.server.host.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "server.host" });
        }

        let (open, close) = &self.edit.fence;
        if open.is_empty() || close.is_empty() {
            issues.push(ValidationIssue::InvalidValue {
                field: "edit.fence",
                message: "fences must be non-empty".to_string(),
            });
        }

        for (field, secs) in [
            ("lint.timeout_secs", self.lint.timeout_secs),
            ("git.timeout_secs", self.git.timeout_secs),
            ("chat.timeout_secs", self.chat.timeout_secs),
        ] {
            if secs == 0 {
                issues.push(ValidationIssue::InvalidValue {
                    field,
                    message: "timeout must be positive".to_string(),
                });
            }
        }

        for (ext, command) in &self.lint.commands {
            if command.argv().first().map_or(true, |program| program.trim().is_empty()) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "lint.commands",
                    message: format!("command for '{ext}' is empty"),
                });
            }
        }

        if let Some(command) = &self.chat.command {
            if command.is_empty() || command[0].trim().is_empty() {
                issues.push(ValidationIssue::InvalidValue {
                    field: "chat.command",
                    message: "must name a program".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => write!(f, "missing required field '{field}'"),
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}
