use crate::config::schema::{BridgeConfig, ValidationError};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File looked up in the workspace root when no path is given.
pub const CONFIG_FILE_NAME: &str = "patch-bridge.toml";

/// Where the rejected configuration text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Inline,
    File(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::Inline => f.write_str("inline bridge config"),
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigProblem {
    /// The file named with `--config` (or found in the workspace) could not be read.
    Unreadable(io::Error),
    /// Not TOML, or a key outside the known sections.
    Malformed(toml_edit::de::Error),
    /// Parsed, but one or more values are out of range.
    Rejected(ValidationError),
}

/// A configuration that cannot be used to start the bridge.
#[derive(Debug)]
pub struct ConfigError {
    pub origin: ConfigOrigin,
    pub problem: ConfigProblem,
}

impl ConfigError {
    fn inline(problem: ConfigProblem) -> Self {
        Self {
            origin: ConfigOrigin::Inline,
            problem,
        }
    }

    /// The validation issues, when the text parsed but was rejected.
    pub fn validation(&self) -> Option<&ValidationError> {
        match &self.problem {
            ConfigProblem::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            ConfigProblem::Unreadable(source) => {
                write!(f, "cannot open {}: {source}", self.origin)
            }
            ConfigProblem::Malformed(source) => {
                write!(f, "{} is not a valid {CONFIG_FILE_NAME}: {source}", self.origin)
            }
            ConfigProblem::Rejected(source) => {
                write!(f, "{} was rejected: {source}", self.origin)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.problem {
            ConfigProblem::Unreadable(source) => Some(source),
            ConfigProblem::Malformed(source) => Some(source),
            ConfigProblem::Rejected(source) => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::inline(ConfigProblem::Malformed(source)))?;
    config
        .validate()
        .map_err(|source| ConfigError::inline(ConfigProblem::Rejected(source)))?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
    let path = path.as_ref();
    let origin = ConfigOrigin::File(path.to_path_buf());
    let contents = fs::read_to_string(path).map_err(|source| ConfigError {
        origin: origin.clone(),
        problem: ConfigProblem::Unreadable(source),
    })?;
    load_from_str(&contents).map_err(|error| ConfigError {
        origin,
        problem: error.problem,
    })
}

/// Load `explicit`, else the workspace's `patch-bridge.toml`, else defaults.
pub fn load_for_workspace(
    workspace: &Path,
    explicit: Option<&Path>,
) -> Result<BridgeConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = workspace.join(CONFIG_FILE_NAME);
    if !candidate.is_file() {
        return Ok(BridgeConfig::default());
    }
    tracing::debug!(path = %candidate.display(), "loading workspace config");
    load_from_path(&candidate)
}
