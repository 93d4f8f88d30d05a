//! Forwarding chat messages to an assistant.

use crate::process::{run_with_timeout, ProcessError};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chat command is empty")]
    EmptyCommand,

    #[error("chat command exited with {status}: {output}")]
    Failed { status: String, output: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub trait ChatBackend: Send {
    /// Send `message` with the in-chat `files` and return the reply.
    fn send(&self, workspace: &Path, message: &str, files: &[PathBuf]) -> Result<String, ChatError>;
}

/// Replies with the message itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoChat;

impl ChatBackend for EchoChat {
    fn send(&self, _workspace: &Path, message: &str, _files: &[PathBuf]) -> Result<String, ChatError> {
        Ok(format!("Echo: {message}"))
    }
}

/// Runs an agent command as `<argv...> <message> <files...>` in the workspace.
#[derive(Debug, Clone)]
pub struct CommandChat {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandChat {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Result<Self, ChatError> {
        if argv.is_empty() {
            return Err(ChatError::EmptyCommand);
        }
        Ok(Self { argv, timeout })
    }
}

impl ChatBackend for CommandChat {
    fn send(&self, workspace: &Path, message: &str, files: &[PathBuf]) -> Result<String, ChatError> {
        let (program, args) = self.argv.split_first().ok_or(ChatError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(message).args(files).current_dir(workspace);

        let output = run_with_timeout(cmd, self.timeout)?;
        if !output.success() {
            return Err(ChatError::Failed {
                status: output.status.to_string(),
                output: output.combined(),
            });
        }
        Ok(output.stdout.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let reply = EchoChat.send(Path::new("."), "hello", &[]).unwrap();
        assert_eq!(reply, "Echo: hello");
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandChat::new(Vec::new(), Duration::from_secs(1)),
            Err(ChatError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_message_then_files() {
        let dir = tempfile::tempdir().unwrap();
        let chat = CommandChat::new(vec!["echo".to_string()], Duration::from_secs(10)).unwrap();
        let reply = chat
            .send(dir.path(), "fix it", &[PathBuf::from("a.py"), PathBuf::from("b.py")])
            .unwrap();
        assert_eq!(reply, "fix it a.py b.py");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure() {
        let dir = tempfile::tempdir().unwrap();
        let chat = CommandChat::new(vec!["false".to_string()], Duration::from_secs(10)).unwrap();
        assert!(matches!(
            chat.send(dir.path(), "hi", &[]),
            Err(ChatError::Failed { .. })
        ));
    }
}
