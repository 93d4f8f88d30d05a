//! Git access for commits and `/context` queries.

use crate::process::{run_with_timeout, ProcessError, ProcessOutput};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// Subject line of every automatic commit.
pub const COMMIT_SUBJECT: &str = "Applied code changes via API";

#[derive(Error, Debug)]
pub enum GitError {
    #[error("{0} is not inside a git work tree")]
    NotARepository(PathBuf),

    #[error("`git {command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// A commit the gate produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full hex hash
    pub id: String,
    pub message: String,
}

impl CommitInfo {
    /// First 7 characters of the hash.
    pub fn short_id(&self) -> &str {
        self.id.get(..7).unwrap_or(&self.id)
    }
}

/// Version control operations the workflow needs. Paths are relative to
/// the session workspace.
pub trait Repository: Send {
    /// Stage and commit `files`. `Ok(None)` when nothing changed.
    fn commit(&self, files: &[PathBuf], message: &str) -> Result<Option<CommitInfo>, GitError>;

    fn tracked_files(&self) -> Result<Vec<PathBuf>, GitError>;

    /// Branch name, or `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>, GitError>;
}

/// Drives the `git` binary from the workspace directory.
#[derive(Debug, Clone)]
pub struct GitRepository {
    workdir: PathBuf,
    toplevel: PathBuf,
    timeout: Duration,
}

impl GitRepository {
    /// Open the work tree containing `workdir`.
    pub fn discover(workdir: impl AsRef<Path>, timeout: Duration) -> Result<Self, GitError> {
        let workdir = workdir.as_ref().to_path_buf();
        let output = git(&workdir, timeout, &["rev-parse", "--show-toplevel"])?;
        if !output.success() {
            return Err(GitError::NotARepository(workdir));
        }
        let toplevel = PathBuf::from(output.stdout.trim());
        tracing::debug!(toplevel = %toplevel.display(), "found git work tree");
        Ok(Self {
            workdir,
            toplevel,
            timeout,
        })
    }

    pub fn toplevel(&self) -> &Path {
        &self.toplevel
    }

    fn run(&self, args: &[&str]) -> Result<ProcessOutput, GitError> {
        let output = git(&self.workdir, self.timeout, args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(GitError::Command {
                command: args.join(" "),
                stderr: output.combined(),
            })
        }
    }
}

fn git(workdir: &Path, timeout: Duration, args: &[&str]) -> Result<ProcessOutput, GitError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir).args(args);
    Ok(run_with_timeout(cmd, timeout)?)
}

impl Repository for GitRepository {
    fn commit(&self, files: &[PathBuf], message: &str) -> Result<Option<CommitInfo>, GitError> {
        let paths: Vec<String> = files.iter().map(|f| f.to_string_lossy().into_owned()).collect();
        let path_args: Vec<&str> = paths.iter().map(String::as_str).collect();

        let mut add = vec!["add", "--"];
        add.extend(&path_args);
        self.run(&add)?;

        // Exit status 0 means nothing is staged for these paths
        let mut diff = vec!["diff", "--cached", "--quiet", "--"];
        diff.extend(&path_args);
        let staged = git(&self.workdir, self.timeout, &diff)?;
        if staged.success() {
            tracing::info!("nothing to commit");
            return Ok(None);
        }

        let mut commit = vec!["commit", "-m", message, "--"];
        commit.extend(&path_args);
        self.run(&commit)?;

        let head = self.run(&["rev-parse", "HEAD"])?;
        Ok(Some(CommitInfo {
            id: head.stdout.trim().to_string(),
            message: message.to_string(),
        }))
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>, GitError> {
        // NUL-separated so non-ASCII names come back unquoted
        let output = self.run(&["ls-files", "-z"])?;
        Ok(output
            .stdout
            .split('\0')
            .filter(|name| !name.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn current_branch(&self) -> Result<Option<String>, GitError> {
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.stdout.trim();
        Ok((branch != "HEAD").then(|| branch.to_string()))
    }
}

/// Commit message for a change set: the subject, a blank line, then one
/// `- <file>` line per file in sorted order.
pub fn commit_message(files: &BTreeSet<PathBuf>) -> String {
    let mut message = format!("{COMMIT_SUBJECT}\n");
    if !files.is_empty() {
        message.push('\n');
    }
    for file in files {
        message.push_str(&format!("- {}\n", file.display()));
    }
    message
}

/// Commit the touched files. Failure is logged and reported as no commit.
pub fn commit_gate(repository: &dyn Repository, files: &BTreeSet<PathBuf>) -> Option<CommitInfo> {
    if files.is_empty() {
        return None;
    }
    let list: Vec<PathBuf> = files.iter().cloned().collect();
    match repository.commit(&list, &commit_message(files)) {
        Ok(Some(info)) => {
            tracing::info!(commit = %info.short_id(), files = list.len(), "committed changes");
            Some(info)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(error = %err, "commit failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records commits in memory.
    #[derive(Default, Clone)]
    pub struct FakeRepository {
        pub commits: Arc<Mutex<Vec<(Vec<PathBuf>, String)>>>,
        pub tracked: Vec<PathBuf>,
        pub branch: Option<String>,
        pub fail: bool,
    }

    impl Repository for FakeRepository {
        fn commit(&self, files: &[PathBuf], message: &str) -> Result<Option<CommitInfo>, GitError> {
            if self.fail {
                return Err(GitError::Command {
                    command: "commit".to_string(),
                    stderr: "hook rejected".to_string(),
                });
            }
            self.commits
                .lock()
                .unwrap()
                .push((files.to_vec(), message.to_string()));
            Ok(Some(CommitInfo {
                id: "0123456789abcdef0123456789abcdef01234567".to_string(),
                message: message.to_string(),
            }))
        }

        fn tracked_files(&self) -> Result<Vec<PathBuf>, GitError> {
            Ok(self.tracked.clone())
        }

        fn current_branch(&self) -> Result<Option<String>, GitError> {
            Ok(self.branch.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeRepository;
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "bridge@example.com"],
            vec!["config", "user.name", "Bridge Test"],
            vec!["config", "commit.gpgsign", "false"],
        ] {
            let status = Command::new("git").args(&args).current_dir(dir).status().unwrap();
            assert!(status.success());
        }
    }

    #[test]
    fn test_commit_message_lists_sorted_files() {
        let message = commit_message(&set(&["src/b.rs", "src/a.rs"]));
        assert_eq!(
            message,
            "Applied code changes via API\n\n- src/a.rs\n- src/b.rs\n"
        );
    }

    #[test]
    fn test_short_id() {
        let info = CommitInfo {
            id: "abcdef0123456".to_string(),
            message: String::new(),
        };
        assert_eq!(info.short_id(), "abcdef0");
    }

    #[test]
    fn test_gate_failure_is_no_commit() {
        let repo = FakeRepository {
            fail: true,
            ..Default::default()
        };
        assert_eq!(commit_gate(&repo, &set(&["a.py"])), None);
    }

    #[test]
    fn test_gate_skips_empty_set() {
        let repo = FakeRepository::default();
        assert_eq!(commit_gate(&repo, &BTreeSet::new()), None);
        assert!(repo.commits.lock().unwrap().is_empty());
    }

    #[test]
    fn test_real_commit_roundtrip() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();

        let repo = GitRepository::discover(dir.path(), Duration::from_secs(30)).unwrap();
        let info = commit_gate(&repo, &set(&["a.txt"])).unwrap();
        assert_eq!(info.id.len(), 40);
        assert_eq!(repo.tracked_files().unwrap(), vec![PathBuf::from("a.txt")]);
        assert!(repo.current_branch().unwrap().is_some());

        // Same content again: nothing staged
        assert_eq!(commit_gate(&repo, &set(&["a.txt"])), None);
    }

    #[test]
    fn test_tracked_files_keeps_non_ascii_names() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("héllo.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("with space.py"), "y = 2\n").unwrap();

        let repo = GitRepository::discover(dir.path(), Duration::from_secs(30)).unwrap();
        let files = [PathBuf::from("héllo.py"), PathBuf::from("with space.py")];
        commit_gate(&repo, &files.iter().cloned().collect()).unwrap();

        let mut tracked = repo.tracked_files().unwrap();
        tracked.sort();
        assert_eq!(tracked, files.to_vec());
    }

    #[test]
    fn test_discover_outside_repository() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let result = GitRepository::discover(dir.path(), Duration::from_secs(30));
        assert!(matches!(result, Err(GitError::NotARepository(_))));
    }
}
