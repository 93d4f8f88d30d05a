//! One assistant session over one workspace.
//!
//! A [`Session`] owns everything a request handler needs: the store, the
//! optional linter and repository, the chat backend and the set of files
//! currently in the chat. The server keeps exactly one behind a mutex.

use crate::batch::{files_feedback, outcome_feedback, BatchError, BatchRequest};
use crate::chat::{ChatBackend, ChatError, CommandChat, EchoChat};
use crate::config::{BridgeConfig, LintConfig};
use crate::executor::{ChangeRequest, ChangeSetExecutor, ExecuteError, ExecutionOutcome};
use crate::git::{GitRepository, Repository};
use crate::lint::{CargoLinter, CommandLinter, CompositeLinter, Linter, SyntaxLinter};
use crate::patch::{Fence, PatchApplier};
use crate::repomap::{list_files, RepoMap};
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::store::{FileStore, WorkspaceStore};
use crate::workflow::Workflow;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ACTIVE_FILES_SHOWN: usize = 10;
const DETACHED_HEAD: &str = "DETACHED HEAD";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// Snapshot served by `/context`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextReport {
    pub files_count: usize,
    pub repo_map: String,
    pub git_status: String,
    pub active_files: Vec<String>,
}

pub struct Session {
    guard: WorkspaceGuard,
    store: Box<dyn FileStore>,
    linter: Option<Box<dyn Linter>>,
    repository: Option<Box<dyn Repository>>,
    chat: Box<dyn ChatBackend>,
    chat_files: BTreeSet<PathBuf>,
    executor: ChangeSetExecutor,
    auto_commit: bool,
    repo_map: RepoMap,
}

impl Session {
    /// A bare session: disk store, no linter, no repository, echo chat.
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, SessionError> {
        let guard = WorkspaceGuard::new(workspace)?;
        Ok(Self {
            store: Box::new(WorkspaceStore::new(guard.clone())),
            guard,
            linter: None,
            repository: None,
            chat: Box::new(EchoChat),
            chat_files: BTreeSet::new(),
            executor: ChangeSetExecutor::default(),
            auto_commit: true,
            repo_map: RepoMap::default(),
        })
    }

    /// A session configured from `config`, attaching git when the workspace
    /// is inside a work tree.
    pub fn open(workspace: impl AsRef<Path>, config: &BridgeConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(workspace)?
            .with_fence(Fence::new(&config.edit.fence.0, &config.edit.fence.1))
            .with_auto_commit(config.edit.auto_commits)
            .with_repo_map(RepoMap::new(config.repo_map.map_bytes));

        match GitRepository::discover(session.workspace(), config.git.timeout()) {
            Ok(repo) => session = session.with_repository(repo),
            Err(err) => tracing::info!(error = %err, "running without git"),
        }

        if let Some(linter) = build_linter(&config.lint) {
            session = session.with_linter(linter);
        }

        if let Some(argv) = &config.chat.command {
            let chat = CommandChat::new(argv.clone(), config.chat.timeout())?;
            session = session.with_chat(chat);
        }

        tracing::info!(
            workspace = %session.workspace().display(),
            git = session.repository.is_some(),
            lint = session.linter.is_some(),
            "session opened"
        );
        Ok(session)
    }

    pub fn with_store(mut self, store: impl FileStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_linter(mut self, linter: impl Linter + 'static) -> Self {
        self.linter = Some(Box::new(linter));
        self
    }

    pub fn without_linter(mut self) -> Self {
        self.linter = None;
        self
    }

    pub fn with_repository(mut self, repository: impl Repository + 'static) -> Self {
        self.repository = Some(Box::new(repository));
        self
    }

    pub fn without_repository(mut self) -> Self {
        self.repository = None;
        self
    }

    pub fn with_chat(mut self, chat: impl ChatBackend + 'static) -> Self {
        self.chat = Box::new(chat);
        self
    }

    pub fn with_fence(mut self, fence: Fence) -> Self {
        self.executor = ChangeSetExecutor::new(PatchApplier::new(fence));
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_repo_map(mut self, repo_map: RepoMap) -> Self {
        self.repo_map = repo_map;
        self
    }

    pub fn workspace(&self) -> &Path {
        self.guard.workspace_root()
    }

    pub fn store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    pub fn chat_files(&self) -> &BTreeSet<PathBuf> {
        &self.chat_files
    }

    pub fn context(&self) -> ContextReport {
        let tracked = self
            .repository
            .as_ref()
            .and_then(|repo| match repo.tracked_files() {
                Ok(files) => Some(files),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to list tracked files");
                    None
                }
            });

        let files_count = tracked.as_ref().map_or(0, Vec::len);

        let repo_map = if self.repo_map.is_enabled() {
            let files = tracked.unwrap_or_else(|| list_files(self.workspace()));
            self.repo_map.render(self.workspace(), &files, &self.chat_files)
        } else {
            String::new()
        };

        let git_status = match self.repository.as_ref().map(|repo| repo.current_branch()) {
            Some(Ok(Some(branch))) => branch,
            Some(Ok(None)) => DETACHED_HEAD.to_string(),
            Some(Err(err)) => {
                tracing::debug!(error = %err, "no current branch");
                String::new()
            }
            None => String::new(),
        };

        ContextReport {
            files_count,
            repo_map,
            git_status,
            active_files: self
                .chat_files
                .iter()
                .take(ACTIVE_FILES_SHOWN)
                .map(|file| file.display().to_string())
                .collect(),
        }
    }

    /// Add files to the chat. Every path must pass the workspace guard.
    pub fn add_files(&mut self, names: &[String]) -> Result<String, SafetyError> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let path = self.guard.validate_path(name)?;
            resolved.push(self.guard.relative(&path));
        }
        self.chat_files.extend(resolved);
        Ok(format!("Added {} file(s) to the chat.", names.len()))
    }

    pub fn chat(&self, message: &str) -> Result<String, ChatError> {
        let files: Vec<PathBuf> = self.chat_files.iter().cloned().collect();
        self.chat.send(self.workspace(), message, &files)
    }

    /// Run a batch of changes through apply, lint and commit.
    pub fn execute(&mut self, changes: &[ChangeRequest]) -> Result<ExecutionOutcome, ExecuteError> {
        let workflow = Workflow {
            workspace: self.guard.workspace_root(),
            executor: &self.executor,
            linter: self.linter.as_deref(),
            repository: self.repository.as_deref(),
            auto_commit: self.auto_commit,
        };
        workflow.run(changes, self.store.as_mut())
    }

    /// Handle a YAML batch document and return the client feedback text.
    pub fn execute_yaml(&mut self, text: &str) -> Result<String, BatchError> {
        match BatchRequest::parse(text)? {
            BatchRequest::FilesNeeded(names) => Ok(self.files_needed(&names)),
            BatchRequest::CodeChanges(changes) => Ok(outcome_feedback(&self.execute(&changes))),
        }
    }

    fn files_needed(&mut self, names: &[String]) -> String {
        let mut rendered = Vec::with_capacity(names.len());
        for name in names {
            let content = match self.guard.validate_path(name) {
                Ok(path) => {
                    let relative = self.guard.relative(&path);
                    let content = self.store.read(&relative).ok();
                    self.chat_files.insert(relative);
                    content
                }
                Err(err) => {
                    tracing::debug!(file = %name, error = %err, "requested file rejected");
                    None
                }
            };
            rendered.push((name.clone(), content));
        }
        files_feedback(&rendered)
    }
}

/// Linters enabled by the `[lint]` section, or `None` when there are none.
fn build_linter(config: &LintConfig) -> Option<CompositeLinter> {
    if !config.enabled {
        return None;
    }

    let mut composite = CompositeLinter::new();
    if config.syntax {
        composite = composite.with(SyntaxLinter::new());
    }
    if !config.commands.is_empty() {
        let commands = config
            .commands
            .iter()
            .fold(CommandLinter::new(config.timeout()), |linter, (ext, cmd)| {
                linter.with_argv(ext, cmd.argv())
            });
        composite = composite.with(commands);
    }
    if config.cargo {
        composite = composite.with(CargoLinter::new(config.timeout()));
    }

    (!composite.is_empty()).then_some(composite)
}
