//! Patch Bridge: an HTTP bridge for applying assistant edits to a workspace
//!
//! Clients send YAML batches of SEARCH/REPLACE edits. Each batch is applied
//! to the workspace, linted, and committed to git when the lint is clean.
//!
//! # Architecture
//!
//! - [`patch::PatchApplier`] rewrites one file's text for one edit. It is
//!   pure and tolerant of indentation, fences and `...` elisions.
//! - [`executor::ChangeSetExecutor`] runs a batch through a
//!   [`store::FileStore`] and records which files were touched.
//! - [`lint::lint_files`] runs a [`lint::Linter`] over the touched files.
//! - [`git::commit_gate`] commits them when the lint came back clean.
//! - [`session::Session`] ties these together for one workspace and
//!   [`server`] exposes it over HTTP.
//!
//! # Safety
//!
//! - Every request path is confined to the workspace by [`WorkspaceGuard`]
//! - Atomic file writes (tempfile + fsync + rename)
//! - Every external process runs under a timeout
//!
//! # Example
//!
//! ```no_run
//! use patch_bridge::Session;
//!
//! let mut session = Session::new("/path/to/repo")?;
//! let feedback = session.execute_yaml(
//!     "code_changes:\n  - file: app.py\n    search: return 1\n    replace: return 2\n",
//! )?;
//! println!("{feedback}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod batch;
pub mod chat;
pub mod config;
pub mod executor;
pub mod git;
pub mod lint;
pub mod logging;
pub mod patch;
pub mod pool;
pub mod process;
pub mod repomap;
pub mod safety;
pub mod server;
pub mod session;
pub mod store;
pub mod ts;
pub mod workflow;

// Re-exports
pub use batch::{BatchError, BatchRequest};
pub use config::{load_for_workspace, load_from_path, load_from_str, BridgeConfig, ConfigError};
pub use executor::{ChangeRequest, ChangeResult, ChangeSetExecutor, ExecuteError, ExecutionOutcome};
pub use git::{CommitInfo, GitError, GitRepository, Repository};
pub use lint::{CargoLinter, CommandLinter, CompositeLinter, LintError, Linter, SyntaxLinter};
pub use patch::{Fence, MatchStrategy, PatchApplier, PatchError, Patched};
pub use safety::{SafetyError, WorkspaceGuard};
pub use session::{ContextReport, Session, SessionError};
pub use store::{DryRunStore, FileStore, StoreError, WorkspaceStore};
pub use workflow::TerminalState;
