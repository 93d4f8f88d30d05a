use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Confines request paths to the workspace and away from tool-owned directories.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical workspace root
    workspace_root: PathBuf,
    /// Canonical directories no request may touch
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Path is empty")]
    EmptyPath,

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceGuard {
    /// Create a guard for `workspace_root`, which must exist.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = canonicalize(workspace_root.as_ref())?;

        let mut forbidden_paths = vec![workspace_root.join(".git"), workspace_root.join("target")];

        if let Some(home) = home::home_dir() {
            for dir in [".cargo/registry", ".cargo/git", ".rustup"] {
                if let Ok(path) = home.join(dir).canonicalize() {
                    forbidden_paths.push(path);
                }
            }
        }

        Ok(Self {
            workspace_root,
            forbidden_paths,
        })
    }

    /// Resolve `path` and check that it may be read or written.
    ///
    /// The file itself need not exist: `..` is folded lexically, then
    /// symlinks are resolved through the deepest existing ancestor.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(SafetyError::EmptyPath);
        }

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let resolved = self.resolve(&absolute)?;
        self.check_canonical(&resolved)?;
        Ok(resolved)
    }

    fn resolve(&self, absolute: &Path) -> Result<PathBuf, SafetyError> {
        let absolute = normalize(absolute);
        let mut existing = absolute.as_path();
        let mut rest = Vec::new();
        while !existing.exists() {
            let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                break;
            };
            rest.push(name);
            existing = parent;
        }

        let mut resolved = canonicalize(existing)?;
        for name in rest.iter().rev() {
            resolved.push(name);
        }
        Ok(resolved)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    /// Workspace-relative form of a validated path.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.workspace_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Create a guard with custom forbidden paths (for testing).
    #[cfg(test)]
    pub fn with_forbidden(
        workspace_root: impl AsRef<Path>,
        forbidden: Vec<PathBuf>,
    ) -> Result<Self, SafetyError> {
        let workspace_root = canonicalize(workspace_root.as_ref())?;
        Ok(Self {
            workspace_root,
            forbidden_paths: forbidden,
        })
    }
}

/// Fold `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize().map_err(|source| SafetyError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let file = temp_dir.path().join("src/main.rs");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        let resolved = guard.validate_path("src/main.rs").unwrap();
        assert_eq!(guard.relative(&resolved), PathBuf::from("src/main.rs"));
    }

    #[test]
    fn test_validate_file_not_yet_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let resolved = guard.validate_path("new/dir/file.py").unwrap();
        assert!(resolved.starts_with(guard.workspace_root()));
        assert_eq!(guard.relative(&resolved), PathBuf::from("new/dir/file.py"));
    }

    #[test]
    fn test_parent_dir_escape_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();
        let guard = WorkspaceGuard::new(&workspace).unwrap();

        let result = guard.validate_path("../outside.py");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));

        let result = guard.validate_path("missing/../../outside.py");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }

    #[test]
    fn test_git_dir_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let result = guard.validate_path(".git/config");
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_custom_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        let vendor = workspace.canonicalize().unwrap().join("vendor");
        fs::create_dir_all(&vendor).unwrap();

        let guard = WorkspaceGuard::with_forbidden(workspace, vec![vendor]).unwrap();
        let result = guard.validate_path("vendor/lib.rs");
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_empty_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();
        assert!(matches!(guard.validate_path(""), Err(SafetyError::EmptyPath)));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();

        let outside = temp_dir.path().join("outside.rs");
        fs::write(&outside, b"").unwrap();
        symlink(&outside, workspace.join("escape.rs")).unwrap();

        let guard = WorkspaceGuard::new(&workspace).unwrap();
        let result = guard.validate_path("escape.rs");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }
}
