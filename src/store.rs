//! File access behind a trait, so batches can run against disk or in memory.

use crate::safety::{SafetyError, WorkspaceGuard};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Text storage addressed by workspace-relative paths.
pub trait FileStore: Send {
    /// The canonical key for `path`. Every spelling of one file maps to the
    /// same key. The default folds `.` and `..` lexically.
    fn resolve(&self, path: &Path) -> Result<PathBuf, StoreError> {
        Ok(fold_dots(path))
    }

    fn read(&self, path: &Path) -> Result<String, StoreError>;

    fn write(&mut self, path: &Path, text: &str) -> Result<(), StoreError>;

    fn exists(&self, path: &Path) -> bool;
}

/// The real workspace on disk, with every path checked by a [`WorkspaceGuard`].
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    guard: WorkspaceGuard,
}

impl WorkspaceStore {
    pub fn new(guard: WorkspaceGuard) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &WorkspaceGuard {
        &self.guard
    }
}

impl FileStore for WorkspaceStore {
    /// Workspace-relative form of the canonical path.
    fn resolve(&self, path: &Path) -> Result<PathBuf, StoreError> {
        let resolved = self.guard.validate_path(path)?;
        Ok(self.guard.relative(&resolved))
    }

    fn read(&self, path: &Path) -> Result<String, StoreError> {
        let resolved = self.guard.validate_path(path)?;
        let bytes = fs::read(&resolved).map_err(|e| StoreError::io(path, e))?;
        String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8(path.to_path_buf()))
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), StoreError> {
        let resolved = self.guard.validate_path(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(path, e))?;
        }

        atomic_write(&resolved, text.as_bytes()).map_err(|e| StoreError::io(path, e))?;

        // Bump mtime so incremental builds notice the change
        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&resolved, now).map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.guard
            .validate_path(path)
            .map(|resolved| resolved.is_file())
            .unwrap_or(false)
    }
}

/// Buffers writes in memory on top of another store.
#[derive(Debug)]
pub struct DryRunStore<S> {
    inner: S,
    overlay: HashMap<PathBuf, String>,
}

impl<S: FileStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            overlay: HashMap::new(),
        }
    }

    /// Text that would have been written to `path`, if any.
    pub fn pending(&self, path: &Path) -> Option<&str> {
        self.overlay.get(path).map(String::as_str)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: FileStore> FileStore for DryRunStore<S> {
    fn resolve(&self, path: &Path) -> Result<PathBuf, StoreError> {
        self.inner.resolve(path)
    }

    fn read(&self, path: &Path) -> Result<String, StoreError> {
        match self.overlay.get(path) {
            Some(text) => Ok(text.clone()),
            None => self.inner.read(path),
        }
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), StoreError> {
        self.overlay.insert(path.to_path_buf(), text.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.overlay.contains_key(path) || self.inner.exists(path)
    }
}

fn fold_dots(path: &Path) -> PathBuf {
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

/// Tempfile in the same directory, fsync, then rename over the target.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> WorkspaceStore {
        WorkspaceStore::new(WorkspaceGuard::new(dir).unwrap())
    }

    #[test]
    fn test_write_creates_parents_and_reads_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = store(temp_dir.path());

        store.write(Path::new("a/b/c.txt"), "hello\n").unwrap();
        assert!(store.exists(Path::new("a/b/c.txt")));
        assert_eq!(store.read(Path::new("a/b/c.txt")).unwrap(), "hello\n");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let result = store.read(Path::new("nope.rs"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_read_non_utf8() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("bin.dat"), [0xff, 0xfe, 0x00]).unwrap();
        let store = store(temp_dir.path());
        let result = store.read(Path::new("bin.dat"));
        assert!(matches!(result, Err(StoreError::NotUtf8(_))));
    }

    #[test]
    fn test_escape_is_safety_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("ws");
        fs::create_dir_all(&workspace).unwrap();
        let mut store = store(&workspace);

        let result = store.write(Path::new("../evil.txt"), "x");
        assert!(matches!(result, Err(StoreError::Safety(_))));
        assert!(!temp_dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_dry_run_leaves_disk_untouched() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("f.txt"), "old\n").unwrap();
        let mut dry = DryRunStore::new(store(temp_dir.path()));

        dry.write(Path::new("f.txt"), "new\n").unwrap();
        dry.write(Path::new("g.txt"), "created\n").unwrap();

        assert_eq!(dry.read(Path::new("f.txt")).unwrap(), "new\n");
        assert!(dry.exists(Path::new("g.txt")));
        assert_eq!(dry.pending(Path::new("g.txt")), Some("created\n"));
        assert_eq!(fs::read_to_string(temp_dir.path().join("f.txt")).unwrap(), "old\n");
        assert!(!temp_dir.path().join("g.txt").exists());
    }

    #[test]
    fn test_resolve_maps_spellings_to_one_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.py"), "x\n").unwrap();
        let store = store(temp_dir.path());
        let absolute = temp_dir.path().join("a.py");

        for spelling in [Path::new("a.py"), Path::new("./a.py"), Path::new("sub/../a.py"), absolute.as_path()] {
            assert_eq!(store.resolve(spelling).unwrap(), PathBuf::from("a.py"), "{spelling:?}");
        }
        assert_eq!(store.resolve(Path::new("new/b.py")).unwrap(), PathBuf::from("new/b.py"));
        assert!(matches!(store.resolve(Path::new("../x.py")), Err(StoreError::Safety(_))));
    }
}
