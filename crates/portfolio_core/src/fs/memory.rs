//! In-memory filesystem, used by tests and by sessions that never touch disk.

use std::collections::{HashMap, HashSet};
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::FileSystem;

#[derive(Default)]
struct MemoryState {
    files: HashMap<PathBuf, (String, i64)>,
    read_only: HashSet<PathBuf>,
}

/// A filesystem held in memory.
///
/// Clones share the same storage. Modification times come from a logical
/// clock that advances by one second per write, and can be overridden with
/// [`InMemoryFileSystem::set_modified_time`] to simulate outside edits.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<AtomicI64>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1000, Ordering::SeqCst) + 1000
    }

    /// Add a file (builder pattern).
    pub fn with_file(self, path: impl AsRef<Path>, content: &str) -> Self {
        let mtime = self.tick();
        self.lock()
            .files
            .insert(path.as_ref().to_path_buf(), (content.to_string(), mtime));
        self
    }

    /// Overwrite a file's modification time without touching its content.
    pub fn set_modified_time(&self, path: impl AsRef<Path>, millis: i64) {
        if let Some(file) = self.lock().files.get_mut(path.as_ref()) {
            file.1 = millis;
        }
    }

    pub fn set_read_only(&self, path: impl AsRef<Path>, read_only: bool) {
        let mut state = self.lock();
        if read_only {
            state.read_only.insert(path.as_ref().to_path_buf());
        } else {
            state.read_only.remove(path.as_ref());
        }
    }

    /// Get the content of a file (for test assertions).
    pub fn get_content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock().files.get(path.as_ref()).map(|(c, _)| c.clone())
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.lock()
            .files
            .get(path)
            .map(|(c, _)| c.clone())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mtime = self.tick();
        let mut state = self.lock();
        if state.read_only.contains(path) {
            return Err(Error::new(
                ErrorKind::PermissionDenied,
                format!("File is read-only: {:?}", path),
            ));
        }
        state
            .files
            .insert(path.to_path_buf(), (content.to_string(), mtime));
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        // Directories are implicit
        Ok(())
    }

    fn is_read_only(&self, path: &Path) -> bool {
        self.lock().read_only.contains(path)
    }

    fn get_modified_time(&self, path: &Path) -> Option<i64> {
        self.lock().files.get(path).map(|(_, m)| *m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_advance_mtime() {
        let fs = InMemoryFileSystem::new();
        let path = Path::new("/p.json");
        fs.write_file(path, "a").unwrap();
        let first = fs.get_modified_time(path).unwrap();
        fs.write_file(path, "b").unwrap();
        let second = fs.get_modified_time(path).unwrap();
        assert!(second > first);
        assert_eq!(fs.get_content(path).as_deref(), Some("b"));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let fs = InMemoryFileSystem::new().with_file("/p.json", "{}");
        fs.set_read_only("/p.json", true);
        let err = fs.write_file(Path::new("/p.json"), "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(fs.get_content("/p.json").as_deref(), Some("{}"));
    }

    #[test]
    fn test_clones_share_storage() {
        let fs = InMemoryFileSystem::new();
        let other = fs.clone();
        fs.write_file(Path::new("/shared"), "x").unwrap();
        assert!(other.exists(Path::new("/shared")));
    }
}
