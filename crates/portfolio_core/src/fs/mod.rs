//! Filesystem abstraction module.
//!
//! This module provides the `FileSystem` trait used by the file-handle store,
//! config loading and export, allowing the real filesystem to be swapped for
//! an in-memory one in tests.

mod memory;
mod native;

pub use memory::InMemoryFileSystem;
pub use native::RealFileSystem;

use std::future::Future;
use std::io::Result;
use std::path::Path;
use std::pin::Pin;

/// A boxed future for object-safe async methods.
///
/// Futures are `Send` for compatibility with multi-threaded runtimes.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstraction over filesystem operations
/// Send + Sync required for multi-threaded environments
pub trait FileSystem: Send + Sync {
    /// Reads the whole file as a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Overwrites the file's entire contents, creating it if needed
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Deletes a file
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Checks if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Whether the file exists but cannot be written
    fn is_read_only(&self, _path: &Path) -> bool {
        false
    }

    /// Get file modification time as milliseconds since Unix epoch.
    ///
    /// Returns `None` if the file doesn't exist or the modification time
    /// cannot be determined.
    fn get_modified_time(&self, _path: &Path) -> Option<i64> {
        None
    }
}

// Blanket implementation for references to FileSystem
impl<T: FileSystem> FileSystem for &T {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        (*self).read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        (*self).write_file(path, content)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        (*self).delete_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (*self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (*self).create_dir_all(path)
    }

    fn is_read_only(&self, path: &Path) -> bool {
        (*self).is_read_only(path)
    }

    fn get_modified_time(&self, path: &Path) -> Option<i64> {
        (*self).get_modified_time(path)
    }
}
