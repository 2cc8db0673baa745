//! Native filesystem implementation.

use std::fs;
use std::io::Result;
use std::path::Path;

use super::FileSystem;

#[derive(Clone, Copy, Debug, Default)]
/// This is a simple filesystem implementation that simply maps to std::fs methods
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
    }

    fn is_read_only(&self, path: &Path) -> bool {
        fs::metadata(path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(false)
    }

    fn get_modified_time(&self, path: &Path) -> Option<i64> {
        fs::metadata(path)
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| {
                t.duration_since(std::time::UNIX_EPOCH)
                    .ok()
                    .map(|d| d.as_millis() as i64)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parent_and_reports_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/portfolio-data.json");

        RealFileSystem.write_file(&path, "{}").unwrap();

        assert!(RealFileSystem.exists(&path));
        assert_eq!(RealFileSystem.read_to_string(&path).unwrap(), "{}");
        assert!(RealFileSystem.get_modified_time(&path).is_some());
        assert!(!RealFileSystem.is_read_only(&path));
    }

    #[test]
    fn test_missing_file_has_no_mtime() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RealFileSystem.get_modified_time(&dir.path().join("absent")), None);
    }
}
