//! Persistence to a single user-chosen file.
//!
//! The store holds a [`FileHandle`] the user granted. Before every access it
//! re-validates permission on the handle, re-requesting it if it was revoked;
//! a denied re-request discards the handle. It also remembers the file's
//! modification time after each of its own reads and writes so that
//! [`FileHandleStore::check_external_change`] can spot edits made elsewhere.

use std::future::ready;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{PortfolioError, Result};
use crate::fs::{BoxFuture, FileSystem};
use crate::migrate::parse_document;
use crate::model::PortfolioDocument;

use super::{ExternalChange, PortfolioStore, encode_document};

/// Modification-time differences up to this many milliseconds are ignored.
pub const MTIME_TOLERANCE_MS: i64 = 1000;

/// A file the user granted access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    /// Not granted right now, but asking may succeed
    Prompt,
    Denied,
}

/// Permission checks on a file handle.
pub trait HandlePermissions: Send + Sync {
    /// Current permission, without asking the user.
    fn query(&self, fs: &dyn FileSystem, path: &Path, mode: PermissionMode) -> PermissionState;

    /// Ask for permission again.
    fn request(&self, fs: &dyn FileSystem, path: &Path, mode: PermissionMode) -> PermissionState;
}

/// Permissions as the operating system reports them.
///
/// Read-only files need a prompt for write access, and the request is then
/// denied because nothing can grant it from here.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePermissions;

impl HandlePermissions for NativePermissions {
    fn query(&self, fs: &dyn FileSystem, path: &Path, mode: PermissionMode) -> PermissionState {
        match mode {
            PermissionMode::Read => PermissionState::Granted,
            PermissionMode::ReadWrite if fs.is_read_only(path) => PermissionState::Prompt,
            PermissionMode::ReadWrite => PermissionState::Granted,
        }
    }

    fn request(&self, fs: &dyn FileSystem, path: &Path, mode: PermissionMode) -> PermissionState {
        match self.query(fs, path, mode) {
            PermissionState::Granted => PermissionState::Granted,
            PermissionState::Prompt | PermissionState::Denied => PermissionState::Denied,
        }
    }
}

/// Store backed by one file on a [`FileSystem`].
pub struct FileHandleStore<FS: FileSystem, P: HandlePermissions = NativePermissions> {
    fs: FS,
    permissions: P,
    handle: Option<FileHandle>,
    /// Modification time after this store's last read or write
    last_known_mtime: Option<i64>,
}

impl<FS: FileSystem> FileHandleStore<FS, NativePermissions> {
    pub fn new(fs: FS) -> Self {
        Self::with_permissions(fs, NativePermissions)
    }
}

impl<FS: FileSystem, P: HandlePermissions> FileHandleStore<FS, P> {
    pub fn with_permissions(fs: FS, permissions: P) -> Self {
        Self {
            fs,
            permissions,
            handle: None,
            last_known_mtime: None,
        }
    }

    /// Builder variant of [`FileHandleStore::open_handle`].
    pub fn with_handle(mut self, path: impl Into<PathBuf>) -> Self {
        self.open_handle(path);
        self
    }

    /// Point the store at a new file. The modification baseline is reset.
    pub fn open_handle(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::info!("Using portfolio file {}", path.display());
        self.handle = Some(FileHandle { path });
        self.last_known_mtime = None;
    }

    pub fn forget_handle(&mut self) {
        self.handle = None;
        self.last_known_mtime = None;
    }

    pub fn handle(&self) -> Option<&FileHandle> {
        self.handle.as_ref()
    }

    pub fn fs(&self) -> &FS {
        &self.fs
    }

    /// Make sure the handle still carries `mode` permission, re-requesting it once.
    fn ensure_permission(&mut self, mode: PermissionMode) -> Result<PathBuf> {
        let path = match &self.handle {
            Some(handle) => handle.path.clone(),
            None => return Err(PortfolioError::NoFile),
        };

        if self.permissions.query(&self.fs, &path, mode) == PermissionState::Granted {
            return Ok(path);
        }

        match self.permissions.request(&self.fs, &path, mode) {
            PermissionState::Granted => Ok(path),
            PermissionState::Prompt | PermissionState::Denied => {
                log::warn!(
                    "Permission for {} was denied; discarding file handle",
                    path.display()
                );
                self.forget_handle();
                Err(PortfolioError::PermissionDenied(path))
            }
        }
    }

    fn save_document(&mut self, doc: &PortfolioDocument) -> Result<()> {
        let path = self.ensure_permission(PermissionMode::ReadWrite)?;
        let text = encode_document(doc)?;

        if let Err(source) = self.fs.write_file(&path, &text) {
            if source.kind() == ErrorKind::PermissionDenied {
                log::warn!("Write to {} was refused; discarding file handle", path.display());
                self.forget_handle();
                return Err(PortfolioError::PermissionDenied(path));
            }
            return Err(PortfolioError::FileWrite { path, source });
        }

        self.last_known_mtime = self.fs.get_modified_time(&path);
        log::info!("Saved portfolio to {} ({} bytes)", path.display(), text.len());
        Ok(())
    }

    fn load_document(&mut self) -> Result<Option<PortfolioDocument>> {
        if self.handle.is_none() {
            return Ok(None);
        }
        let path = self.ensure_permission(PermissionMode::Read)?;
        if !self.fs.exists(&path) {
            return Ok(None);
        }

        let text = self
            .fs
            .read_to_string(&path)
            .map_err(|source| PortfolioError::FileRead {
                path: path.clone(),
                source,
            })?;
        let doc = parse_document(&text)?;
        self.last_known_mtime = self.fs.get_modified_time(&path);
        log::info!("Loaded portfolio from {}", path.display());
        Ok(Some(doc))
    }

    /// Compare the file's modification time with the one this store last saw.
    pub fn detect_external_change(&self) -> ExternalChange {
        let (Some(handle), Some(expected_ms)) = (&self.handle, self.last_known_mtime) else {
            return ExternalChange::Unchanged;
        };

        let actual_ms = self.fs.get_modified_time(&handle.path);
        match actual_ms {
            Some(actual) if (actual - expected_ms).abs() <= MTIME_TOLERANCE_MS => {
                ExternalChange::Unchanged
            }
            _ => {
                log::warn!(
                    "{} changed outside this session (expected mtime {}, found {:?})",
                    handle.path.display(),
                    expected_ms,
                    actual_ms
                );
                ExternalChange::Modified {
                    path: handle.path.clone(),
                    expected_ms,
                    actual_ms,
                }
            }
        }
    }
}

impl<FS: FileSystem, P: HandlePermissions> PortfolioStore for FileHandleStore<FS, P> {
    fn name(&self) -> &str {
        "Local file"
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        Box::pin(ready(self.save_document(doc)))
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        Box::pin(ready(self.load_document()))
    }

    fn check_external_change(&mut self) -> BoxFuture<'_, Result<ExternalChange>> {
        Box::pin(ready(Ok(self.detect_external_change())))
    }

    fn acknowledge_external_change(&mut self) {
        if let Some(handle) = &self.handle {
            self.last_known_mtime = self.fs.get_modified_time(&handle.path);
        }
    }
}
