//! Persistence for the OAuth session token.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{PortfolioError, Result};
use crate::fs::FileSystem;

use super::AccessToken;

/// Where a signed-in session survives restarts.
pub trait TokenCache: Send + Sync {
    /// The cached token, if any. Unreadable caches count as empty.
    fn load(&self) -> Option<AccessToken>;

    fn store(&self, token: &AccessToken) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Process-local cache. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenCache {
    slot: Arc<Mutex<Option<AccessToken>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AccessToken) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token))),
        }
    }
}

impl TokenCache for MemoryTokenCache {
    fn load(&self) -> Option<AccessToken> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn store(&self, token: &AccessToken) -> Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(token.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

/// JSON file cache, by default `~/.config/portfolio/google-token.json`.
pub struct FileTokenCache<FS: FileSystem> {
    fs: FS,
    path: PathBuf,
}

impl<FS: FileSystem> FileTokenCache<FS> {
    pub fn new(fs: FS, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    /// Cache file in the user's config directory.
    pub fn in_config_dir(fs: FS) -> Result<Self> {
        let path = dirs::config_dir()
            .ok_or(PortfolioError::NoConfigDir)?
            .join("portfolio")
            .join("google-token.json");
        Ok(Self::new(fs, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<FS: FileSystem> TokenCache for FileTokenCache<FS> {
    fn load(&self) -> Option<AccessToken> {
        let text = self.fs.read_to_string(&self.path).ok()?;
        match serde_json::from_str(&text) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("Ignoring unreadable token cache {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn store(&self, token: &AccessToken) -> Result<()> {
        let text = serde_json::to_string(token)?;
        self.fs
            .write_file(&self.path, &text)
            .map_err(|source| PortfolioError::FileWrite {
                path: self.path.clone(),
                source,
            })
    }

    fn clear(&self) -> Result<()> {
        if !self.fs.exists(&self.path) {
            return Ok(());
        }
        self.fs.delete_file(&self.path)?;
        Ok(())
    }
}
