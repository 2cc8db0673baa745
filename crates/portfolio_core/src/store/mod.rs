//! Persistence adapters for the portfolio document.
//!
//! Every backend implements [`PortfolioStore`]. The save orchestrator only
//! talks to this trait, so switching between the in-memory store, a
//! user-granted file, the embedded key-value store or the cloud adapter does
//! not change the state machine.
//!
//! Storage failures are returned as tagged [`PortfolioError`] values
//! (quota, permission, unavailable, ...) rather than raised further.
//!
//! [`PortfolioError`]: crate::error::PortfolioError

mod file_handle;
mod kv;
mod memory;

pub use file_handle::{
    FileHandle, FileHandleStore, HandlePermissions, MTIME_TOLERANCE_MS, NativePermissions,
    PermissionMode, PermissionState,
};
pub use kv::{KvStore, STORE_KEY};
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::Result;
use crate::fs::BoxFuture;
use crate::model::PortfolioDocument;

/// Outcome of an external-modification check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalChange {
    /// The backing file is as this session last left it
    Unchanged,
    /// Someone else wrote (or removed) the backing file
    Modified {
        path: PathBuf,
        /// Modification time this store last wrote or read
        expected_ms: i64,
        /// Current modification time, `None` if the file is gone
        actual_ms: Option<i64>,
    },
}

impl ExternalChange {
    pub fn is_modified(&self) -> bool {
        matches!(self, ExternalChange::Modified { .. })
    }
}

/// A backend able to persist and restore the whole document.
pub trait PortfolioStore: Send {
    /// Human-readable backend name (e.g., "Local file", "Google Drive")
    fn name(&self) -> &str;

    /// Persist the whole document, replacing whatever was stored.
    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>>;

    /// Load the stored document, normalized to the current schema.
    ///
    /// Returns `None` when nothing has been stored yet.
    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>>;

    /// Check whether the backing storage changed outside this session.
    fn check_external_change(&mut self) -> BoxFuture<'_, Result<ExternalChange>> {
        Box::pin(async { Ok(ExternalChange::Unchanged) })
    }

    /// Adopt the current backing state as the new baseline without reloading.
    fn acknowledge_external_change(&mut self) {}
}

impl<T: PortfolioStore + ?Sized> PortfolioStore for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        (**self).save(doc)
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        (**self).load()
    }

    fn check_external_change(&mut self) -> BoxFuture<'_, Result<ExternalChange>> {
        (**self).check_external_change()
    }

    fn acknowledge_external_change(&mut self) {
        (**self).acknowledge_external_change()
    }
}

/// Serialize a document the way every backend stores it (pretty-printed JSON).
pub fn encode_document(doc: &PortfolioDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}
