//! Debounced save orchestration.
//!
//! The orchestrator owns the live document snapshot and decides when to hand
//! it to a [`PortfolioStore`]. It is a plain state machine driven from the
//! outside:
//!
//! ```text
//!             record_edit              tick (due)          ok
//!   Idle ──────────────────► Pending ─────────────► Saving ──► Saved ──(2s)──► Idle
//!     ▲                        │ ▲ record_edit         │ err
//!     │                        └─┘ (debounce reset)    ▼
//!     └──────── save_now / record_edit supersede ───── Error
//! ```
//!
//! Drivers call [`SaveOrchestrator::tick`] whenever
//! [`SaveOrchestrator::next_deadline`] passes. Methods that save take
//! `&mut self`, so there is never more than one save in flight. A revision
//! counter tracks whether the live snapshot differs from the last one that
//! reached the store.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::{PortfolioError, Result};
use crate::model::PortfolioDocument;
use crate::store::{ExternalChange, PortfolioStore};

pub const MIN_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(1000);

/// How long "Saved" stays visible before the indicator returns to idle.
pub const SAVED_DISPLAY: Duration = Duration::from_secs(2);

pub fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_AUTOSAVE_INTERVAL, MAX_AUTOSAVE_INTERVAL)
}

// ============================================================================
// Clock
// ============================================================================

/// Time source for debounce deadlines and entry timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn utc_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    start_utc: DateTime<Utc>,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new(start_utc: DateTime<Utc>) -> Self {
        Self {
            start: Instant::now(),
            start_utc,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += by;
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or_default();
        self.start_utc + elapsed
    }
}

// ============================================================================
// Status
// ============================================================================

/// Category of a failed save, for choosing what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExceeded,
    Permission,
    NotSignedIn,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&PortfolioError> for SaveFailure {
    fn from(err: &PortfolioError) -> Self {
        let (kind, message) = match err {
            PortfolioError::QuotaExceeded => (
                FailureKind::QuotaExceeded,
                "Storage is full. Export a backup, then remove old entries.".to_string(),
            ),
            PortfolioError::PermissionDenied(path) => (
                FailureKind::Permission,
                format!(
                    "Permission to write {} was revoked. Choose the file again.",
                    path.display()
                ),
            ),
            PortfolioError::NoFile => (
                FailureKind::Permission,
                "No file is open. Choose a file to save to.".to_string(),
            ),
            PortfolioError::NotSignedIn | PortfolioError::NotReady => (
                FailureKind::NotSignedIn,
                "Not signed in. Sign in again to keep syncing.".to_string(),
            ),
            other => (FailureKind::Generic, format!("Save failed: {other}")),
        };
        Self { kind, message }
    }
}

impl fmt::Display for SaveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What the save indicator shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    /// An autosave fires at `due` unless another edit pushes it back
    PendingAutosave { due: Instant },
    Saving,
    /// Last save succeeded; shown until `until`
    Saved { until: Instant },
    /// Last save failed; the document and pending flag are kept
    Error(SaveFailure),
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Idle => f.write_str("Idle"),
            SaveStatus::PendingAutosave { .. } => f.write_str("Unsaved changes"),
            SaveStatus::Saving => f.write_str("Saving..."),
            SaveStatus::Saved { .. } => f.write_str("Saved"),
            SaveStatus::Error(failure) => write!(f, "Error: {failure}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveSettings {
    pub enabled: bool,
    pub interval: Duration,
}

impl AutosaveSettings {
    /// Build settings with the interval clamped to the supported range.
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval: clamp_interval(interval),
        }
    }
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self::new(true, DEFAULT_AUTOSAVE_INTERVAL)
    }
}

/// How to settle an external modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Discard in-session edits and load what is on disk
    Reload,
    /// Write the in-session document over the external change
    Overwrite,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct SaveOrchestrator<S: PortfolioStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    settings: AutosaveSettings,
    document: Arc<PortfolioDocument>,
    persisted: Option<Arc<PortfolioDocument>>,
    revision: u64,
    persisted_revision: u64,
    status: SaveStatus,
    conflict: Option<ExternalChange>,
}

impl<S: PortfolioStore> SaveOrchestrator<S, SystemClock> {
    pub fn new(store: S, settings: AutosaveSettings) -> Self {
        Self::with_clock(store, SystemClock, settings)
    }
}

impl<S: PortfolioStore, C: Clock> SaveOrchestrator<S, C> {
    pub fn with_clock(store: S, clock: C, settings: AutosaveSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            document: Arc::new(PortfolioDocument::default()),
            persisted: None,
            revision: 0,
            persisted_revision: 0,
            status: SaveStatus::Idle,
            conflict: None,
        }
    }

    pub fn document(&self) -> &Arc<PortfolioDocument> {
        &self.document
    }

    /// The snapshot the store last accepted (or loaded).
    pub fn persisted(&self) -> Option<&Arc<PortfolioDocument>> {
        self.persisted.as_ref()
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn settings(&self) -> AutosaveSettings {
        self.settings
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn has_pending_changes(&self) -> bool {
        self.revision != self.persisted_revision
    }

    /// Unresolved external modification, if any.
    pub fn conflict(&self) -> Option<&ExternalChange> {
        self.conflict.as_ref()
    }

    /// Instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.status {
            SaveStatus::PendingAutosave { due } => Some(due),
            SaveStatus::Saved { until } => Some(until),
            _ => None,
        }
    }

    fn autosave_allowed(&self) -> bool {
        self.settings.enabled && self.conflict.is_none()
    }

    fn schedule(&mut self) {
        let due = self.clock.now() + self.settings.interval;
        log::debug!("Autosave scheduled in {:?}", self.settings.interval);
        self.status = SaveStatus::PendingAutosave { due };
    }

    /// Install an edited snapshot.
    ///
    /// Restarts the debounce window when autosave is on. Any previous error
    /// is superseded.
    pub fn record_edit(&mut self, doc: PortfolioDocument) {
        self.document = Arc::new(doc);
        self.revision += 1;
        if self.autosave_allowed() {
            self.schedule();
        } else {
            self.status = SaveStatus::Idle;
        }
    }

    /// Install an imported document. It is saved like any other edit.
    pub fn replace_document(&mut self, doc: PortfolioDocument) {
        log::info!("Replacing document ({} entries)", doc.entry_count());
        self.record_edit(doc);
    }

    fn install_baseline(&mut self, doc: PortfolioDocument) {
        let doc = Arc::new(doc);
        self.revision += 1;
        self.persisted_revision = self.revision;
        self.persisted = Some(Arc::clone(&doc));
        self.document = doc;
        self.status = SaveStatus::Idle;
    }

    /// Load the stored document and adopt it as the persisted baseline.
    ///
    /// Returns `false` when the store is empty, leaving the current document.
    pub async fn load_from_store(&mut self) -> Result<bool> {
        match self.store.load().await? {
            Some(doc) => {
                log::info!(
                    "Loaded {} topics from {}",
                    doc.topics.len(),
                    self.store.name()
                );
                self.install_baseline(doc);
                self.conflict = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn persist(&mut self) -> Result<()> {
        let snapshot = Arc::clone(&self.document);
        let revision = self.revision;
        self.status = SaveStatus::Saving;

        match self.store.save(&snapshot).await {
            Ok(()) => {
                self.persisted_revision = revision;
                self.persisted = Some(snapshot);
                if self.has_pending_changes() && self.autosave_allowed() {
                    self.schedule();
                } else {
                    self.status = SaveStatus::Saved {
                        until: self.clock.now() + SAVED_DISPLAY,
                    };
                }
                Ok(())
            }
            Err(err) => {
                log::error!("Save to {} failed: {}", self.store.name(), err);
                self.status = SaveStatus::Error(SaveFailure::from(&err));
                Err(err)
            }
        }
    }

    /// Advance timers. Returns `true` if an autosave was attempted.
    pub async fn tick(&mut self) -> Result<bool> {
        let now = self.clock.now();
        match self.status {
            SaveStatus::PendingAutosave { due } if now >= due => {
                self.persist().await?;
                Ok(true)
            }
            SaveStatus::Saved { until } if now >= until => {
                self.status = SaveStatus::Idle;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Save immediately, bypassing the debounce.
    ///
    /// Returns `false` without touching the store when nothing is pending.
    /// Refuses with [`PortfolioError::ExternalModification`] while a conflict
    /// is unresolved.
    pub async fn save_now(&mut self) -> Result<bool> {
        if self.conflict.is_some() {
            return Err(PortfolioError::ExternalModification);
        }
        if !self.has_pending_changes() {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    /// Check for external modification when the user comes back.
    ///
    /// Only checks while nothing is pending or in flight. A detected change
    /// pauses autosave until [`resolve_conflict`](Self::resolve_conflict).
    pub async fn on_focus(&mut self) -> Result<ExternalChange> {
        if let Some(conflict) = &self.conflict {
            return Ok(conflict.clone());
        }
        if !matches!(
            self.status,
            SaveStatus::Idle | SaveStatus::Saved { .. } | SaveStatus::Error(_)
        ) {
            return Ok(ExternalChange::Unchanged);
        }

        let change = self.store.check_external_change().await?;
        if change.is_modified() {
            log::warn!("External change detected; autosave paused");
            self.conflict = Some(change.clone());
        }
        Ok(change)
    }

    pub async fn resolve_conflict(&mut self, resolution: ConflictResolution) -> Result<()> {
        if self.conflict.is_none() {
            return Ok(());
        }

        match resolution {
            ConflictResolution::Reload => {
                if !self.load_from_store().await? {
                    // Backing file is gone; keep the session copy as pending
                    self.store.acknowledge_external_change();
                    self.conflict = None;
                    self.revision += 1;
                    if self.autosave_allowed() {
                        self.schedule();
                    }
                }
                log::info!("Conflict resolved by reloading");
            }
            ConflictResolution::Overwrite => {
                self.store.acknowledge_external_change();
                self.conflict = None;
                self.persist().await?;
                log::info!("Conflict resolved by overwriting");
            }
        }
        Ok(())
    }

    pub fn set_autosave(&mut self, enabled: bool) {
        if self.settings.enabled == enabled {
            return;
        }
        self.settings.enabled = enabled;
        match self.status {
            SaveStatus::PendingAutosave { .. } if !enabled => {
                log::debug!("Autosave disabled; pending timer cancelled");
                self.status = SaveStatus::Idle;
            }
            SaveStatus::Idle | SaveStatus::Saved { .. }
                if self.has_pending_changes() && self.autosave_allowed() =>
            {
                self.schedule();
            }
            _ => {}
        }
    }

    /// Change the debounce interval (clamped). A pending timer restarts with
    /// the new interval.
    pub fn set_interval(&mut self, interval: Duration) {
        self.settings.interval = clamp_interval(interval);
        if matches!(self.status, SaveStatus::PendingAutosave { .. }) {
            self.schedule();
        }
    }
}
