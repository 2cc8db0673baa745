//! Application-level editing session.
//!
//! [`Session`] ties the pure CRUD functions to a [`SaveOrchestrator`] and
//! keeps track of which entry is active. Every change produces a new snapshot
//! that goes through [`SaveOrchestrator::record_edit`], so autosave sees all of
//! them. Destructive operations ask a [`ConfirmDelete`] collaborator first.

use crate::crud::{self, EntryPatch};
use crate::error::{PortfolioError, Result};
use crate::exchange;
use crate::model::{
    DEFAULT_ENTRY_TITLE, Entry, EntryId, IdGenerator, PortfolioDocument, TopicId, UuidGenerator,
};
use crate::save::{Clock, ConflictResolution, SaveOrchestrator, SaveStatus, SystemClock};
use crate::store::{ExternalChange, PortfolioStore};

/// What is about to be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequest<'a> {
    Topic {
        id: &'a str,
        name: &'a str,
        /// Entries that go with it
        entry_count: usize,
    },
    Entry {
        id: &'a str,
        title: &'a str,
    },
}

/// Asks the user to confirm a deletion.
pub trait ConfirmDelete: Send + Sync {
    fn confirm(&self, request: &DeleteRequest<'_>) -> bool;
}

/// Confirms everything (non-interactive use).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl ConfirmDelete for AlwaysConfirm {
    fn confirm(&self, _request: &DeleteRequest<'_>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

pub struct Session<S: PortfolioStore, C: Clock = SystemClock> {
    orchestrator: SaveOrchestrator<S, C>,
    active_entry_id: Option<EntryId>,
    ids: Box<dyn IdGenerator>,
    confirm: Box<dyn ConfirmDelete>,
}

impl<S: PortfolioStore, C: Clock> Session<S, C> {
    pub fn new(orchestrator: SaveOrchestrator<S, C>, confirm: Box<dyn ConfirmDelete>) -> Self {
        Self {
            orchestrator,
            active_entry_id: None,
            ids: Box::new(UuidGenerator),
            confirm,
        }
    }

    /// Use a different id source.
    pub fn with_ids(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn document(&self) -> &PortfolioDocument {
        self.orchestrator.document()
    }

    pub fn active_entry_id(&self) -> Option<&str> {
        self.active_entry_id.as_deref()
    }

    pub fn active_entry(&self) -> Option<&Entry> {
        self.active_entry_id
            .as_deref()
            .and_then(|id| self.document().find_entry(id))
    }

    pub fn status(&self) -> &SaveStatus {
        self.orchestrator.status()
    }

    pub fn orchestrator(&self) -> &SaveOrchestrator<S, C> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut SaveOrchestrator<S, C> {
        &mut self.orchestrator
    }

    fn commit(&mut self, doc: PortfolioDocument) {
        self.orchestrator.record_edit(doc);
    }

    /// Load from the store, or start a new project when it is empty.
    ///
    /// `remembered` is the last active entry; it is replaced by the first
    /// entry if it no longer exists. Returns `false` when the store was empty
    /// and the new project exists only in memory until the next save.
    pub async fn open(&mut self, remembered: Option<&str>) -> Result<bool> {
        if self.orchestrator.load_from_store().await? {
            self.active_entry_id = crud::resolve_active(self.document(), remembered);
            Ok(true)
        } else {
            log::info!(
                "{} is empty; starting a new project",
                self.orchestrator.store().name()
            );
            self.new_project();
            Ok(false)
        }
    }

    /// Replace everything with one default topic holding one empty entry.
    pub fn new_project(&mut self) {
        let now = self.orchestrator.clock().utc_now();
        let doc = PortfolioDocument::new_project(self.ids.as_ref(), now);
        self.active_entry_id = doc.first_entry_id().map(str::to_string);
        self.orchestrator.replace_document(doc);
    }

    pub fn select_entry(&mut self, entry_id: &str) -> Result<()> {
        if !self.document().contains_entry(entry_id) {
            return Err(PortfolioError::EntryNotFound(entry_id.to_string()));
        }
        self.active_entry_id = Some(entry_id.to_string());
        Ok(())
    }

    pub fn create_topic(&mut self, name: &str) -> Result<TopicId> {
        let now = self.orchestrator.clock().utc_now();
        let (doc, id) = crud::create_topic(self.document(), name, self.ids.as_ref(), now)?;
        self.commit(doc);
        Ok(id)
    }

    pub fn rename_topic(&mut self, topic_id: &str, name: &str) -> Result<()> {
        let doc = crud::rename_topic(self.document(), topic_id, name)?;
        self.commit(doc);
        Ok(())
    }

    /// Delete a topic and its entries after confirmation.
    pub fn delete_topic(&mut self, topic_id: &str) -> Result<DeleteOutcome> {
        let topic = self
            .document()
            .find_topic(topic_id)
            .ok_or_else(|| PortfolioError::TopicNotFound(topic_id.to_string()))?;
        let request = DeleteRequest::Topic {
            id: &topic.id,
            name: &topic.name,
            entry_count: topic.entries.len(),
        };
        if !self.confirm.confirm(&request) {
            return Ok(DeleteOutcome::Cancelled);
        }

        let active_removed = self
            .active_entry_id
            .as_deref()
            .is_some_and(|id| topic.entries.iter().any(|e| e.id == id));
        let doc = crud::delete_topic(self.document(), topic_id)?;
        if active_removed || self.active_entry_id.is_none() {
            self.active_entry_id = crud::fallback_after_topic_delete(&doc);
        }
        self.commit(doc);
        Ok(DeleteOutcome::Deleted)
    }

    /// Append an entry to a topic and make it active.
    pub fn create_entry(&mut self, topic_id: &str, title: Option<&str>) -> Result<EntryId> {
        let now = self.orchestrator.clock().utc_now();
        let title = title.unwrap_or(DEFAULT_ENTRY_TITLE);
        let (doc, id) =
            crud::create_entry(self.document(), topic_id, title, self.ids.as_ref(), now)?;
        self.active_entry_id = Some(id.clone());
        self.commit(doc);
        Ok(id)
    }

    /// Merge `patch` into an entry.
    ///
    /// Returns `false` without recording an edit if the entry does not exist
    /// or the patch is empty.
    pub fn update_entry(&mut self, entry_id: &str, patch: &EntryPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        match crud::update_entry(self.document(), entry_id, patch) {
            Ok(doc) => {
                self.commit(doc);
                true
            }
            Err(e) => {
                log::warn!("Ignoring update: {}", e);
                false
            }
        }
    }

    /// Delete an entry after confirmation, moving the selection if needed.
    pub fn delete_entry(&mut self, entry_id: &str) -> Result<DeleteOutcome> {
        let entry = self
            .document()
            .find_entry(entry_id)
            .ok_or_else(|| PortfolioError::EntryNotFound(entry_id.to_string()))?;
        let request = DeleteRequest::Entry {
            id: &entry.id,
            title: &entry.title,
        };
        if !self.confirm.confirm(&request) {
            return Ok(DeleteOutcome::Cancelled);
        }

        let (doc, position) = crud::delete_entry(self.document(), entry_id)?;
        if self.active_entry_id.as_deref() == Some(entry_id) || self.active_entry_id.is_none() {
            self.active_entry_id = crud::fallback_after_entry_delete(&doc, position);
        }
        self.commit(doc);
        Ok(DeleteOutcome::Deleted)
    }

    pub fn move_entry(&mut self, entry_id: &str, target_topic_id: &str) -> Result<()> {
        let doc = crud::move_entry(self.document(), entry_id, target_topic_id)?;
        self.commit(doc);
        Ok(())
    }

    /// Replace the document with an imported one.
    ///
    /// On a malformed payload nothing changes.
    pub fn import_json(&mut self, text: &str) -> Result<()> {
        let doc = exchange::import_json(text)?;
        self.replace_document(doc);
        Ok(())
    }

    /// Swap in a whole document (an import or a cloud download), keeping the
    /// selection if the entry still exists.
    pub fn replace_document(&mut self, doc: PortfolioDocument) {
        self.active_entry_id = crud::resolve_active(&doc, self.active_entry_id.as_deref());
        self.orchestrator.replace_document(doc);
    }

    pub fn export_json(&self) -> Result<String> {
        exchange::export_json(self.document())
    }

    pub async fn save_now(&mut self) -> Result<bool> {
        self.orchestrator.save_now().await
    }

    pub async fn tick(&mut self) -> Result<bool> {
        self.orchestrator.tick().await
    }

    pub async fn on_focus(&mut self) -> Result<ExternalChange> {
        self.orchestrator.on_focus().await
    }

    pub async fn resolve_conflict(&mut self, resolution: ConflictResolution) -> Result<()> {
        self.orchestrator.resolve_conflict(resolution).await?;
        self.active_entry_id =
            crud::resolve_active(self.document(), self.active_entry_id.as_deref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::{AutosaveSettings, ManualClock};
    use crate::test_utils::{MockStore, SequentialIds, block_on_test, fixed_time, sample_document};
    use std::sync::Mutex;

    /// Answers every confirmation with `answer` and remembers what was asked.
    struct ScriptedConfirm {
        answer: bool,
        asked: Mutex<Vec<String>>,
    }

    impl ScriptedConfirm {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl ConfirmDelete for ScriptedConfirm {
        fn confirm(&self, request: &DeleteRequest<'_>) -> bool {
            let label = match request {
                DeleteRequest::Topic { id, entry_count, .. } => format!("topic:{id}:{entry_count}"),
                DeleteRequest::Entry { id, .. } => format!("entry:{id}"),
            };
            self.asked.lock().unwrap().push(label);
            self.answer
        }
    }

    fn session_with(store: &MockStore, confirm: bool) -> Session<MockStore, ManualClock> {
        let orch = SaveOrchestrator::with_clock(
            store.clone(),
            ManualClock::new(fixed_time()),
            AutosaveSettings::default(),
        );
        Session::new(orch, Box::new(ScriptedConfirm::new(confirm)))
            .with_ids(Box::new(SequentialIds::new()))
    }

    fn opened(confirm: bool) -> (Session<MockStore, ManualClock>, MockStore) {
        let store = MockStore::with_document(sample_document());
        let mut session = session_with(&store, confirm);
        block_on_test(session.open(Some("e1"))).unwrap();
        (session, store)
    }

    #[test]
    fn test_open_empty_store_starts_new_project() {
        let store = MockStore::new();
        let mut session = session_with(&store, true);
        assert!(!block_on_test(session.open(None)).unwrap());

        assert_eq!(session.document().entry_count(), 1);
        assert_eq!(session.active_entry_id(), Some("id-2"));
        assert!(session.orchestrator().has_pending_changes());
        assert!(block_on_test(session.save_now()).unwrap());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_open_resolves_dangling_selection() {
        let store = MockStore::with_document(sample_document());
        let mut session = session_with(&store, true);
        assert!(block_on_test(session.open(Some("gone"))).unwrap());
        assert_eq!(session.active_entry_id(), Some("e1"));
        assert!(!session.orchestrator().has_pending_changes());
    }

    #[test]
    fn test_create_entry_becomes_active() {
        let (mut session, _) = opened(true);
        let id = session.create_entry("t2", None).unwrap();
        assert_eq!(session.active_entry_id(), Some(id.as_str()));
        assert_eq!(session.active_entry().unwrap().title, DEFAULT_ENTRY_TITLE);
        assert!(session.orchestrator().has_pending_changes());
    }

    #[test]
    fn test_update_unknown_entry_is_noop() {
        let (mut session, _) = opened(true);
        assert!(!session.update_entry("ghost", &EntryPatch::title("x")));
        assert!(!session.orchestrator().has_pending_changes());

        assert!(session.update_entry("e2", &EntryPatch::title("Renamed")));
        assert_eq!(session.document().find_entry("e2").unwrap().title, "Renamed");
    }

    #[test]
    fn test_cancelled_delete_changes_nothing() {
        let (mut session, _) = opened(false);
        assert_eq!(session.delete_topic("t1").unwrap(), DeleteOutcome::Cancelled);
        assert_eq!(session.delete_entry("e1").unwrap(), DeleteOutcome::Cancelled);
        assert_eq!(*session.document(), sample_document());
        assert!(!session.orchestrator().has_pending_changes());
    }

    #[test]
    fn test_delete_active_entry_moves_selection() {
        let (mut session, _) = opened(true);
        assert_eq!(session.delete_entry("e1").unwrap(), DeleteOutcome::Deleted);
        assert_eq!(session.active_entry_id(), Some("e2"));
    }

    #[test]
    fn test_delete_inactive_entry_keeps_selection() {
        let (mut session, _) = opened(true);
        session.delete_entry("e3").unwrap();
        assert_eq!(session.active_entry_id(), Some("e1"));
    }

    #[test]
    fn test_delete_topic_with_active_entry() {
        let store = MockStore::with_document(sample_document());
        let confirm = ScriptedConfirm::new(true);
        let orch = SaveOrchestrator::with_clock(
            store.clone(),
            ManualClock::new(fixed_time()),
            AutosaveSettings::default(),
        );
        let mut session = Session::new(orch, Box::new(confirm));
        block_on_test(session.open(Some("e2"))).unwrap();

        session.delete_topic("t1").unwrap();
        assert_eq!(session.active_entry_id(), Some("e3"));

        session.delete_topic("t2").unwrap();
        assert_eq!(session.active_entry_id(), None);
        assert!(session.document().topics.is_empty());
    }

    #[test]
    fn test_confirmation_describes_target() {
        let store = MockStore::with_document(sample_document());
        let confirm = std::sync::Arc::new(ScriptedConfirm::new(false));

        struct Shared(std::sync::Arc<ScriptedConfirm>);
        impl ConfirmDelete for Shared {
            fn confirm(&self, request: &DeleteRequest<'_>) -> bool {
                self.0.confirm(request)
            }
        }

        let orch = SaveOrchestrator::with_clock(
            store,
            ManualClock::new(fixed_time()),
            AutosaveSettings::default(),
        );
        let mut session = Session::new(orch, Box::new(Shared(confirm.clone())));
        block_on_test(session.open(None)).unwrap();
        session.delete_topic("t1").unwrap();
        session.delete_entry("e3").unwrap();

        assert_eq!(*confirm.asked.lock().unwrap(), vec!["topic:t1:2", "entry:e3"]);
    }

    #[test]
    fn test_bad_import_leaves_session_untouched() {
        let (mut session, _) = opened(true);
        assert!(session.import_json("{\"notes\": []}").is_err());
        assert_eq!(*session.document(), sample_document());
        assert_eq!(session.active_entry_id(), Some("e1"));
        assert!(!session.orchestrator().has_pending_changes());
    }

    #[test]
    fn test_import_replaces_document() {
        let (mut session, store) = opened(true);
        let text = r#"{"entries":[{"id":"x1","title":"Imported","content":"","createdAt":"2020-05-05T00:00:00Z"}]}"#;
        session.import_json(text).unwrap();
        assert_eq!(session.active_entry_id(), Some("x1"));
        block_on_test(session.save_now()).unwrap();
        assert!(store.last_saved().unwrap().contains_entry("x1"));
    }

    #[test]
    fn test_rename_and_move() {
        let (mut session, _) = opened(true);
        session.rename_topic("t2", "Reading").unwrap();
        session.move_entry("e1", "t2").unwrap();
        let topic = session.document().find_topic("t2").unwrap();
        assert_eq!(topic.name, "Reading");
        assert_eq!(topic.entries.len(), 2);
        assert_eq!(session.active_entry_id(), Some("e1"));
    }

    #[test]
    fn test_select_unknown_entry_fails() {
        let (mut session, _) = opened(true);
        assert!(matches!(
            session.select_entry("nope"),
            Err(PortfolioError::EntryNotFound(_))
        ));
        session.select_entry("e3").unwrap();
        assert_eq!(session.active_entry().unwrap().title, "Notes");
    }
}
