//! End-to-end scenarios across the session, orchestrator and real backends.

use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{TimeZone, Utc};
use futures_lite::future::block_on;

use portfolio_core::crud::EntryPatch;
use portfolio_core::error::{PortfolioError, Result};
use portfolio_core::exchange;
use portfolio_core::fs::{BoxFuture, RealFileSystem};
use portfolio_core::model::{DEFAULT_TOPIC_NAME, PortfolioDocument};
use portfolio_core::save::{
    AutosaveSettings, ConflictResolution, FailureKind, ManualClock, SaveOrchestrator, SaveStatus,
};
use portfolio_core::session::{AlwaysConfirm, Session};
use portfolio_core::store::{
    ExternalChange, FileHandleStore, KvStore, MTIME_TOLERANCE_MS, MemoryStore, PortfolioStore,
    STORE_KEY,
};

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap())
}

fn session<S: PortfolioStore>(store: S, clock: &ManualClock) -> Session<S, ManualClock> {
    let orchestrator =
        SaveOrchestrator::with_clock(store, clock.clone(), AutosaveSettings::default());
    Session::new(orchestrator, Box::new(AlwaysConfirm))
}

/// Memory store that refuses the first `failures` saves with a full disk.
struct FullDisk {
    inner: MemoryStore,
    failures: usize,
}

impl PortfolioStore for FullDisk {
    fn name(&self) -> &str {
        "Full disk"
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        if self.failures > 0 {
            self.failures -= 1;
            return Box::pin(async { Err(PortfolioError::QuotaExceeded) });
        }
        self.inner.save(doc)
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        self.inner.load()
    }
}

#[test]
fn rapid_edits_produce_one_save() {
    let clock = clock();
    let mut session = session(MemoryStore::new(), &clock);
    block_on(session.open(None)).unwrap();
    block_on(session.save_now()).unwrap();
    let entry = session.active_entry_id().unwrap().to_string();

    for i in 0..10 {
        session.update_entry(&entry, &EntryPatch::content(format!("<p>{i}</p>")));
        clock.advance(Duration::from_millis(100));
        block_on(session.tick()).unwrap();
    }
    assert_eq!(session.orchestrator().store().save_count(), 1);

    clock.advance(Duration::from_millis(1000));
    assert!(block_on(session.tick()).unwrap());
    assert_eq!(session.orchestrator().store().save_count(), 2);

    let mut store = MemoryStore::with_raw(session.orchestrator().store().raw().unwrap());
    let saved = block_on(store.load()).unwrap().unwrap();
    assert_eq!(saved.find_entry(&entry).unwrap().content, "<p>9</p>");
}

#[test]
fn failed_save_keeps_edits_until_retry() {
    let clock = clock();
    let store = FullDisk {
        inner: MemoryStore::new(),
        failures: 1,
    };
    let mut session = session(store, &clock);
    session.new_project();
    let topic = session.document().topics[0].id.clone();
    session.create_entry(&topic, Some("Unsaved")).unwrap();

    clock.advance(Duration::from_secs(1));
    assert!(block_on(session.tick()).is_err());
    match session.status() {
        SaveStatus::Error(failure) => assert_eq!(failure.kind, FailureKind::QuotaExceeded),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(session.orchestrator().has_pending_changes());
    assert_eq!(session.document().entry_count(), 2);

    assert!(block_on(session.save_now()).unwrap());
    assert!(!session.orchestrator().has_pending_changes());
    assert_eq!(session.orchestrator().store().inner.save_count(), 1);
}

#[test]
fn deleting_selection_falls_back() {
    let clock = clock();
    let mut session = session(MemoryStore::new(), &clock);
    session.new_project();
    let first_topic = session.document().topics[0].id.clone();
    let first_entry = session.active_entry_id().unwrap().to_string();

    let second_topic = session.create_topic("Poems").unwrap();
    let poem = session.create_entry(&second_topic, Some("Haiku")).unwrap();
    assert_eq!(session.active_entry_id(), Some(poem.as_str()));

    session.delete_entry(&poem).unwrap();
    assert_eq!(session.active_entry_id(), Some(first_entry.as_str()));

    session.delete_topic(&first_topic).unwrap();
    assert_eq!(session.active_entry_id(), None);
    assert_eq!(session.document().topics.len(), 1);
}

#[test]
fn document_survives_every_local_backend() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    let mut writer = session(KvStore::open(dir.path().join("p.sqlite3")).unwrap(), &clock);
    writer.new_project();
    let topic = writer.create_topic("Essays").unwrap();
    let entry = writer.create_entry(&topic, Some("On saving")).unwrap();
    writer.update_entry(&entry, &EntryPatch::content("<h1>Often</h1>"));
    block_on(writer.save_now()).unwrap();
    let original = writer.document().clone();
    drop(writer);

    let mut kv = KvStore::open(dir.path().join("p.sqlite3")).unwrap();
    let from_kv = block_on(kv.load()).unwrap().unwrap();
    assert_eq!(from_kv, original);

    let path = dir.path().join("portfolio-data.json");
    let mut file = FileHandleStore::new(RealFileSystem).with_handle(&path);
    block_on(file.save(&from_kv)).unwrap();
    let from_file = block_on(file.load()).unwrap().unwrap();
    assert_eq!(from_file, original);

    let mut memory = MemoryStore::new();
    block_on(memory.save(&from_file)).unwrap();
    assert_eq!(block_on(memory.load()).unwrap(), Some(original));
}

#[test]
fn legacy_store_contents_open_as_single_topic() {
    let kv = KvStore::in_memory().unwrap();
    kv.put(
        STORE_KEY,
        r#"{"entries":[
            {"id":"a","title":"One","content":"1","createdAt":"2022-01-01T00:00:00Z"},
            {"id":"b","title":"Two","content":"2","createdAt":1641081600000}
        ]}"#,
    )
    .unwrap();

    let clock = clock();
    let mut session = session(kv, &clock);
    block_on(session.open(Some("b"))).unwrap();

    let doc = session.document();
    assert_eq!(doc.topics.len(), 1);
    assert_eq!(doc.topics[0].name, DEFAULT_TOPIC_NAME);
    let titles: Vec<_> = doc.topics[0].entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two"]);
    assert_eq!(session.active_entry_id(), Some("b"));

    // Writing back stores the current schema
    session.update_entry("a", &EntryPatch::title("Uno"));
    block_on(session.save_now()).unwrap();
    let raw = session.orchestrator().store().get(STORE_KEY).unwrap().unwrap();
    assert!(raw.contains("\"topics\""));
    assert!(!raw.trim_start().starts_with("{\"entries\""));
}

/// Another program rewrites the file, with a clearly newer mtime.
fn write_externally(path: &Path, doc: &PortfolioDocument, ahead: Duration) {
    std::fs::write(path, exchange::export_json(doc).unwrap()).unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + ahead).unwrap();
}

#[test]
fn outside_edits_to_the_file_are_reloaded_or_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portfolio-data.json");
    let clock = clock();
    let ahead = Duration::from_millis(MTIME_TOLERANCE_MS as u64 * 5);

    let mut session = session(FileHandleStore::new(RealFileSystem).with_handle(&path), &clock);
    assert!(!block_on(session.open(None)).unwrap());
    assert!(block_on(session.save_now()).unwrap());
    assert_eq!(block_on(session.on_focus()).unwrap(), ExternalChange::Unchanged);

    // Reload takes the other program's version
    let mut theirs = session.document().clone();
    theirs.topics[0].name = "Renamed elsewhere".to_string();
    write_externally(&path, &theirs, ahead);

    assert!(block_on(session.on_focus()).unwrap().is_modified());
    assert!(session.orchestrator().conflict().is_some());
    block_on(session.resolve_conflict(ConflictResolution::Reload)).unwrap();
    assert_eq!(*session.document(), theirs);
    assert!(session.orchestrator().conflict().is_none());
    assert_eq!(block_on(session.on_focus()).unwrap(), ExternalChange::Unchanged);

    // Overwrite puts the session's version back on disk
    let mut later = theirs.clone();
    later.topics[0].name = "Renamed again".to_string();
    write_externally(&path, &later, ahead * 2);

    assert!(block_on(session.on_focus()).unwrap().is_modified());
    block_on(session.resolve_conflict(ConflictResolution::Overwrite)).unwrap();
    assert!(session.orchestrator().conflict().is_none());
    assert_eq!(block_on(session.on_focus()).unwrap(), ExternalChange::Unchanged);

    let mut reader = FileHandleStore::new(RealFileSystem).with_handle(&path);
    assert_eq!(block_on(reader.load()).unwrap(), Some(theirs));
}
