//! Test utilities for portfolio_core
//!
//! Deterministic ids and timestamps, a fixture document, and a scriptable
//! store that records every call.

use std::collections::VecDeque;
use std::future::{Future, ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{PortfolioError, Result};
use crate::fs::BoxFuture;
use crate::model::{Entry, IdGenerator, PortfolioDocument, Topic};
use crate::store::{ExternalChange, PortfolioStore};

/// Run a future to completion on the current thread.
pub fn block_on_test<F: Future>(future: F) -> F::Output {
    futures_lite::future::block_on(future)
}

/// 2024-03-01T09:30:00Z
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

/// Ids "id-1", "id-2", ...
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: usize) -> Self {
        Self {
            next: AtomicUsize::new(first),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Two topics: `t1` holds `e1` and `e2`, `t2` holds `e3`.
pub fn sample_document() -> PortfolioDocument {
    let mut writing = Topic::new("t1", "Writing", fixed_time());
    let mut hello = Entry::new("e1", "Hello", fixed_time());
    hello.content = "<p>Hello, world</p>".to_string();
    writing.entries.push(hello);
    writing.entries.push(Entry::new("e2", "Draft", fixed_time()));

    let mut research = Topic::new("t2", "Research", fixed_time());
    research.entries.push(Entry::new("e3", "Notes", fixed_time()));

    PortfolioDocument {
        topics: vec![writing, research],
    }
}

#[derive(Default)]
struct MockState {
    stored: Option<PortfolioDocument>,
    saves: Vec<PortfolioDocument>,
    loads: usize,
    failures: VecDeque<PortfolioError>,
    external: Option<ExternalChange>,
    acknowledged: usize,
}

/// A store whose clones share state, so tests keep a handle for assertions
/// after moving one into an orchestrator.
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: PortfolioDocument) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().stored = Some(doc);
        store
    }

    /// Make the next save (or load) fail with `err`.
    pub fn fail_next(&self, err: PortfolioError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    /// Replace the stored document as if another program wrote it.
    pub fn modify_externally(&self, doc: PortfolioDocument) {
        let mut state = self.state.lock().unwrap();
        state.stored = Some(doc);
        state.external = Some(ExternalChange::Modified {
            path: "/mock/portfolio-data.json".into(),
            expected_ms: 0,
            actual_ms: Some(5_000),
        });
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().unwrap().saves.len()
    }

    pub fn saves(&self) -> Vec<PortfolioDocument> {
        self.state.lock().unwrap().saves.clone()
    }

    pub fn last_saved(&self) -> Option<PortfolioDocument> {
        self.state.lock().unwrap().saves.last().cloned()
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().unwrap().loads
    }

    pub fn acknowledged(&self) -> usize {
        self.state.lock().unwrap().acknowledged
    }
}

impl PortfolioStore for MockStore {
    fn name(&self) -> &str {
        "Mock"
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        let mut state = self.state.lock().unwrap();
        let result = match state.failures.pop_front() {
            Some(err) => Err(err),
            None => {
                state.stored = Some(doc.clone());
                state.saves.push(doc.clone());
                state.external = None;
                Ok(())
            }
        };
        Box::pin(ready(result))
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        let mut state = self.state.lock().unwrap();
        state.loads += 1;
        let result = match state.failures.pop_front() {
            Some(err) => Err(err),
            None => {
                state.external = None;
                Ok(state.stored.clone())
            }
        };
        Box::pin(ready(result))
    }

    fn check_external_change(&mut self) -> BoxFuture<'_, Result<ExternalChange>> {
        let change = self
            .state
            .lock()
            .unwrap()
            .external
            .clone()
            .unwrap_or(ExternalChange::Unchanged);
        Box::pin(ready(Ok(change)))
    }

    fn acknowledge_external_change(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.external = None;
        state.acknowledged += 1;
    }
}
