use std::future::ready;

use crate::error::Result;
use crate::fs::BoxFuture;
use crate::migrate::parse_document;
use crate::model::PortfolioDocument;

use super::{PortfolioStore, encode_document};

/// Keeps the serialized document in memory.
///
/// Nothing survives the process, but save and load go through the same
/// encode/normalize path as the durable backends.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stored: Option<String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a raw payload already stored (it is normalized on load).
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            stored: Some(raw.into()),
            saves: 0,
        }
    }

    /// Raw stored text
    pub fn raw(&self) -> Option<&str> {
        self.stored.as_deref()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl PortfolioStore for MemoryStore {
    fn name(&self) -> &str {
        "Memory"
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        let result = encode_document(doc).map(|text| {
            self.stored = Some(text);
            self.saves += 1;
        });
        Box::pin(ready(result))
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        let result = self.stored.as_deref().map(parse_document).transpose();
        Box::pin(ready(result))
    }
}
