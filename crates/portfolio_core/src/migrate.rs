//! Schema detection and migration.
//!
//! Two on-disk shapes exist:
//!
//! - current: `{ "topics": [ ... ] }`
//! - legacy: `{ "entries": [ ... ] }` (flat list, no grouping)
//!
//! [`normalize`] accepts either and always returns a current-schema
//! [`PortfolioDocument`]. Legacy entries are nested, in order and otherwise
//! untouched, under a single synthetic topic. Current-schema input comes back
//! unchanged, so normalizing the output of a normalize is a no-op.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{PortfolioError, Result};
use crate::model::{
    DEFAULT_TOPIC_NAME, Entry, IdGenerator, PortfolioDocument, Topic, UuidGenerator,
};

/// Which shape a raw payload has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Topic-grouped entries
    Current,
    /// Flat entry list
    Legacy,
}

#[derive(Deserialize)]
struct LegacyDocument {
    entries: Vec<Entry>,
}

/// Recognize the schema of a raw payload.
///
/// `topics` wins when both keys are present.
pub fn detect_schema(raw: &Value) -> Option<SchemaVersion> {
    let object = raw.as_object()?;
    if object.get("topics").is_some_and(Value::is_array) {
        Some(SchemaVersion::Current)
    } else if object.get("entries").is_some_and(Value::is_array) {
        Some(SchemaVersion::Legacy)
    } else {
        None
    }
}

/// Normalize a raw payload using fresh random ids and the current time.
pub fn normalize(raw: Value) -> Result<PortfolioDocument> {
    normalize_with(raw, &UuidGenerator, Utc::now())
}

/// Parse text and normalize it.
pub fn parse_document(text: &str) -> Result<PortfolioDocument> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| PortfolioError::InvalidSchema(format!("not valid JSON: {e}")))?;
    normalize(raw)
}

/// Deterministic core of [`normalize`].
///
/// `ids` and `now` are only consulted for the synthetic topic of a legacy
/// payload.
pub fn normalize_with(
    raw: Value,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Result<PortfolioDocument> {
    let doc = match detect_schema(&raw) {
        Some(SchemaVersion::Current) => {
            // Extra top-level keys (e.g. a stale "entries") are dropped here.
            let topics = raw.get("topics").cloned().unwrap_or(Value::Null);
            let topics: Vec<Topic> = serde_json::from_value(topics)
                .map_err(|e| PortfolioError::InvalidSchema(format!("malformed topics: {e}")))?;
            PortfolioDocument { topics }
        }
        Some(SchemaVersion::Legacy) => {
            let legacy: LegacyDocument = serde_json::from_value(raw)
                .map_err(|e| PortfolioError::InvalidSchema(format!("malformed entries: {e}")))?;
            log::info!(
                "Migrating legacy portfolio with {} entries into topic '{}'",
                legacy.entries.len(),
                DEFAULT_TOPIC_NAME
            );
            let mut topic = Topic::new(ids.next_id(), DEFAULT_TOPIC_NAME, now);
            topic.entries = legacy.entries;
            PortfolioDocument {
                topics: vec![topic],
            }
        }
        None => {
            return Err(PortfolioError::InvalidSchema(
                "expected an object with a 'topics' or 'entries' list".to_string(),
            ));
        }
    };

    doc.validate_ids().map_err(PortfolioError::InvalidSchema)?;
    Ok(doc)
}
