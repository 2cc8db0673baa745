//! The portfolio document tree: topics owning ordered entries.
//!
//! A [`PortfolioDocument`] is the single root of persistence. It is treated as
//! an immutable snapshot: the CRUD layer produces new documents rather than
//! mutating a shared one, so the save orchestrator can compare "last
//! persisted" against "current" without torn reads.
//!
//! # Wire format
//!
//! ```json
//! { "topics": [ { "id": "t1", "name": "General", "createdAt": "2024-01-01T00:00:00Z",
//!                 "entries": [ { "id": "e1", "title": "Hello", "content": "",
//!                                "createdAt": "..." } ] } ] }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name given to a topic created without user input (new project, legacy migration).
pub const DEFAULT_TOPIC_NAME: &str = "General";

/// Title given to the seed entry of a new project.
pub const DEFAULT_ENTRY_TITLE: &str = "Untitled";

/// Opaque entry identifier.
pub type EntryId = String;

/// Opaque topic identifier.
pub type TopicId = String;

/// A single writable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    #[serde(default)]
    pub title: String,
    /// Rich markup or plain text, treated as opaque here
    #[serde(default)]
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Fields this version does not know about, kept so they survive a save
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named grouping of entries. Deleting a topic deletes its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The full persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioDocument {
    pub topics: Vec<Topic>,
}

/// Location of an entry inside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPosition {
    pub topic_index: usize,
    pub entry_index: usize,
}

/// Source of fresh opaque ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl Entry {
    pub fn new(
        id: impl Into<EntryId>,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            created_at,
            extra: Map::new(),
        }
    }
}

impl Topic {
    pub fn new(id: impl Into<TopicId>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at,
            entries: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl PortfolioDocument {
    /// Seed document for the "new project" action: one topic holding one empty entry.
    pub fn new_project(ids: &dyn IdGenerator, now: DateTime<Utc>) -> Self {
        let mut topic = Topic::new(ids.next_id(), DEFAULT_TOPIC_NAME, now);
        topic
            .entries
            .push(Entry::new(ids.next_id(), DEFAULT_ENTRY_TITLE, now));
        Self {
            topics: vec![topic],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn find_topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    pub fn find_entry(&self, entry_id: &str) -> Option<&Entry> {
        self.entries().find(|e| e.id == entry_id)
    }

    /// The topic that owns `entry_id`.
    pub fn topic_of_entry(&self, entry_id: &str) -> Option<&Topic> {
        self.topics
            .iter()
            .find(|t| t.entries.iter().any(|e| e.id == entry_id))
    }

    pub fn position_of(&self, entry_id: &str) -> Option<EntryPosition> {
        self.topics.iter().enumerate().find_map(|(topic_index, t)| {
            t.entries
                .iter()
                .position(|e| e.id == entry_id)
                .map(|entry_index| EntryPosition {
                    topic_index,
                    entry_index,
                })
        })
    }

    pub fn contains_entry(&self, entry_id: &str) -> bool {
        self.find_entry(entry_id).is_some()
    }

    /// All entries in tree order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.topics.iter().flat_map(|t| t.entries.iter())
    }

    pub fn entry_count(&self) -> usize {
        self.topics.iter().map(|t| t.entries.len()).sum()
    }

    /// First entry of the first topic that has any.
    pub fn first_entry_id(&self) -> Option<&str> {
        self.entries().next().map(|e| e.id.as_str())
    }

    /// Check the cross-document id uniqueness invariant.
    ///
    /// Returns a description of the first duplicate found.
    pub fn validate_ids(&self) -> std::result::Result<(), String> {
        let mut topic_ids = HashSet::new();
        let mut entry_ids = HashSet::new();
        for topic in &self.topics {
            if !topic_ids.insert(topic.id.as_str()) {
                return Err(format!("duplicate topic id '{}'", topic.id));
            }
            for entry in &topic.entries {
                if !entry_ids.insert(entry.id.as_str()) {
                    return Err(format!("duplicate entry id '{}'", entry.id));
                }
            }
        }
        Ok(())
    }
}

/// `createdAt` (de)serialization.
///
/// Writes RFC 3339 with as many fractional digits as needed. Reads RFC 3339
/// strings or integer epoch milliseconds.
pub mod timestamp {
    use std::fmt;

    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }

    struct TimestampVisitor;

    impl TimestampVisitor {
        fn from_millis<E: de::Error>(millis: i64) -> Result<DateTime<Utc>, E> {
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {millis}")))
        }
    }

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an RFC 3339 timestamp or epoch milliseconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid timestamp '{v}': {e}")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Self::from_millis(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            let millis = i64::try_from(v).map_err(|_| E::custom("timestamp out of range"))?;
            Self::from_millis(millis)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            let millis = v.round();
            if !millis.is_finite() || millis < i64::MIN as f64 || millis >= i64::MAX as f64 {
                return Err(E::custom(format!("timestamp out of range: {v}")));
            }
            Self::from_millis(millis as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SequentialIds, fixed_time};

    #[test]
    fn test_new_project_seeds_one_topic_one_entry() {
        let doc = PortfolioDocument::new_project(&SequentialIds::new(), fixed_time());
        assert_eq!(doc.topics.len(), 1);
        assert_eq!(doc.topics[0].name, DEFAULT_TOPIC_NAME);
        assert_eq!(doc.entry_count(), 1);
        assert_eq!(doc.first_entry_id(), Some("id-2"));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = Entry::new("e1", "Hello", fixed_time());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["createdAt"], "2024-03-01T09:30:00Z");
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_timestamp_accepts_epoch_millis() {
        let entry: Entry = serde_json::from_str(
            r#"{"id":"e1","title":"t","content":"","createdAt":1709285400000}"#,
        )
        .unwrap();
        assert_eq!(entry.created_at, fixed_time());
    }

    #[test]
    fn test_timestamp_preserves_subsecond_precision() {
        let entry: Entry = serde_json::from_str(
            r#"{"id":"e1","title":"t","content":"","createdAt":"2024-03-01T09:30:00.123456Z"}"#,
        )
        .unwrap();
        let back: Entry = serde_json::from_value(serde_json::to_value(&entry).unwrap()).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_timestamp_rounds_fractional_millis() {
        let entry: Entry = serde_json::from_str(
            r#"{"id":"e1","title":"t","content":"","createdAt":1709285399999.6}"#,
        )
        .unwrap();
        assert_eq!(entry.created_at, fixed_time());
    }

    #[test]
    fn test_timestamp_rejects_out_of_range_float() {
        let result: std::result::Result<Entry, _> = serde_json::from_str(
            r#"{"id":"e1","title":"t","content":"","createdAt":1e300}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let json = r#"{"id":"t1","name":"Essays","createdAt":"2024-03-01T09:30:00Z","color":"red","entries":[{"id":"e1","title":"t","content":"","createdAt":"2024-03-01T09:30:00Z","tags":["x"]}]}"#;
        let topic: Topic = serde_json::from_str(json).unwrap();
        assert_eq!(topic.extra["color"], "red");
        assert_eq!(topic.entries[0].extra["tags"], serde_json::json!(["x"]));

        let back = serde_json::to_value(&topic).unwrap();
        assert_eq!(back["color"], "red");
        assert_eq!(back["entries"][0]["tags"][0], "x");
    }

    #[test]
    fn test_validate_ids_reports_duplicates() {
        let mut doc = PortfolioDocument::new_project(&SequentialIds::new(), fixed_time());
        assert!(doc.validate_ids().is_ok());

        let dup = doc.topics[0].entries[0].clone();
        let mut other = Topic::new("t-other", "Other", fixed_time());
        other.entries.push(dup);
        doc.topics.push(other);

        let err = doc.validate_ids().unwrap_err();
        assert!(err.contains("duplicate entry id"));
    }

    #[test]
    fn test_position_and_owner_lookup() {
        let mut doc = PortfolioDocument::default();
        let mut t1 = Topic::new("t1", "One", fixed_time());
        t1.entries.push(Entry::new("a", "A", fixed_time()));
        t1.entries.push(Entry::new("b", "B", fixed_time()));
        doc.topics.push(t1);

        assert_eq!(
            doc.position_of("b"),
            Some(EntryPosition {
                topic_index: 0,
                entry_index: 1
            })
        );
        assert_eq!(doc.topic_of_entry("a").map(|t| t.id.as_str()), Some("t1"));
        assert!(doc.position_of("zzz").is_none());
    }
}
