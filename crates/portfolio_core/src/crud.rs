//! Pure create/update/delete operations over a [`PortfolioDocument`].
//!
//! Every operation takes the current snapshot by reference and returns a new
//! one; nothing here mutates shared state. New entries are appended to their
//! topic, and new topics are appended to the document.
//!
//! Selection fallback after deletions lives here too, so the rules can be
//! tested without a session.

use chrono::{DateTime, Utc};

use crate::error::{PortfolioError, Result};
use crate::model::{Entry, EntryId, EntryPosition, IdGenerator, PortfolioDocument, Topic, TopicId};

/// Partial field set merged into an entry by [`update_entry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl EntryPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

fn validated_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PortfolioError::EmptyTopicName);
    }
    Ok(trimmed.to_string())
}

/// Append a new, empty topic.
pub fn create_topic(
    doc: &PortfolioDocument,
    name: &str,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Result<(PortfolioDocument, TopicId)> {
    let name = validated_name(name)?;
    let id = ids.next_id();
    let mut next = doc.clone();
    next.topics.push(Topic::new(id.clone(), name, now));
    Ok((next, id))
}

pub fn rename_topic(
    doc: &PortfolioDocument,
    topic_id: &str,
    name: &str,
) -> Result<PortfolioDocument> {
    let name = validated_name(name)?;
    let mut next = doc.clone();
    let topic = next
        .topics
        .iter_mut()
        .find(|t| t.id == topic_id)
        .ok_or_else(|| PortfolioError::TopicNotFound(topic_id.to_string()))?;
    topic.name = name;
    Ok(next)
}

/// Remove a topic and, with it, all of its entries.
pub fn delete_topic(doc: &PortfolioDocument, topic_id: &str) -> Result<PortfolioDocument> {
    if doc.find_topic(topic_id).is_none() {
        return Err(PortfolioError::TopicNotFound(topic_id.to_string()));
    }
    let mut next = doc.clone();
    next.topics.retain(|t| t.id != topic_id);
    Ok(next)
}

/// Append a new entry with empty content to an existing topic.
pub fn create_entry(
    doc: &PortfolioDocument,
    topic_id: &str,
    title: &str,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Result<(PortfolioDocument, EntryId)> {
    let mut next = doc.clone();
    let topic = next
        .topics
        .iter_mut()
        .find(|t| t.id == topic_id)
        .ok_or_else(|| PortfolioError::TopicNotFound(topic_id.to_string()))?;
    let id = ids.next_id();
    topic.entries.push(Entry::new(id.clone(), title, now));
    Ok((next, id))
}

/// Merge `patch` into the entry with `entry_id`.
pub fn update_entry(
    doc: &PortfolioDocument,
    entry_id: &str,
    patch: &EntryPatch,
) -> Result<PortfolioDocument> {
    let mut next = doc.clone();
    let entry = next
        .topics
        .iter_mut()
        .flat_map(|t| t.entries.iter_mut())
        .find(|e| e.id == entry_id)
        .ok_or_else(|| PortfolioError::EntryNotFound(entry_id.to_string()))?;

    if let Some(title) = &patch.title {
        entry.title = title.clone();
    }
    if let Some(content) = &patch.content {
        entry.content = content.clone();
    }
    Ok(next)
}

/// Remove an entry, returning where it used to be.
pub fn delete_entry(
    doc: &PortfolioDocument,
    entry_id: &str,
) -> Result<(PortfolioDocument, EntryPosition)> {
    let position = doc
        .position_of(entry_id)
        .ok_or_else(|| PortfolioError::EntryNotFound(entry_id.to_string()))?;
    let mut next = doc.clone();
    next.topics[position.topic_index]
        .entries
        .remove(position.entry_index);
    Ok((next, position))
}

/// Move an entry to the end of another topic.
pub fn move_entry(
    doc: &PortfolioDocument,
    entry_id: &str,
    target_topic_id: &str,
) -> Result<PortfolioDocument> {
    if doc.find_topic(target_topic_id).is_none() {
        return Err(PortfolioError::TopicNotFound(target_topic_id.to_string()));
    }
    let (mut next, position) = delete_entry(doc, entry_id)?;
    let entry = doc.topics[position.topic_index].entries[position.entry_index].clone();
    if let Some(target) = next.topics.iter_mut().find(|t| t.id == target_topic_id) {
        target.entries.push(entry);
    }
    Ok(next)
}

/// Selection after deleting a topic: first entry of the first remaining topic.
pub fn fallback_after_topic_delete(doc: &PortfolioDocument) -> Option<EntryId> {
    doc.topics
        .first()
        .and_then(|t| t.entries.first())
        .map(|e| e.id.clone())
}

/// Selection after deleting the entry that used to sit at `removed`.
///
/// Prefers whatever now occupies the same slot in the same topic, then the
/// first entry of the first topic that has any.
pub fn fallback_after_entry_delete(
    doc: &PortfolioDocument,
    removed: EntryPosition,
) -> Option<EntryId> {
    doc.topics
        .get(removed.topic_index)
        .and_then(|t| t.entries.get(removed.entry_index))
        .map(|e| e.id.clone())
        .or_else(|| doc.first_entry_id().map(str::to_string))
}

/// Resolve a remembered selection against a freshly loaded document.
pub fn resolve_active(doc: &PortfolioDocument, remembered: Option<&str>) -> Option<EntryId> {
    match remembered {
        Some(id) if doc.contains_entry(id) => Some(id.to_string()),
        _ => doc.first_entry_id().map(str::to_string),
    }
}
