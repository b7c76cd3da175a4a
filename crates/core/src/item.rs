//! The normalized feed item model.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::extract::{ExtractedRecord, FieldName};

/// One entry of an output feed.
///
/// Items are built fresh on every run, either from an [`ExtractedRecord`]
/// or from a tracked record plus its stored state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub author: String,
    pub id: String,
    pub description: String,
    pub content: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
}

impl FeedItem {
    /// Builds an item with just a title and link.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self { title: title.into(), link: link.into(), ..Default::default() }
    }

    /// The newest of `created` and `updated`.
    pub fn latest_timestamp(&self) -> Option<OffsetDateTime> {
        match (self.created, self.updated) {
            (Some(c), Some(u)) => Some(c.max(u)),
            (c, u) => c.or(u),
        }
    }
}

impl From<ExtractedRecord> for FeedItem {
    fn from(record: ExtractedRecord) -> Self {
        let text = |field| record.text(field).unwrap_or_default().to_string();

        Self {
            title: text(FieldName::Title),
            link: text(FieldName::Link),
            author: text(FieldName::Author),
            id: text(FieldName::Id),
            description: text(FieldName::Description),
            content: text(FieldName::Content),
            created: record.timestamp(FieldName::Created),
            updated: record.timestamp(FieldName::Updated),
        }
    }
}

/// Feed-level metadata a source declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedMeta {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// An assembled feed, ready for a formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub updated: OffsetDateTime,
    pub items: Vec<FeedItem>,
}

impl Feed {
    pub fn new(meta: FeedMeta, updated: OffsetDateTime, items: Vec<FeedItem>) -> Self {
        Self { title: meta.title, link: meta.link, description: meta.description, updated, items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FieldValue;
    use time::macros::datetime;

    #[test]
    fn test_item_from_record() {
        let mut record = ExtractedRecord::default();
        record.insert(FieldName::Title, FieldValue::Text("Hello".to_string()));
        record.insert(FieldName::Link, FieldValue::Link("https://example.com/a".to_string()));
        record.insert(FieldName::Description, FieldValue::Markup("<p>desc</p>".to_string()));
        record.insert(FieldName::Content, FieldValue::Markup("<p>body</p>".to_string()));
        record.insert(FieldName::Updated, FieldValue::Timestamp(datetime!(2024-05-01 12:00 UTC)));

        let item = FeedItem::from(record);
        assert_eq!(item.title, "Hello");
        assert_eq!(item.link, "https://example.com/a");
        assert_eq!(item.description, "<p>desc</p>");
        assert_eq!(item.content, "<p>body</p>");
        assert_eq!(item.author, "");
        assert_eq!(item.created, None);
        assert_eq!(item.updated, Some(datetime!(2024-05-01 12:00 UTC)));
    }

    #[test]
    fn test_latest_timestamp() {
        let mut item = FeedItem::new("t", "l");
        assert_eq!(item.latest_timestamp(), None);

        item.created = Some(datetime!(2024-01-01 0:00 UTC));
        assert_eq!(item.latest_timestamp(), item.created);

        item.updated = Some(datetime!(2024-02-01 0:00 UTC));
        assert_eq!(item.latest_timestamp(), item.updated);
    }
}
