use serde::Serialize;

use super::rfc3339;
use crate::item::{Feed, FeedItem};
use crate::{FeedgenError, Result};

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

/// Top-level JSON Feed document
#[derive(Debug, Clone, Serialize)]
pub struct JsonFeed {
    pub version: &'static str,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub home_page_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub items: Vec<JsonItem>,
}

/// One JSON Feed item
#[derive(Debug, Clone, Serialize)]
pub struct JsonItem {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub title: String,
    /// Items must carry one of `content_html` / `content_text`
    pub content_html: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<JsonAuthor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonAuthor {
    pub name: String,
}

impl JsonItem {
    fn from_item(item: &FeedItem) -> Result<Self> {
        let id = if item.id.is_empty() { item.link.clone() } else { item.id.clone() };
        let content_html = if item.content.is_empty() { item.description.clone() } else { item.content.clone() };

        Ok(Self {
            id,
            url: item.link.clone(),
            title: item.title.clone(),
            content_html,
            summary: item.description.clone(),
            date_published: item.created.map(rfc3339).transpose()?,
            date_modified: item.updated.map(rfc3339).transpose()?,
            authors: if item.author.is_empty() { Vec::new() } else { vec![JsonAuthor { name: item.author.clone() }] },
        })
    }
}

/// Renders `feed` as a JSON Feed 1.1 document
pub fn to_json(feed: &Feed) -> Result<String> {
    let output = JsonFeed {
        version: JSON_FEED_VERSION,
        title: feed.title.clone(),
        home_page_url: feed.link.clone(),
        description: feed.description.clone(),
        items: feed.items.iter().map(JsonItem::from_item).collect::<Result<_>>()?,
    };

    serde_json::to_string_pretty(&output).map_err(|e| FeedgenError::Serialization(e.to_string()))
}
