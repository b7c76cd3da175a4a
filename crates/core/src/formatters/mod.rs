//! Output writers for assembled feeds.

pub mod atom;
pub mod json;
pub mod rss;

pub use atom::to_atom;
pub use json::to_json;
pub use rss::to_rss;

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

use crate::item::Feed;
use crate::{FeedgenError, Result};

/// Serialization format of an output feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Rss,
    Atom,
    Json,
}

impl OutputFormat {
    /// File extension for this format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Rss => "rss",
            OutputFormat::Atom => "atom",
            OutputFormat::Json => "json",
        }
    }

    pub fn render(&self, feed: &Feed) -> Result<String> {
        match self {
            OutputFormat::Rss => to_rss(feed),
            OutputFormat::Atom => to_atom(feed),
            OutputFormat::Json => to_json(feed),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FeedgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rss" => Ok(OutputFormat::Rss),
            "atom" => Ok(OutputFormat::Atom),
            "json" => Ok(OutputFormat::Json),
            other => Err(FeedgenError::ConfigError(format!("Unknown output format: {}", other))),
        }
    }
}

pub(crate) type XmlWriter = Writer<Cursor<Vec<u8>>>;

pub(crate) fn xml_writer() -> XmlWriter {
    Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
}

pub(crate) fn write_event(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(|e| FeedgenError::Serialization(e.to_string()))
}

/// Writes `<name>text</name>`.
pub(crate) fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    write_event(writer, Event::Start(BytesStart::new(name)))?;
    write_event(writer, Event::Text(BytesText::new(text)))?;
    write_event(writer, Event::End(BytesEnd::new(name)))
}

pub(crate) fn finish(writer: XmlWriter) -> Result<String> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| FeedgenError::Serialization(e.to_string()))
}

pub(crate) fn rfc2822(ts: OffsetDateTime) -> Result<String> {
    ts.format(&Rfc2822).map_err(|e| FeedgenError::Serialization(e.to_string()))
}

pub(crate) fn rfc3339(ts: OffsetDateTime) -> Result<String> {
    ts.format(&Rfc3339).map_err(|e| FeedgenError::Serialization(e.to_string()))
}

#[cfg(test)]
pub(crate) fn sample_feed() -> Feed {
    use crate::item::{FeedItem, FeedMeta};
    use time::macros::datetime;

    let meta = FeedMeta {
        title: "Example & Co".to_string(),
        link: "https://example.com/".to_string(),
        description: "Things".to_string(),
    };
    let items = vec![
        FeedItem {
            title: "First <post>".to_string(),
            link: "https://example.com/1".to_string(),
            author: "Ann".to_string(),
            id: "1".to_string(),
            description: "<p>one</p>".to_string(),
            content: "<p>body</p>".to_string(),
            created: Some(datetime!(2024-01-02 03:04:05 UTC)),
            updated: Some(datetime!(2024-01-03 00:00 UTC)),
        },
        FeedItem::new("Second", "https://example.com/2"),
    ];
    Feed::new(meta, datetime!(2024-02-01 0:00 UTC), items)
}
