//! RSS 2.0 output.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::{finish, rfc2822, write_event, write_text_element, xml_writer};
use crate::Result;
use crate::item::Feed;

const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

/// Renders `feed` as an RSS 2.0 document.
///
/// `pubDate` is the item's `created` time, falling back to `updated`.
pub fn to_rss(feed: &Feed) -> Result<String> {
    let mut w = xml_writer();
    write_event(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:content", CONTENT_NS));
    write_event(&mut w, Event::Start(rss))?;
    write_event(&mut w, Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut w, "title", &feed.title)?;
    write_text_element(&mut w, "link", &feed.link)?;
    write_text_element(&mut w, "description", &feed.description)?;
    write_text_element(&mut w, "lastBuildDate", &rfc2822(feed.updated)?)?;

    for item in &feed.items {
        write_event(&mut w, Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut w, "title", &item.title)?;
        if !item.link.is_empty() {
            write_text_element(&mut w, "link", &item.link)?;
        }
        write_text_element(&mut w, "description", &item.description)?;
        if !item.content.is_empty() {
            write_text_element(&mut w, "content:encoded", &item.content)?;
        }
        if !item.author.is_empty() {
            write_text_element(&mut w, "author", &item.author)?;
        }

        let guid = if item.id.is_empty() { &item.link } else { &item.id };
        if !guid.is_empty() {
            let mut start = BytesStart::new("guid");
            start.push_attribute(("isPermaLink", "false"));
            write_event(&mut w, Event::Start(start))?;
            write_event(&mut w, Event::Text(BytesText::new(guid)))?;
            write_event(&mut w, Event::End(BytesEnd::new("guid")))?;
        }

        if let Some(ts) = item.created.or(item.updated) {
            write_text_element(&mut w, "pubDate", &rfc2822(ts)?)?;
        }
        write_event(&mut w, Event::End(BytesEnd::new("item")))?;
    }

    write_event(&mut w, Event::End(BytesEnd::new("channel")))?;
    write_event(&mut w, Event::End(BytesEnd::new("rss")))?;
    finish(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::sample_feed;

    #[test]
    fn test_rss_document() {
        let xml = to_rss(&sample_feed()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<title>Example &amp; Co</title>"));
        assert!(xml.contains("<title>First &lt;post&gt;</title>"));
        assert!(xml.contains("<description>&lt;p&gt;one&lt;/p&gt;</description>"));
        assert!(xml.contains("<content:encoded>&lt;p&gt;body&lt;/p&gt;</content:encoded>"));
        assert!(xml.contains("<guid isPermaLink=\"false\">1</guid>"));
        assert!(xml.contains("<pubDate>Tue, 02 Jan 2024 03:04:05 +0000</pubDate>"));
        assert!(xml.contains("<lastBuildDate>Thu, 01 Feb 2024 00:00:00 +0000</lastBuildDate>"));
    }

    #[test]
    fn test_items_keep_order_and_fallback_guid() {
        let xml = to_rss(&sample_feed()).unwrap();
        let first = xml.find("https://example.com/1").unwrap();
        let second = xml.find("https://example.com/2").unwrap();
        assert!(first < second);
        assert!(xml.contains("<guid isPermaLink=\"false\">https://example.com/2</guid>"));
        assert_eq!(xml.matches("<pubDate>").count(), 1);
    }

    #[test]
    fn test_parses_back_with_feed_rs() {
        let xml = to_rss(&sample_feed()).unwrap();
        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.title.unwrap().content, "Example & Co");
    }
}
