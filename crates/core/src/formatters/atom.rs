//! Atom 1.0 output.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::{XmlWriter, finish, rfc3339, write_event, write_text_element, xml_writer};
use crate::Result;
use crate::item::Feed;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

fn write_link(w: &mut XmlWriter, href: &str) -> Result<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", href));
    link.push_attribute(("rel", "alternate"));
    write_event(w, Event::Empty(link))
}

fn write_html_element(w: &mut XmlWriter, name: &str, html: &str) -> Result<()> {
    let mut start = BytesStart::new(name);
    start.push_attribute(("type", "html"));
    write_event(w, Event::Start(start))?;
    write_event(w, Event::Text(BytesText::new(html)))?;
    write_event(w, Event::End(BytesEnd::new(name)))
}

/// Renders `feed` as an Atom document.
///
/// Atom requires an `updated` time on every entry; items without one use the
/// newer of their timestamps, then the feed's own time.
pub fn to_atom(feed: &Feed) -> Result<String> {
    let mut w = xml_writer();
    write_event(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    write_event(&mut w, Event::Start(root))?;

    write_text_element(&mut w, "title", &feed.title)?;
    write_text_element(&mut w, "id", &feed.link)?;
    write_text_element(&mut w, "updated", &rfc3339(feed.updated)?)?;
    if !feed.description.is_empty() {
        write_text_element(&mut w, "subtitle", &feed.description)?;
    }
    write_link(&mut w, &feed.link)?;

    for item in &feed.items {
        write_event(&mut w, Event::Start(BytesStart::new("entry")))?;
        write_text_element(&mut w, "title", &item.title)?;

        let updated = item.updated.or(item.created).unwrap_or(feed.updated);
        write_text_element(&mut w, "updated", &rfc3339(updated)?)?;
        if let Some(created) = item.created {
            write_text_element(&mut w, "published", &rfc3339(created)?)?;
        }

        let id = if item.id.is_empty() { &item.link } else { &item.id };
        write_text_element(&mut w, "id", id)?;
        if !item.link.is_empty() {
            write_link(&mut w, &item.link)?;
        }
        if !item.description.is_empty() {
            write_html_element(&mut w, "summary", &item.description)?;
        }
        if !item.content.is_empty() {
            write_html_element(&mut w, "content", &item.content)?;
        }
        if !item.author.is_empty() {
            write_event(&mut w, Event::Start(BytesStart::new("author")))?;
            write_text_element(&mut w, "name", &item.author)?;
            write_event(&mut w, Event::End(BytesEnd::new("author")))?;
        }
        write_event(&mut w, Event::End(BytesEnd::new("entry")))?;
    }

    write_event(&mut w, Event::End(BytesEnd::new("feed")))?;
    finish(w)
}
