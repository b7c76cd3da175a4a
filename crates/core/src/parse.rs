//! HTML parsing and the document model.
//!
//! This module provides the [`Document`] and [`Element`] types. A document is
//! produced by the external markup parser (`scraper`/html5ever) and is only
//! ever read: selectors match against it, fields render from it.
//!
//! # Example
//!
//! ```rust
//! use feedgen_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html).unwrap();
//! let paragraphs = doc.select("p.content").unwrap();
//! assert_eq!(paragraphs.len(), 1);
//! ```

use scraper::{ElementRef, Html};

use crate::Result;
use crate::selector::compile;

/// Represents a parsed HTML document.
///
/// # Example
///
/// ```rust
/// use feedgen_core::parse::Document;
///
/// let html = "<html><head><title>Test</title></head><body><p>Hello</p></body></html>";
/// let doc = Document::parse(html).unwrap();
/// assert_eq!(doc.title(), Some("Test".to_string()));
/// ```
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// The parser is error-tolerant: malformed markup is repaired the way a
    /// browser would repair it rather than rejected.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html })
    }

    /// Gets the root `<html>` element.
    ///
    /// Selectors are matched against the subtree below this element.
    pub fn root(&self) -> Element<'_> {
        Element { element: self.html.root_element() }
    }

    /// Gets the entire HTML as a string.
    pub fn as_string(&self) -> String {
        self.html.html()
    }

    /// Selects elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`FeedgenError::InvalidSelector`](crate::FeedgenError::InvalidSelector)
    /// if the selector does not compile.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile(selector)?;
        Ok(sel.match_all(&self.root()))
    }

    /// Gets the title of the document.
    ///
    /// Returns the trimmed content of the `<title>` element if present.
    pub fn title(&self) -> Option<String> {
        let title = self.select("title").ok()?.into_iter().next()?;
        Some(title.text().trim().to_string())
    }
}

/// A single element of a parsed [`Document`].
///
/// # Example
///
/// ```rust
/// use feedgen_core::parse::Document;
///
/// let html = r#"<a href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    pub(crate) fn new(element: ElementRef<'a>) -> Self {
        Self { element }
    }

    pub(crate) fn element_ref(&self) -> ElementRef<'a> {
        self.element
    }

    /// Gets the inner HTML of this element, excluding its own tags.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element, including its own tags.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Reconstructs the visible text of this element.
    ///
    /// Walks every text-bearing descendant in document order and
    /// concatenates their contents. Whitespace is kept as-is.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute.
    ///
    /// HTML attribute names are case-insensitive and the parser lowercases
    /// them, so `name` should be given in lowercase.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name of this element.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }
}
