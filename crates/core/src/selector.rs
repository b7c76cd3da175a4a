//! Compiled CSS selectors.
//!
//! A [`CompiledSelector`] is built once from its source text and then matched
//! any number of times against a subtree of a [`Document`](crate::Document).
//! Matching is a pure function of the tree: results come back in document
//! order and an empty result is never an error.

use std::fmt;

use scraper::Selector;

use crate::parse::Element;
use crate::{FeedgenError, Result};

/// An immutable, compiled CSS selector.
#[derive(Clone)]
pub struct CompiledSelector {
    source: String,
    inner: Selector,
}

/// Compiles selector text into a [`CompiledSelector`].
///
/// # Errors
///
/// Returns [`FeedgenError::InvalidSelector`] for malformed selector syntax,
/// including the empty string.
///
/// # Example
///
/// ```rust
/// use feedgen_core::{Document, compile};
///
/// let doc = Document::parse("<ul><li>a</li><li>b</li></ul>").unwrap();
/// let items = compile("ul li").unwrap();
/// assert_eq!(items.match_all(&doc.root()).len(), 2);
/// ```
pub fn compile(text: &str) -> Result<CompiledSelector> {
    let inner = Selector::parse(text)
        .map_err(|e| FeedgenError::InvalidSelector { selector: text.to_string(), message: e.to_string() })?;

    Ok(CompiledSelector { source: text.to_string(), inner })
}

impl CompiledSelector {
    /// The selector text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns every descendant of `root` that matches, in document order.
    ///
    /// `root` itself is never part of the result.
    pub fn match_all<'a>(&self, root: &Element<'a>) -> Vec<Element<'a>> {
        root.element_ref().select(&self.inner).map(Element::new).collect()
    }

    /// Returns the first descendant of `root` that matches, if any.
    pub fn match_first<'a>(&self, root: &Element<'a>) -> Option<Element<'a>> {
        root.element_ref().select(&self.inner).next().map(Element::new)
    }
}

impl fmt::Debug for CompiledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledSelector").field(&self.source).finish()
    }
}

impl fmt::Display for CompiledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
