//! Selector-driven record extraction.
//!
//! A [`FieldMap`] names one selector per logical field. The `Container`
//! selector picks the repeating record boundary; every other selector is
//! matched inside each container and rendered according to its field:
//!
//! | Field                        | Rendered as                                  |
//! |------------------------------|----------------------------------------------|
//! | `Title`, `Author`, `Id`      | visible text, trimmed                        |
//! | `Description`, `Content`     | inner markup, tags preserved                 |
//! | `Link`                       | `href`, normalized against the base address  |
//! | `Created`, `Updated`         | text parsed with the field's [`TimeFormat`]  |
//!
//! Problems with a single field never abort the document. They are collected
//! as [`FieldIssue`]s in the returned [`Extraction`] and logged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::link::normalize_link;
use crate::parse::{Document, Element};
use crate::selector::{CompiledSelector, compile};
use crate::timestamp::TimeFormat;
use crate::{FeedgenError, Result};

/// Logical field names a [`FieldMap`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    Container,
    Title,
    Link,
    Author,
    Description,
    Id,
    Created,
    Updated,
    Content,
}

/// How a matched node is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Selects record boundaries; never rendered.
    Container,
    Text,
    Markup,
    Link,
    Timestamp,
}

impl FieldName {
    pub const ALL: [FieldName; 9] = [
        FieldName::Container,
        FieldName::Title,
        FieldName::Link,
        FieldName::Author,
        FieldName::Description,
        FieldName::Id,
        FieldName::Created,
        FieldName::Updated,
        FieldName::Content,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            FieldName::Container => FieldKind::Container,
            FieldName::Title | FieldName::Author | FieldName::Id => FieldKind::Text,
            FieldName::Description | FieldName::Content => FieldKind::Markup,
            FieldName::Link => FieldKind::Link,
            FieldName::Created | FieldName::Updated => FieldKind::Timestamp,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::Container => "Container",
            FieldName::Title => "Title",
            FieldName::Link => "Link",
            FieldName::Author => "Author",
            FieldName::Description => "Description",
            FieldName::Id => "Id",
            FieldName::Created => "Created",
            FieldName::Updated => "Updated",
            FieldName::Content => "Content",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = FeedgenError;

    fn from_str(s: &str) -> Result<Self> {
        FieldName::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FeedgenError::ConfigError(format!("Unknown selector name: {}", s)))
    }
}

/// Selector strings as they appear in a source configuration file.
///
/// Empty strings mean "not configured".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSelectors {
    pub container: String,
    pub title: String,
    pub link: String,
    pub author: String,
    pub description: String,
    pub id: String,
    pub updated: String,
    pub updated_format: String,
    pub created: String,
    pub created_format: String,
    pub content: String,
}

/// Compiled mapping from field name to selector, plus timestamp formats.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    selectors: BTreeMap<FieldName, CompiledSelector>,
    created_format: Option<TimeFormat>,
    updated_format: Option<TimeFormat>,
}

impl FieldMap {
    /// Create an empty field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every selector and format in `config`.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed selector or format, or when no
    /// container selector is configured.
    pub fn from_config(config: &ItemSelectors) -> Result<Self> {
        let mut map = Self::new();
        map.set(FieldName::Container, &config.container)?;
        map.set(FieldName::Title, &config.title)?;
        map.set(FieldName::Link, &config.link)?;
        map.set(FieldName::Description, &config.description)?;
        map.set(FieldName::Author, &config.author)?;
        map.set(FieldName::Created, &config.created)?;
        map.set(FieldName::Updated, &config.updated)?;
        map.set(FieldName::Id, &config.id)?;
        map.set(FieldName::Content, &config.content)?;
        map.set_time_format(FieldName::Created, &config.created_format)?;
        map.set_time_format(FieldName::Updated, &config.updated_format)?;
        map.validate()?;
        Ok(map)
    }

    /// Sets the selector for `field`. An empty string clears it.
    pub fn set(&mut self, field: FieldName, selector: &str) -> Result<()> {
        if selector.trim().is_empty() {
            self.selectors.remove(&field);
            return Ok(());
        }
        self.selectors.insert(field, compile(selector)?);
        Ok(())
    }

    /// Builder form of [`FieldMap::set`].
    pub fn with(mut self, field: FieldName, selector: &str) -> Result<Self> {
        self.set(field, selector)?;
        Ok(self)
    }

    /// Sets the timestamp format for `Created` or `Updated`. An empty string clears it.
    pub fn set_time_format(&mut self, field: FieldName, format: &str) -> Result<()> {
        let format = if format.trim().is_empty() { None } else { Some(TimeFormat::compile(format)?) };
        match field {
            FieldName::Created => self.created_format = format,
            FieldName::Updated => self.updated_format = format,
            other => {
                return Err(FeedgenError::ConfigError(format!("{} does not take a time format", other)));
            }
        }
        Ok(())
    }

    /// Builder form of [`FieldMap::set_time_format`].
    pub fn with_time_format(mut self, field: FieldName, format: &str) -> Result<Self> {
        self.set_time_format(field, format)?;
        Ok(self)
    }

    pub fn selector(&self, field: FieldName) -> Option<&CompiledSelector> {
        self.selectors.get(&field)
    }

    pub fn time_format(&self, field: FieldName) -> Option<&TimeFormat> {
        match field {
            FieldName::Created => self.created_format.as_ref(),
            FieldName::Updated => self.updated_format.as_ref(),
            _ => None,
        }
    }

    /// Checks that the map can drive an extraction.
    pub fn validate(&self) -> Result<()> {
        if self.selectors.contains_key(&FieldName::Container) { Ok(()) } else { Err(FeedgenError::MissingContainer) }
    }
}

/// A rendered field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Markup(String),
    Link(String),
    Timestamp(OffsetDateTime),
}

impl FieldValue {
    /// The string form of text, markup and link values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Markup(s) | FieldValue::Link(s) => Some(s),
            FieldValue::Timestamp(_) => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// The fields extracted from one container match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecord {
    values: BTreeMap<FieldName, FieldValue>,
}

impl ExtractedRecord {
    pub fn get(&self, field: FieldName) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// The string value of `field`, if it was extracted.
    pub fn text(&self, field: FieldName) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn timestamp(&self, field: FieldName) -> Option<OffsetDateTime> {
        self.get(field).and_then(FieldValue::as_timestamp)
    }

    pub fn insert(&mut self, field: FieldName, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What went wrong with a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIssueKind {
    /// A link node has no `href` attribute.
    MissingHref,
    /// The `href` could not be made absolute.
    UnresolvableLink(String),
    /// A timestamp selector is configured without a format.
    MissingTimeFormat,
    /// The matched text does not parse with the configured format.
    InvalidTimestamp { value: String, message: String },
}

/// A field-level problem, recorded instead of failing the extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    /// Index of the record (container match) the field belongs to.
    pub record: usize,
    pub field: FieldName,
    pub kind: FieldIssueKind,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldIssueKind::MissingHref => write!(f, "record {}: unable to find href attribute for link", self.record),
            FieldIssueKind::UnresolvableLink(message) => {
                write!(f, "record {}: unable to resolve link: {}", self.record, message)
            }
            FieldIssueKind::MissingTimeFormat => write!(
                f,
                "record {}: missing format for {} timestamp",
                self.record,
                self.field.as_str().to_lowercase()
            ),
            FieldIssueKind::InvalidTimestamp { value, message } => {
                write!(f, "record {}: cannot parse {} `{}`: {}", self.record, self.field, value, message)
            }
        }
    }
}

/// The result of running a [`FieldMap`] over a document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// One record per container match, in document order.
    pub records: Vec<ExtractedRecord>,
    /// Field-level diagnostics.
    pub issues: Vec<FieldIssue>,
}

/// Extracts one record per container match in `doc`.
///
/// `base_url` is the address the document was fetched from; links are
/// normalized against it.
///
/// # Errors
///
/// Returns [`FeedgenError::MissingContainer`] if the map has no container
/// selector. Nothing else aborts the extraction.
pub fn extract(map: &FieldMap, doc: &Document, base_url: &str) -> Result<Extraction> {
    let container = map.selector(FieldName::Container).ok_or(FeedgenError::MissingContainer)?;
    let mut extraction = Extraction::default();

    for (index, node) in container.match_all(&doc.root()).into_iter().enumerate() {
        let mut record = ExtractedRecord::default();

        for (&field, selector) in &map.selectors {
            if field == FieldName::Container {
                continue;
            }
            let Some(value_node) = selector.match_first(&node) else {
                continue;
            };

            match render_field(map, field, &value_node, base_url) {
                Ok(Some(value)) => record.insert(field, value),
                Ok(None) => {}
                Err((fallback, kind)) => {
                    let issue = FieldIssue { record: index, field, kind };
                    tracing::warn!(field = %field, record = index, "{}", issue);
                    extraction.issues.push(issue);
                    if let Some(value) = fallback {
                        record.insert(field, value);
                    }
                }
            }
        }

        extraction.records.push(record);
    }

    tracing::debug!(
        container = %container,
        records = extraction.records.len(),
        issues = extraction.issues.len(),
        "extracted records"
    );
    Ok(extraction)
}

type FieldFailure = (Option<FieldValue>, FieldIssueKind);

fn render_field(
    map: &FieldMap, field: FieldName, node: &Element<'_>, base_url: &str,
) -> std::result::Result<Option<FieldValue>, FieldFailure> {
    match field.kind() {
        FieldKind::Container => Ok(None),
        FieldKind::Text => Ok(Some(FieldValue::Text(node.text().trim().to_string()))),
        FieldKind::Markup => Ok(Some(FieldValue::Markup(node.inner_html()))),
        FieldKind::Link => {
            let empty = Some(FieldValue::Link(String::new()));
            let href = node.attr("href").ok_or((empty.clone(), FieldIssueKind::MissingHref))?;
            normalize_link(base_url, href)
                .map(|link| Some(FieldValue::Link(link)))
                .map_err(|e| (empty, FieldIssueKind::UnresolvableLink(e.to_string())))
        }
        FieldKind::Timestamp => {
            let format = map.time_format(field).ok_or((None, FieldIssueKind::MissingTimeFormat))?;
            let value = node.text().trim().to_string();
            match format.parse(&value) {
                Ok(ts) => Ok(Some(FieldValue::Timestamp(ts))),
                Err(e) => Err((None, FieldIssueKind::InvalidTimestamp { value, message: e.to_string() })),
            }
        }
    }
}
