//! Timestamp formats for `Created`/`Updated` fields.
//!
//! Formats use the `time` crate's format-description syntax
//! (`[year]-[month]-[day] [hour]:[minute]`) or one of the well-known names
//! `rfc3339`, `rfc2822` and `iso8601`.

use std::str::FromStr;

use time::format_description::well_known::{Iso8601, Rfc2822, Rfc3339};
use time::format_description::{self, OwnedFormatItem};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::{FeedgenError, Result};

/// A compiled timestamp format.
#[derive(Debug, Clone)]
pub enum TimeFormat {
    Rfc3339,
    Rfc2822,
    Iso8601,
    Custom { source: String, items: OwnedFormatItem },
}

impl TimeFormat {
    /// Compiles a format string.
    ///
    /// # Errors
    ///
    /// Returns [`FeedgenError::InvalidTimeFormat`] if the description is malformed.
    pub fn compile(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "rfc3339" => Ok(Self::Rfc3339),
            "rfc2822" => Ok(Self::Rfc2822),
            "iso8601" => Ok(Self::Iso8601),
            _ => {
                let items = format_description::parse_owned::<1>(text).map_err(|e| {
                    FeedgenError::InvalidTimeFormat { format: text.to_string(), message: e.to_string() }
                })?;
                Ok(Self::Custom { source: text.to_string(), items })
            }
        }
    }

    /// Parses a value against this format.
    ///
    /// Values without an offset are taken as UTC; date-only values are taken
    /// as midnight UTC.
    pub fn parse(&self, value: &str) -> std::result::Result<OffsetDateTime, time::error::Parse> {
        match self {
            Self::Rfc3339 => OffsetDateTime::parse(value, &Rfc3339),
            Self::Rfc2822 => OffsetDateTime::parse(value, &Rfc2822),
            Self::Iso8601 => OffsetDateTime::parse(value, &Iso8601::DEFAULT),
            Self::Custom { items, .. } => OffsetDateTime::parse(value, items)
                .or_else(|_| PrimitiveDateTime::parse(value, items).map(PrimitiveDateTime::assume_utc))
                .or_else(|err| Date::parse(value, items).map(|d| d.midnight().assume_utc()).map_err(|_| err)),
        }
    }

    /// The text this format was compiled from.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rfc3339 => "rfc3339",
            Self::Rfc2822 => "rfc2822",
            Self::Iso8601 => "iso8601",
            Self::Custom { source, .. } => source,
        }
    }
}

impl FromStr for TimeFormat {
    type Err = FeedgenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}
