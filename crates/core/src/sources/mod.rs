//! Feed sources.
//!
//! Every source implements [`FeedSource`]: given a [`RunContext`] it fetches
//! what it needs, extracts candidates, reconciles them against stored state
//! when it tracks identities, and runs them through its item hooks.
//!
//! Parsed documents are not `Send`, so sources parse a body in a synchronous
//! helper and only keep owned values across `.await` points.

mod css;
mod hackerone;
mod rca;
mod rss;
mod syzbot;
mod tracker;

pub use css::{CssConfig, CssSource};
pub use hackerone::HackerOneSource;
pub use rca::{RCA_STATE_KEY, RcaEntry, RcaSource};
pub use rss::{RssConfig, RssSource};
pub use syzbot::{SYZBOT_STATE_KEY, SyzbotCrash, SyzbotSource};
pub use tracker::{OwnerRef, TRACKER_STATE_KEY, TrackerIssue, TrackerSource};

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::fetch::Fetcher;
use crate::item::{Feed, FeedItem, FeedMeta};
use crate::store::StateStore;
use crate::{FeedgenError, Result};

/// Everything a source may use during one run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub store: Option<&'a StateStore>,
    /// Wall-clock time of the run. New identities are stamped with it.
    pub now: OffsetDateTime,
}

impl<'a> RunContext<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, now: OffsetDateTime) -> Self {
        Self { fetcher, store: None, now }
    }

    pub fn with_store(mut self, store: &'a StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// The state store, for sources that track identities.
    pub fn require_store(&self, source: &str) -> Result<&'a StateStore> {
        self.store
            .ok_or_else(|| FeedgenError::ConfigError(format!("{} needs a working directory to keep state", source)))
    }
}

/// A producer of feed items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Short identifier, used for logging and output file names.
    fn name(&self) -> &str;

    fn meta(&self) -> FeedMeta;

    /// Produces this run's items, in publication order.
    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>>;

    /// Produces items and wraps them in a [`Feed`] stamped with the run time.
    async fn produce_feed(&self, ctx: &RunContext<'_>) -> Result<Feed> {
        let items = self.produce_items(ctx).await?;
        Ok(Feed::new(self.meta(), ctx.now, items))
    }
}

/// Runs `source` to completion and returns its feed.
pub async fn build_feed(source: &dyn FeedSource, ctx: &RunContext<'_>) -> Result<Feed> {
    tracing::debug!(source = source.name(), "building feed");
    let feed = source.produce_feed(ctx).await?;
    tracing::info!(source = source.name(), items = feed.items.len(), "built feed");
    Ok(feed)
}

/// A source configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Css(CssConfig),
    Rss(RssConfig),
}

impl SourceConfig {
    /// Parses a configuration document. A missing `type` means `css`.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| FeedgenError::ConfigError(format!("Invalid config: {}", e)))?;

        if let Some(obj) = value.as_object_mut() {
            obj.entry("type").or_insert_with(|| serde_json::Value::String("css".to_string()));
        }

        serde_json::from_value(value).map_err(|e| FeedgenError::ConfigError(format!("Invalid config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| FeedgenError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// The `type` tag this configuration was read with.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Css(_) => "css",
            SourceConfig::Rss(_) => "rss",
        }
    }

    /// Compiles the configuration into a runnable source named `name`.
    ///
    /// Selector and pattern errors surface here, before anything is fetched.
    pub fn into_source(self, name: &str) -> Result<Box<dyn FeedSource>> {
        let source: Box<dyn FeedSource> = match self {
            SourceConfig::Css(config) => Box::new(CssSource::from_config(name, &config)?),
            SourceConfig::Rss(config) => Box::new(RssSource::from_config(name, &config)?),
        };
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_defaults_to_css() {
        let config = SourceConfig::from_json(
            r#"{"url": "https://example.com", "title": "Example", "item_selectors": {"container": "li"}}"#,
        )
        .unwrap();
        assert!(matches!(config, SourceConfig::Css(ref c) if c.item_selectors.container == "li"));
    }

    #[test]
    fn test_rss_config() {
        let config = SourceConfig::from_json(r#"{"type": "rss", "url": "https://example.com/feed.xml"}"#).unwrap();
        assert!(matches!(config, SourceConfig::Rss(ref c) if c.title.is_none()));
        assert_eq!(config.kind(), "rss");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = SourceConfig::from_json(r#"{"type": "xpath", "url": "https://example.com"}"#);
        assert!(matches!(result, Err(FeedgenError::ConfigError(_))));
    }

    #[test]
    fn test_bad_selector_fails_before_fetch() {
        let config = SourceConfig::from_json(
            r#"{"url": "https://example.com", "title": "x", "item_selectors": {"container": "li", "title": "a[["}}"#,
        )
        .unwrap();
        assert!(matches!(config.into_source("x"), Err(FeedgenError::InvalidSelector { .. })));
    }

    #[test]
    fn test_require_store() {
        let fetcher = crate::fetch::StaticFetcher::new();
        let ctx = RunContext::new(&fetcher, OffsetDateTime::UNIX_EPOCH);
        assert!(matches!(ctx.require_store("syzbot"), Err(FeedgenError::ConfigError(_))));
    }
}
