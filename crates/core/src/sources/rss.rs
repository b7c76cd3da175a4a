use async_trait::async_trait;
use feed_rs::parser;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{FeedSource, RunContext};
use crate::assemble::{ItemHooks, ItemRules, assemble};
use crate::fetch::Request;
use crate::item::{Feed, FeedItem, FeedMeta};
use crate::{FeedgenError, Result};

/// Configuration of an upstream feed that is re-published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RssConfig {
    pub url: String,
    /// Replaces the upstream feed title.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub rules: ItemRules,
}

/// Re-publishes an RSS, Atom or JSON feed through item hooks.
#[derive(Debug, Clone)]
pub struct RssSource {
    name: String,
    url: String,
    title: Option<String>,
    hooks: ItemHooks,
}

impl RssSource {
    pub fn new(name: &str, url: &str, hooks: ItemHooks) -> Result<Self> {
        if url.is_empty() {
            return Err(FeedgenError::ConfigError("Missing url for upstream feed".to_string()));
        }
        Ok(Self { name: name.to_string(), url: url.to_string(), title: None, hooks })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn from_config(name: &str, config: &RssConfig) -> Result<Self> {
        let source = Self::new(name, &config.url, ItemHooks::from_rules(&config.rules)?)?;
        Ok(match &config.title {
            Some(title) => source.with_title(title),
            None => source,
        })
    }

    /// Parses an upstream document into feed metadata and candidate items.
    pub fn parse_upstream(&self, body: &str) -> Result<(FeedMeta, Vec<FeedItem>)> {
        let upstream = parser::parse(body.as_bytes()).map_err(|e| FeedgenError::FeedParseError(e.to_string()))?;

        let meta = FeedMeta {
            title: self
                .title
                .clone()
                .or_else(|| upstream.title.map(|t| t.content))
                .unwrap_or_else(|| self.url.clone()),
            link: upstream.links.first().map(|l| l.href.clone()).unwrap_or_else(|| self.url.clone()),
            description: upstream.description.map(|d| d.content).unwrap_or_default(),
        };

        let items = upstream
            .entries
            .into_iter()
            .map(|entry| FeedItem {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                author: entry.authors.first().map(|p| p.name.clone()).unwrap_or_default(),
                id: entry.id,
                description: entry.summary.map(|s| s.content).unwrap_or_default(),
                content: entry.content.and_then(|c| c.body).unwrap_or_default(),
                created: entry.published.and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok()),
                updated: entry.updated.and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok()),
            })
            .collect();

        Ok((meta, items))
    }

    async fn fetch_upstream(&self, ctx: &RunContext<'_>) -> Result<(FeedMeta, Vec<FeedItem>)> {
        let body = ctx.fetcher.fetch(&Request::get(&self.url)).await?;
        let (meta, candidates) = self.parse_upstream(&body)?;
        Ok((meta, assemble(candidates, &self.hooks)))
    }
}

#[async_trait]
impl FeedSource for RssSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> FeedMeta {
        FeedMeta {
            title: self.title.clone().unwrap_or_else(|| self.url.clone()),
            link: self.url.clone(),
            description: String::new(),
        }
    }

    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>> {
        Ok(self.fetch_upstream(ctx).await?.1)
    }

    async fn produce_feed(&self, ctx: &RunContext<'_>) -> Result<Feed> {
        let (meta, items) = self.fetch_upstream(ctx).await?;
        Ok(Feed::new(meta, ctx.now, items))
    }
}
