use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{FeedSource, RunContext};
use crate::assemble::{ItemHooks, ItemRules, assemble};
use crate::extract::{FieldMap, ItemSelectors, extract};
use crate::fetch::Request;
use crate::item::{FeedItem, FeedMeta};
use crate::parse::Document;
use crate::{FeedgenError, Result};

/// Configuration of a selector-driven page source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CssConfig {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub item_selectors: ItemSelectors,
    #[serde(default)]
    pub rules: ItemRules,
}

/// Turns any HTML listing into feed items with a [`FieldMap`].
#[derive(Debug, Clone)]
pub struct CssSource {
    name: String,
    url: String,
    title: String,
    fields: FieldMap,
    hooks: ItemHooks,
}

impl CssSource {
    pub fn new(name: &str, url: &str, title: &str, fields: FieldMap, hooks: ItemHooks) -> Result<Self> {
        if url.is_empty() {
            return Err(FeedgenError::ConfigError("No url has been set for this feed".to_string()));
        }
        fields.validate()?;
        Ok(Self { name: name.to_string(), url: url.to_string(), title: title.to_string(), fields, hooks })
    }

    pub fn from_config(name: &str, config: &CssConfig) -> Result<Self> {
        let fields = FieldMap::from_config(&config.item_selectors)?;
        let hooks = ItemHooks::from_rules(&config.rules)?;
        Self::new(name, &config.url, &config.title, fields, hooks)
    }

    /// Extracts candidate items from an already fetched page.
    pub fn items_from_html(&self, html: &str) -> Result<Vec<FeedItem>> {
        let doc = Document::parse(html)?;
        let extraction = extract(&self.fields, &doc, &self.url)?;
        if !extraction.issues.is_empty() {
            tracing::warn!(source = %self.name, issues = extraction.issues.len(), "some fields could not be extracted");
        }
        Ok(extraction.records.into_iter().map(FeedItem::from).collect())
    }
}

#[async_trait]
impl FeedSource for CssSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> FeedMeta {
        FeedMeta { title: self.title.clone(), link: self.url.clone(), description: String::new() }
    }

    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>> {
        let body = ctx.fetcher.fetch(&Request::get(&self.url)).await?;
        let candidates = self.items_from_html(&body)?;
        Ok(assemble(candidates, &self.hooks))
    }
}
