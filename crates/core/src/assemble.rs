//! Feed assembly: per-item mutation and filtering.
//!
//! Hooks are fixed when an [`ItemHooks`] value is built and never change
//! afterwards. For each candidate the modifier runs first, then the filter
//! sees the modified item. Survivors keep their input order.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::item::FeedItem;
use crate::{FeedgenError, Result};

/// Returns `false` for items that should be dropped.
pub type ItemFilter = Arc<dyn Fn(&FeedItem) -> bool + Send + Sync>;

/// Rewrites an item in place before it is filtered.
pub type ItemModifier = Arc<dyn Fn(&mut FeedItem) + Send + Sync>;

/// Declarative item rules as they appear in a source configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRules {
    /// Copy `updated` into `created` so edited entries show up as new.
    pub resurface_updated: bool,
    /// Drop items with an empty author.
    pub require_author: bool,
    /// Drop items whose title matches this regular expression.
    pub exclude_title: Option<String>,
    /// Keep at most this many items after filtering.
    pub max_items: Option<usize>,
}

/// Filter and modifier hooks for [`assemble`].
#[derive(Clone, Default)]
pub struct ItemHooks {
    filter: Option<ItemFilter>,
    modifier: Option<ItemModifier>,
    max_items: Option<usize>,
}

impl ItemHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Fn(&FeedItem) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_modifier(mut self, modifier: impl Fn(&mut FeedItem) + Send + Sync + 'static) -> Self {
        self.modifier = Some(Arc::new(modifier));
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Copies `updated` over `created` for every item that has one.
    pub fn resurface_updated(self) -> Self {
        self.with_modifier(|item| {
            if item.updated.is_some() {
                item.created = item.updated;
            }
        })
    }

    /// Builds hooks from declarative rules.
    ///
    /// # Errors
    ///
    /// Returns [`FeedgenError::ConfigError`] if `exclude_title` is not a valid
    /// regular expression.
    pub fn from_rules(rules: &ItemRules) -> Result<Self> {
        let mut hooks = Self::new();

        if rules.resurface_updated {
            hooks = hooks.resurface_updated();
        }

        let exclude = rules
            .exclude_title
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()
            .map_err(|e| FeedgenError::ConfigError(format!("Invalid exclude_title pattern: {}", e)))?;

        let require_author = rules.require_author;
        if require_author || exclude.is_some() {
            hooks = hooks.with_filter(move |item| {
                if require_author && item.author.trim().is_empty() {
                    return false;
                }
                !exclude.as_ref().is_some_and(|re| re.is_match(&item.title))
            });
        }

        if let Some(max) = rules.max_items {
            hooks = hooks.with_max_items(max);
        }

        Ok(hooks)
    }

    pub fn max_items(&self) -> Option<usize> {
        self.max_items
    }
}

impl fmt::Debug for ItemHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemHooks")
            .field("filter", &self.filter.is_some())
            .field("modifier", &self.modifier.is_some())
            .field("max_items", &self.max_items)
            .finish()
    }
}

/// Runs `candidates` through `hooks`, keeping their order.
pub fn assemble(candidates: Vec<FeedItem>, hooks: &ItemHooks) -> Vec<FeedItem> {
    let total = candidates.len();
    let mut out = Vec::with_capacity(total);

    for mut item in candidates {
        if let Some(modify) = &hooks.modifier {
            modify(&mut item);
        }
        if let Some(keep) = &hooks.filter
            && !keep(&item)
        {
            continue;
        }
        out.push(item);
    }

    if let Some(max) = hooks.max_items {
        out.truncate(max);
    }

    tracing::debug!(candidates = total, kept = out.len(), "assembled items");
    out
}
