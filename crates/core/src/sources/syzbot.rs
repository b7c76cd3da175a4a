use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{FeedSource, RunContext};
use crate::Result;
use crate::assemble::{ItemHooks, assemble};
use crate::extract::{FieldMap, FieldName, extract};
use crate::fetch::Request;
use crate::item::{FeedItem, FeedMeta};
use crate::parse::Document;
use crate::selector::{CompiledSelector, compile};
use crate::state::{Policy, TrackedRecord};

pub const SYZBOT_STATE_KEY: &str = "syzbot";

const DEFAULT_BASE: &str = "https://syzkaller.appspot.com";
const MAX_ITEMS: usize = 20;

/// A crash row of the upstream dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyzbotCrash {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub repro: String,
    #[serde(default)]
    pub bisect_status: String,
}

impl TrackedRecord for SyzbotCrash {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Upstream kernel crashes, newest discovery first.
#[derive(Debug, Clone)]
pub struct SyzbotSource {
    base: String,
    fields: FieldMap,
    repro: CompiledSelector,
    bisect: CompiledSelector,
    hooks: ItemHooks,
}

impl SyzbotSource {
    pub fn new(hooks: ItemHooks) -> Result<Self> {
        let fields = FieldMap::new()
            .with(FieldName::Container, "table.list_table:nth-of-type(2) tbody tr")?
            .with(FieldName::Title, "td.title")?
            .with(FieldName::Link, "td.title a")?;
        let hooks = match hooks.max_items() {
            Some(_) => hooks,
            None => hooks.with_max_items(MAX_ITEMS),
        };

        Ok(Self {
            base: DEFAULT_BASE.to_string(),
            fields,
            repro: compile("td.stat")?,
            bisect: compile("td.bisect_status")?,
            hooks,
        })
    }

    /// Points the source at another dashboard host.
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    fn listing_url(&self) -> String {
        format!("{}/upstream", self.base)
    }

    /// Parses the crash table. Rows whose link carries no `id` are skipped.
    pub fn crashes_from_html(&self, html: &str) -> Result<Vec<SyzbotCrash>> {
        let doc = Document::parse(html)?;
        let extraction = extract(&self.fields, &doc, &self.listing_url())?;
        let container = self.fields.selector(FieldName::Container);
        let rows = container.map(|c| c.match_all(&doc.root())).unwrap_or_default();

        let mut crashes = Vec::with_capacity(rows.len());
        for (record, row) in extraction.records.iter().zip(rows.iter()) {
            let title = record.text(FieldName::Title).unwrap_or_default().to_string();
            let Some(id) = record.text(FieldName::Link).and_then(crash_id) else {
                tracing::debug!(title = %title, "skipping row without crash id");
                continue;
            };

            let text_of = |sel: &CompiledSelector| sel.match_first(row).map(|el| el.text().trim().to_string());
            crashes.push(SyzbotCrash {
                id,
                title,
                repro: text_of(&self.repro).unwrap_or_default(),
                bisect_status: text_of(&self.bisect).unwrap_or_default(),
            });
        }
        Ok(crashes)
    }
}

fn crash_id(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.query_pairs().find(|(k, _)| k == "id").map(|(_, v)| v.into_owned()).filter(|id| !id.is_empty())
}

#[async_trait]
impl FeedSource for SyzbotSource {
    fn name(&self) -> &str {
        "syzbot"
    }

    fn meta(&self) -> FeedMeta {
        FeedMeta {
            title: "Syzbot - Upstream Crashes".to_string(),
            link: self.listing_url(),
            description: String::new(),
        }
    }

    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>> {
        let store = ctx.require_store(self.name())?;
        let body = ctx.fetcher.fetch(&Request::get(self.listing_url())).await?;
        let crashes = self.crashes_from_html(&body)?;

        let result = store.reconcile(SYZBOT_STATE_KEY, crashes, Policy::Unbounded, ctx.now)?;
        let candidates = result
            .entries()
            .map(|entry| {
                let crash = &entry.record;
                FeedItem {
                    title: crash.title.clone(),
                    link: format!("{}/bug?id={}", self.base, crash.id),
                    author: "Syzbot".to_string(),
                    id: crash.id.clone(),
                    description: format!("repro: {} / bisect: {}", crash.repro, crash.bisect_status),
                    content: String::new(),
                    created: Some(entry.observed),
                    updated: Some(entry.observed),
                }
            })
            .collect();

        Ok(assemble(candidates, &self.hooks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::store::StateStore;
    use time::Duration;
    use time::macros::datetime;

    fn page(rows: &[(&str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(id, title)| {
                format!(
                    r#"<tr><td class="title"><a href="/bug?id={id}">{title}</a></td><td class="stat">C</td><td class="bisect_status">done</td></tr>"#
                )
            })
            .collect();
        format!(
            r#"<html><body><table class="list_table"><tbody><tr><td>open</td></tr></tbody></table>
            <table class="list_table"><tbody>{body}<tr><td class="title">no link</td></tr></tbody></table></body></html>"#
        )
    }

    #[test]
    fn test_crash_rows_are_parsed() {
        let source = SyzbotSource::new(ItemHooks::new()).unwrap();
        let crashes = source.crashes_from_html(&page(&[("abc", "KASAN: use-after-free"), ("def", "WARNING")])).unwrap();

        assert_eq!(crashes.len(), 2);
        assert_eq!(crashes[0].id, "abc");
        assert_eq!(crashes[0].title, "KASAN: use-after-free");
        assert_eq!(crashes[0].repro, "C");
        assert_eq!(crashes[0].bisect_status, "done");
    }

    #[tokio::test]
    async fn test_new_crashes_come_first_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let source = SyzbotSource::new(ItemHooks::new()).unwrap().with_base_url("https://syz.test");
        let t0 = datetime!(2024-01-01 0:00 UTC);

        let first = StaticFetcher::new().with("https://syz.test/upstream", page(&[("a", "A")]));
        let ctx = RunContext::new(&first, t0).with_store(&store);
        let items = source.produce_items(&ctx).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://syz.test/bug?id=a");
        assert_eq!(items[0].created, Some(t0));

        let second = StaticFetcher::new().with("https://syz.test/upstream", page(&[("b", "B")]));
        let ctx = RunContext::new(&second, t0 + Duration::hours(1)).with_store(&store);
        let items = source.produce_items(&ctx).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let source = SyzbotSource::new(ItemHooks::new()).unwrap().with_base_url("https://syz.test");

        let ids: Vec<String> = (0..30).map(|i| format!("c{}", i)).collect();
        let rows: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "crash")).collect();
        let fetcher = StaticFetcher::new().with("https://syz.test/upstream", page(&rows));
        let ctx = RunContext::new(&fetcher, datetime!(2024-01-01 0:00 UTC)).with_store(&store);

        assert_eq!(source.produce_items(&ctx).await.unwrap().len(), MAX_ITEMS);
    }

    #[test]
    fn test_crash_id_from_link() {
        assert_eq!(crash_id("https://syzkaller.appspot.com/bug?id=123abc"), Some("123abc".to_string()));
        assert_eq!(crash_id("https://syzkaller.appspot.com/bug?extid=1"), None);
        assert_eq!(crash_id(""), None);
    }
}
