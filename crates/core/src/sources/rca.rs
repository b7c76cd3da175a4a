use std::cmp::Ordering;
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{FeedSource, RunContext};
use crate::Result;
use crate::assemble::{ItemHooks, assemble};
use crate::extract::{FieldMap, FieldName, extract};
use crate::fetch::Request;
use crate::item::{FeedItem, FeedMeta};
use crate::parse::Document;
use crate::selector::{CompiledSelector, compile};
use crate::state::{Policy, TrackedRecord, reconcile};

pub const RCA_STATE_KEY: &str = "projectzerorca";

const DEFAULT_BASE: &str = "https://googleprojectzero.github.io/0days-in-the-wild";

/// One root-cause analysis, identified by its CVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaEntry {
    pub cve: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub link: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub disclosed: Option<OffsetDateTime>,
}

impl RcaEntry {
    /// `(year, number)` of a `CVE-<year>-<number>` id.
    fn cve_parts(&self) -> Option<(u32, u64)> {
        let mut parts = self.cve.strip_prefix("CVE-")?.splitn(2, '-');
        let year = parts.next()?.parse().ok()?;
        let number = parts.next()?.parse().ok()?;
        Some((year, number))
    }
}

impl TrackedRecord for RcaEntry {
    type Key = String;

    fn key(&self) -> String {
        self.cve.clone()
    }

    fn disclosed_at(&self) -> Option<OffsetDateTime> {
        self.disclosed
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.cve_parts().cmp(&other.cve_parts())
    }
}

/// Root-cause analyses of in-the-wild 0days, newest disclosure first.
#[derive(Debug, Clone)]
pub struct RcaSource {
    base: String,
    fields: FieldMap,
    author: CompiledSelector,
    hooks: ItemHooks,
}

impl RcaSource {
    pub fn new(hooks: ItemHooks) -> Result<Self> {
        let fields = FieldMap::new()
            .with(FieldName::Container, ".post-content table:first-of-type tr:not(:first-of-type):not(:last-of-type)")?
            .with(FieldName::Title, "td:first-of-type")?
            .with(FieldName::Link, "a:last-of-type")?;

        Ok(Self {
            base: DEFAULT_BASE.to_string(),
            fields,
            author: compile(".post-content p:first-of-type")?,
            hooks,
        })
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    fn listing_url(&self) -> String {
        format!("{}/rca.html", self.base)
    }

    /// Parses the listing table. Rows whose title is not `CVE: title` are skipped.
    pub fn entries_from_html(&self, html: &str) -> Result<Vec<RcaEntry>> {
        let doc = Document::parse(html)?;
        let extraction = extract(&self.fields, &doc, &self.base)?;

        let mut entries = Vec::new();
        for record in extraction.records {
            let raw = record.text(FieldName::Title).unwrap_or_default();
            let Some((cve, title)) = raw.split_once(':') else {
                tracing::warn!(title = %raw, "unexpected title in RCA table");
                continue;
            };
            entries.push(RcaEntry {
                cve: cve.trim().to_string(),
                title: title.trim().to_string(),
                author: String::new(),
                link: record.text(FieldName::Link).unwrap_or_default().to_string(),
                disclosed: None,
            });
        }
        Ok(entries)
    }

    /// Reads the author line of an RCA detail page.
    pub fn author_from_html(&self, html: &str) -> Result<String> {
        let doc = Document::parse(html)?;
        Ok(self.author.match_first(&doc.root()).map(|el| el.text().trim().to_string()).unwrap_or_default())
    }
}

#[async_trait]
impl FeedSource for RcaSource {
    fn name(&self) -> &str {
        "p0rca"
    }

    fn meta(&self) -> FeedMeta {
        FeedMeta {
            title: "Project Zero - Root Cause Analysis".to_string(),
            link: self.listing_url(),
            description: String::new(),
        }
    }

    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>> {
        let store = ctx.require_store(self.name())?;
        let body = ctx.fetcher.fetch(&Request::get(self.listing_url())).await?;
        let listed = self.entries_from_html(&body)?;
        let state = store.load_state::<RcaEntry>(RCA_STATE_KEY)?;

        let mut batch = Vec::with_capacity(listed.len());
        let mut seen = BTreeSet::new();
        for mut entry in listed {
            if state.is_known(&entry.cve) || !seen.insert(entry.cve.clone()) {
                continue;
            }
            tracing::info!(cve = %entry.cve, title = %entry.title, "new RCA");
            let detail = ctx.fetcher.fetch(&Request::get(&entry.link)).await?;
            entry.author = self.author_from_html(&detail)?;
            entry.disclosed = Some(ctx.now);
            batch.push(entry);
        }

        let result = reconcile(batch, state, Policy::Unbounded, ctx.now);
        store.commit(RCA_STATE_KEY, &result)?;

        let candidates = result
            .entries()
            .map(|entry| {
                let rca = &entry.record;
                FeedItem {
                    title: format!("{}: {}", rca.cve, rca.title),
                    link: rca.link.clone(),
                    author: rca.author.clone(),
                    id: rca.cve.clone(),
                    description: String::new(),
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
    use time::macros::datetime;

    const LISTING: &str = r#"
        <div class="post-content">
            <table>
                <tr><th>Title</th></tr>
                <tr><td>CVE-2021-1870: WebKit UAF</td><td><a href="x">old</a><a href="2021/CVE-2021-1870.html">RCA</a></td></tr>
                <tr><td>CVE-2021-30551: V8 type confusion</td><td><a href="2021/CVE-2021-30551.html">RCA</a></td></tr>
                <tr><td>CVE-2020-15999: FreeType overflow</td><td><a href="https://elsewhere.test/2020.html">RCA</a></td></tr>
                <tr><td>Not a CVE row</td></tr>
                <tr><td>footer</td></tr>
            </table>
        </div>
    "#;

    fn detail(author: &str) -> String {
        format!(r#"<div class="post-content"><p>{author}</p><p>2021-06-01</p></div>"#)
    }

    fn fetcher() -> StaticFetcher {
        StaticFetcher::new()
            .with("https://rca.test/rca.html", LISTING)
            .with("https://rca.test/2021/CVE-2021-1870.html", detail("Maddie Stone"))
            .with("https://rca.test/2021/CVE-2021-30551.html", detail("Sergei Glazunov"))
            .with("https://elsewhere.test/2020.html", detail("Sergei Glazunov"))
    }

    #[test]
    fn test_listing_rows_are_parsed() {
        let source = RcaSource::new(ItemHooks::new()).unwrap().with_base_url("https://rca.test");
        let entries = source.entries_from_html(LISTING).unwrap();

        let cves: Vec<_> = entries.iter().map(|e| e.cve.as_str()).collect();
        assert_eq!(cves, vec!["CVE-2021-1870", "CVE-2021-30551", "CVE-2020-15999"]);
        assert_eq!(entries[0].title, "WebKit UAF");
        assert_eq!(entries[0].link, "https://rca.test/2021/CVE-2021-1870.html");
    }

    #[test]
    fn test_tie_break_orders_by_year_then_number() {
        let entry = |cve: &str| RcaEntry {
            cve: cve.to_string(),
            title: String::new(),
            author: String::new(),
            link: String::new(),
            disclosed: None,
        };
        assert_eq!(entry("CVE-2021-30551").tie_break(&entry("CVE-2021-1870")), Ordering::Greater);
        assert_eq!(entry("CVE-2020-99999").tie_break(&entry("CVE-2021-1")), Ordering::Less);
    }

    #[tokio::test]
    async fn test_authors_fetched_only_for_new_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let source = RcaSource::new(ItemHooks::new()).unwrap().with_base_url("https://rca.test");
        let now = datetime!(2024-01-01 0:00 UTC);

        let first = fetcher();
        let items = source.produce_items(&RunContext::new(&first, now).with_store(&store)).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2021-30551", "CVE-2021-1870", "CVE-2020-15999"]);
        assert_eq!(items[0].author, "Sergei Glazunov");
        assert_eq!(items[0].title, "CVE-2021-30551: V8 type confusion");
        assert_eq!(first.requests().len(), 4);

        let second = fetcher();
        let items = source.produce_items(&RunContext::new(&second, now).with_store(&store)).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(second.requests().len(), 1);
    }
}
