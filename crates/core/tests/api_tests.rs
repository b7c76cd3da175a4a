//! Library API integration tests
use std::sync::{Arc, Mutex};

use feedgen_core::*;
use serde::{Deserialize, Serialize};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn listing() -> String {
    std::fs::read_to_string(get_fixture_path("listing.html")).unwrap()
}

fn changelog_source() -> Box<dyn FeedSource> {
    let path = get_fixture_path("configs/changelog.json");
    SourceConfig::from_file(std::path::Path::new(&path)).unwrap().into_source("changelog").unwrap()
}

fn listing_map() -> FieldMap {
    let config = ItemSelectors {
        container: "article.entry".to_string(),
        title: "h2.entry-title".to_string(),
        link: "h2.entry-title a".to_string(),
        author: ".byline".to_string(),
        created: "time.published".to_string(),
        created_format: "[year]-[month]-[day] [hour]:[minute]".to_string(),
        updated: "time.modified".to_string(),
        updated_format: "[year]-[month]-[day] [hour]:[minute]".to_string(),
        ..Default::default()
    };
    FieldMap::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_css_source_from_config_file() {
    let fetcher = StaticFetcher::new().with("https://example.com/blog", listing());
    let ctx = RunContext::new(&fetcher, datetime!(2024-04-01 0:00 UTC));

    let feed = build_feed(changelog_source().as_ref(), &ctx).await.unwrap();
    assert_eq!(feed.title, "Changelog");
    assert_eq!(feed.link, "https://example.com/blog");
    assert_eq!(feed.items.len(), 4);

    let first = &feed.items[0];
    assert_eq!(first.title, "Release 1.4.0");
    assert_eq!(first.link, "https://example.com/blog/releases/1.4.0");
    assert_eq!(first.author, "Grace Hopper");
    assert_eq!(first.description, "<p>Faster <em>selector</em> matching.</p>");
    assert_eq!(first.updated, Some(datetime!(2024-03-20 16:00 UTC)));
    assert_eq!(first.created, first.updated);

    let second = &feed.items[1];
    assert_eq!(second.link, "https://example.com/blog/releases/1.3.2");
    assert_eq!(second.author, "");
    assert_eq!(second.created, Some(datetime!(2024-02-02 12:00 UTC)));

    assert_eq!(feed.items[3].link, "https://mirror.example.net/1.3.0");
}

#[test]
fn test_field_failures_do_not_abort_the_batch() {
    let doc = Document::parse(&listing()).unwrap();
    let extraction = extract(&listing_map(), &doc, "https://example.com/blog").unwrap();

    assert_eq!(extraction.records.len(), 4);
    let broken = &extraction.records[2];
    assert_eq!(broken.text(FieldName::Title), Some("Release 1.3.1"));
    assert_eq!(broken.text(FieldName::Link), Some(""));
    assert_eq!(broken.timestamp(FieldName::Created), None);
    assert_eq!(broken.text(FieldName::Author), Some("Alan Turing"));

    let kinds: Vec<_> = extraction.issues.iter().filter(|i| i.record == 2).map(|i| &i.kind).collect();
    assert!(kinds.contains(&&FieldIssueKind::MissingHref));
    assert!(kinds.iter().any(|k| matches!(k, FieldIssueKind::InvalidTimestamp { .. })));

    assert_eq!(extraction.records[3].text(FieldName::Title), Some("Release 1.3.0"));
}

#[test]
fn test_modify_runs_before_filter_and_order_is_kept() {
    let doc = Document::parse(&listing()).unwrap();
    let candidates: Vec<FeedItem> = extract(&listing_map(), &doc, "https://example.com/blog")
        .unwrap()
        .records
        .into_iter()
        .map(FeedItem::from)
        .collect();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&observed);
    let hooks = ItemHooks::new()
        .with_modifier(|item| {
            if item.updated.is_some() {
                item.created = item.updated;
            }
        })
        .with_filter(move |item| {
            log.lock().unwrap().push((item.title.clone(), item.created));
            !item.author.is_empty()
        });

    let out = assemble(candidates, &hooks);

    let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Release 1.4.0", "Release 1.3.1", "Release 1.3.0"]);

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 4);
    assert_eq!(observed[0].1, Some(datetime!(2024-03-20 16:00 UTC)));
    assert_eq!(observed[3].1, Some(datetime!(2024-01-06 08:00 UTC)));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Advisory {
    id: String,
    summary: String,
}

impl TrackedRecord for Advisory {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

fn advisories(ids: &[&str]) -> Vec<Advisory> {
    ids.iter().map(|id| Advisory { id: id.to_string(), summary: format!("advisory {}", id) }).collect()
}

#[test]
fn test_reconciliation_is_idempotent_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let now = datetime!(2024-01-01 0:00 UTC);

    let first = store.reconcile("advisories", advisories(&["a", "b"]), Policy::recency(), now).unwrap();
    let second =
        store.reconcile("advisories", advisories(&["a", "b"]), Policy::recency(), now + Duration::days(1)).unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(first.ordered, second.ordered);
}

#[test]
fn test_recency_cap_holds_across_many_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let start = datetime!(2024-01-01 0:00 UTC);

    let mut last = None;
    for run in 0..30i64 {
        let id = format!("id-{:02}", run);
        let result = store
            .reconcile("advisories", advisories(&[id.as_str()]), Policy::recency(), start + Duration::minutes(run))
            .unwrap();
        assert!(result.state.recent.len() <= DEFAULT_RECENT_CAPACITY);
        last = Some(result);
    }

    let last = last.unwrap();
    assert_eq!(last.ordered.len(), DEFAULT_RECENT_CAPACITY);
    assert_eq!(last.ordered.first().map(String::as_str), Some("id-29"));
    assert_eq!(last.ordered.last().map(String::as_str), Some("id-10"));
    assert_eq!(last.state.known.len(), 30);
}

#[test]
fn test_vanished_records_are_rebuilt_from_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let now = OffsetDateTime::UNIX_EPOCH;

    store.reconcile("advisories", advisories(&["gone"]), Policy::recency(), now).unwrap();
    let result = store.reconcile("advisories", advisories(&["fresh"]), Policy::recency(), now).unwrap();

    let summaries: Vec<_> = result.entries().map(|e| e.record.summary.as_str()).collect();
    assert_eq!(summaries, vec!["advisory fresh", "advisory gone"]);
}

#[tokio::test]
async fn test_rendered_feed_parses_back() {
    let fetcher = StaticFetcher::new().with("https://example.com/blog", listing());
    let ctx = RunContext::new(&fetcher, datetime!(2024-04-01 0:00 UTC));
    let feed = build_feed(changelog_source().as_ref(), &ctx).await.unwrap();

    for format in [OutputFormat::Rss, OutputFormat::Atom, OutputFormat::Json] {
        let rendered = format.render(&feed).unwrap();
        let parsed = feed_rs::parser::parse(rendered.as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 4, "{format} should carry every item");
    }
}
