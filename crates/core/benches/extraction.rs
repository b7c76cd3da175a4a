use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use feedgen_core::{
    Document, FieldMap, ItemSelectors, Policy, ReconciliationState, TrackedRecord, compile, extract, reconcile,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

fn synthetic_listing(rows: usize) -> String {
    let body: String = (0..rows)
        .map(|i| {
            format!(
                r#"<tr class="row"><td class="title"><a href="/bug?id={i:08x}">crash number {i}</a></td><td class="stat">C</td><td class="when">2024-01-{day:02}</td></tr>"#,
                day = i % 28 + 1
            )
        })
        .collect();
    format!("<html><body><table class=\"list\"><tbody>{}</tbody></table></body></html>", body)
}

fn listing_map() -> FieldMap {
    let config = ItemSelectors {
        container: "table.list tr.row".to_string(),
        title: "td.title".to_string(),
        link: "td.title a".to_string(),
        created: "td.when".to_string(),
        created_format: "[year]-[month]-[day]".to_string(),
        ..Default::default()
    };
    FieldMap::from_config(&config).unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for rows in [50, 500, 5000] {
        let html = synthetic_listing(rows);
        group.bench_with_input(BenchmarkId::new("rows", rows), &html, |b, html| {
            b.iter(|| Document::parse(black_box(html)))
        });
    }
    group.finish();
}

fn bench_selector(c: &mut Criterion) {
    let html = synthetic_listing(500);
    let doc = Document::parse(&html).unwrap();
    let sel = compile("table.list tr.row td.title a").unwrap();

    c.bench_function("match_all", |b| b.iter(|| sel.match_all(black_box(&doc.root())).len()));
}

fn bench_extract(c: &mut Criterion) {
    let map = listing_map();
    let mut group = c.benchmark_group("extract");
    for rows in [50, 500] {
        let html = synthetic_listing(rows);
        let doc = Document::parse(&html).unwrap();
        group.bench_with_input(BenchmarkId::new("rows", rows), &doc, |b, doc| {
            b.iter(|| extract(&map, black_box(doc), "https://example.com/list"))
        });
    }
    group.finish();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Row(u64);

impl TrackedRecord for Row {
    type Key = u64;

    fn key(&self) -> u64 {
        self.0
    }
}

fn bench_reconcile(c: &mut Criterion) {
    let now = OffsetDateTime::UNIX_EPOCH;
    let known = reconcile((0..5000).map(Row), ReconciliationState::default(), Policy::Unbounded, now).state;

    c.bench_function("reconcile_unchanged_5000", |b| {
        b.iter(|| reconcile((0..5000).map(Row), black_box(known.clone()), Policy::Unbounded, now))
    });
}

criterion_group!(benches, bench_parse, bench_selector, bench_extract, bench_reconcile);
criterion_main!(benches);
