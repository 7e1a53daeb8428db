//! Search Performance Benchmarks
//!
//! Occurrence search and bulk re-anchoring over generated wiki pages.
//!
//! Run with: `cargo bench --bench search_performance`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use wiki_anchor::{find_nth, AnchorConfig, CommentAnchor, Document, Reanchorer, SearchOptions};

/// Build a page with `paragraphs` paragraphs of repeated, lightly marked-up text
fn create_page(paragraphs: usize) -> String {
    let mut html = String::from(r#"<html><body><div class="page">"#);
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p>Paragraph {} mentions the <b>cat</b> and the <i>cat mat</i> once more.</p>",
            i
        ));
    }
    html.push_str("</div></body></html>");
    html
}

fn bench_find_nth(c: &mut Criterion) {
    let doc = Document::parse(&create_page(500)).unwrap();
    let options = SearchOptions::default();

    let mut group = c.benchmark_group("occurrence_search");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("first_occurrence", |b| {
        b.iter(|| find_nth(&doc, doc.root(), black_box("cat"), 0, options))
    });

    group.bench_function("last_occurrence", |b| {
        b.iter(|| find_nth(&doc, doc.root(), black_box("cat"), 999, options))
    });

    group.bench_function("case_insensitive", |b| {
        let options = SearchOptions {
            case_sensitive: false,
            ..options
        };
        b.iter(|| find_nth(&doc, doc.root(), black_box("PARAGRAPH 250"), 0, options))
    });

    group.finish();
}

fn bench_load_all(c: &mut Criterion) {
    let page = create_page(200);
    let comments: Vec<CommentAnchor> = (0..50)
        .map(|i| CommentAnchor::new(i.to_string(), format!("Paragraph {} mentions|0", i * 4)))
        .collect();

    let mut group = c.benchmark_group("reanchor");
    group.sample_size(20);

    group.bench_function("load_50_comments", |b| {
        b.iter(|| {
            let mut doc = Document::parse(&page).unwrap();
            let mut comments = comments.clone();
            let mut reanchorer = Reanchorer::with_defaults(AnchorConfig::default());
            black_box(reanchorer.load_all(&mut doc, &mut comments))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_find_nth, bench_load_all);
criterion_main!(benches);
