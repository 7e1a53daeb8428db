//! Re-anchoring against changed pages

use wiki_anchor::codec::Target;
use wiki_anchor::dom::{FixedLayout, Rect};
use wiki_anchor::hash::content_hash;
use wiki_anchor::{
    AnchorConfig, CommentAnchor, Document, Reanchorer, StrategyRegistry, UNRESOLVED_OCCURRENCE,
};

fn page(body: &str) -> Document {
    Document::parse(&format!(
        r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><div class="header">the cat</div><div class="page">{}</div></body></html>"#,
        body
    ))
    .unwrap()
}

#[test]
fn test_second_cat_resolves_at_offset_19() {
    let doc = page("<p>the cat sat on the cat mat</p>");
    let r = Reanchorer::with_defaults(AnchorConfig::default());
    let located = r.locate(&doc, "cat|1").unwrap();
    let Target::Text { range } = located.target else {
        panic!("expected a text target");
    };
    assert_eq!(range.start.offset, 19);
    assert_eq!(range.end.offset, 22);
}

#[test]
fn test_sentinel_and_missing_occurrences_are_broken() {
    let mut doc = page("<p>the cat sat on the cat mat</p>");
    let mut comments = vec![
        CommentAnchor::new("a", format!("cat|{}", UNRESOLVED_OCCURRENCE)),
        CommentAnchor::new("b", "cat|2"),
        CommentAnchor::new("c", "cat|0"),
    ];
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let report = r.load_all(&mut doc, &mut comments);
    assert_eq!(report.resolved_count, 1);
    assert!(report.is_broken("a"));
    assert!(report.is_broken("b"));
    assert!(!report.is_broken("c"));
}

#[test]
fn test_one_removed_target_breaks_only_its_comment() {
    let original = "<p>alpha beta gamma delta epsilon</p>";
    let edited = "<p>alpha beta delta epsilon</p>";
    let words = ["alpha", "beta", "gamma", "delta", "epsilon"];
    let mut comments: Vec<CommentAnchor> = words
        .iter()
        .enumerate()
        .map(|(i, w)| CommentAnchor::new(i.to_string(), format!("{}|0", w)))
        .collect();

    let mut doc = page(original);
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    assert_eq!(r.load_all(&mut doc, &mut comments).resolved_count, 5);

    let mut doc = page(edited);
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let report = r.load_all(&mut doc, &mut comments);
    assert_eq!(report.resolved_count, 4);
    assert_eq!(report.broken.len(), 1);
    assert_eq!(report.broken[0].data_id, "2");
    assert!(comments[2].element_pos.is_none());
}

#[test]
fn test_additive_edit_keeps_anchor() {
    let mut comments = vec![CommentAnchor::new("1", "cat|1")];
    let mut doc = page("<p>the cat sat on the cat mat</p><p>A new paragraph.</p>");
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let report = r.load_all(&mut doc, &mut comments);
    assert_eq!(report.resolved_count, 1);
    let html = doc.to_html(doc.root());
    assert!(html.contains(r#"the <span data-comment-id="1" class="marker-1">cat</span> mat"#));
}

#[test]
fn test_markup_descriptor_matches_plain_text() {
    let mut doc = page("<p>Hello there, <em>Hello</em> again</p>");
    let mut comments = vec![
        CommentAnchor::new("raw", "<b>Hello</b>|0"),
        CommentAnchor::new("escaped", "&lt;b&gt;Hello&lt;/b&gt;|1"),
    ];
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let report = r.load_all(&mut doc, &mut comments);
    assert_eq!(report.resolved_count, 2);
    for h in &report.highlights {
        let marker = h.target.unwrap();
        assert_eq!(doc.text_content(marker), "Hello");
    }
}

#[test]
fn test_image_survives_container_reflow() {
    let mut doc = page(r#"<figure class="thumb"><img src="/files/chart.png"/></figure>"#);
    let img = doc.elements_by_tag(doc.root(), "img")[0];
    let figure = doc.parent(img).unwrap();

    let before = FixedLayout::new()
        .with(img, Rect::new(10.0, 100.0, 320.0, 200.0))
        .with(figure, Rect::new(0.0, 90.0, 400.0, 220.0));
    let hash = content_hash(&doc, img, &before).unwrap();

    // The container moved and grew; the image kept its size
    let after = FixedLayout::new()
        .with(img, Rect::new(60.0, 480.0, 320.0, 200.0))
        .with(figure, Rect::new(40.0, 470.0, 600.0, 260.0));
    let mut r = Reanchorer::new(
        AnchorConfig::default(),
        StrategyRegistry::with_defaults(),
        Box::new(after),
    );
    let mut comments = vec![CommentAnchor::new("img", format!("img[{}]", hash))];
    let report = r.load_all(&mut doc, &mut comments);

    assert_eq!(report.resolved_count, 1);
    assert_eq!(report.highlights[0].target, Some(figure));
    assert_eq!(doc.attr(figure, "class"), Some("thumb marker-img"));
    assert_eq!(comments[0].element_pos.map(|p| p.top), Some(470.0));
}

#[test]
fn test_resized_image_is_broken() {
    let mut doc = page(r#"<p><img src="/a.png" width="10" height="10"/></p>"#);
    let img = doc.elements_by_tag(doc.root(), "img")[0];
    let hash = content_hash(&doc, img, &wiki_anchor::dom::AttributeLayout).unwrap();
    doc.set_attr(img, "width", "20");

    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let mut comments = vec![CommentAnchor::new("1", format!("img[{}]", hash))];
    let report = r.load_all(&mut doc, &mut comments);
    assert!(report.is_broken("1"));
}

#[test]
fn test_selector_anchor_on_block() {
    let mut doc = page(r#"<div id="intro"><p>one</p><p>two</p></div>"#);
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let mut comments = vec![CommentAnchor::new(
        "s",
        r#"div[id="intro"] > p:nth-of-type(2)"#,
    )];
    let report = r.load_all(&mut doc, &mut comments);
    let marker = report.highlights[0].target.unwrap();
    assert_eq!(doc.text_content(marker), "two");
    assert_eq!(doc.attr(marker, "data-comment-id"), Some("s"));
}

#[test]
fn test_teardown_restores_the_whole_tree() {
    let mut doc = page(
        r#"<p class="lead">Hello <b>brave new</b> world, hello again.</p><figure><img src="/x.png" width="5" height="5"/></figure><div id="box"><p>block</p></div>"#,
    );
    let original = doc.to_html(doc.root());
    let text = doc.text_content(doc.root());
    let img = doc.elements_by_tag(doc.root(), "img")[0];
    let hash = content_hash(&doc, img, &wiki_anchor::dom::AttributeLayout).unwrap();

    let mut comments = vec![
        CommentAnchor::new("1", "Hello brave|0"),
        CommentAnchor::new("2", "new world|0"),
        CommentAnchor::new("3", "lo again|0"),
        CommentAnchor::new("4", format!("img[{}]", hash)),
        CommentAnchor::new("5", r#"div[id="box"] > p:nth-of-type(1)"#),
        CommentAnchor::new("6", "brave new world, hello|0"),
    ];
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let report = r.load_all(&mut doc, &mut comments);
    assert_eq!(report.resolved_count, 6);
    assert_ne!(doc.to_html(doc.root()), original);
    assert_eq!(doc.text_content(doc.root()), text);

    r.teardown_all(&mut doc);
    assert_eq!(doc.to_html(doc.root()), original);
}

#[test]
fn test_partial_teardown_keeps_foreign_classes() {
    let mut doc = page(r#"<p id="p" class="keep me">some text</p>"#);
    let p = doc.element_by_id("p").unwrap();
    let mut comments = vec![
        CommentAnchor::new("1", r#"p[id="p"]"#),
        CommentAnchor::new("2", "some|0"),
    ];
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    r.load_all(&mut doc, &mut comments);
    assert_eq!(doc.attr(p, "class"), Some("keep me marker-1"));

    r.teardown(&mut doc, &["1".to_string()]);
    assert_eq!(doc.attr(p, "class"), Some("keep me"));
    assert!(doc.attr(p, "data-comment-id").is_none());
    assert!(doc.to_html(doc.root()).contains("marker-2"));
}

#[test]
fn test_nested_markers_are_transparent_to_search() {
    let mut doc = page("<p>Hello world</p>");
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let mut first = vec![CommentAnchor::new("1", "lo wo|0")];
    r.load_all(&mut doc, &mut first);

    let mut second = vec![CommentAnchor::new("2", "Hello world|0")];
    let report = r.load_all(&mut doc, &mut second);
    assert_eq!(report.resolved_count, 1);
    let marker = report.highlights[0].target.unwrap();
    assert_eq!(doc.text_content(marker), "Hello world");

    let inner = doc
        .descendants(doc.root())
        .into_iter()
        .find(|&n| doc.text(n) == Some("lo wo"))
        .unwrap();
    assert_eq!(r.comment_at(&doc, inner), Some("1"));
}

#[test]
fn test_html_page_anchors_like_xhtml() {
    let mut doc = Document::parse(
        r#"<html><body><div class="header">the cat</div><div class="page"><p>the cat<br>sat on the cat mat &nbsp;<img src="/a.png"></div></body></html>"#,
    )
    .unwrap();
    let mut comments = vec![CommentAnchor::new("1", "cat|1")];
    let mut r = Reanchorer::with_defaults(AnchorConfig::default());
    let report = r.load_all(&mut doc, &mut comments);
    assert_eq!(report.resolved_count, 1);
    let html = doc.to_html(doc.root());
    assert!(html.contains(r#"the <span data-comment-id="1" class="marker-1">cat</span> mat"#));
}
