//! HTML serialisation

use std::collections::HashMap;

use super::{Document, NodeData, NodeId, TextIndex, TextRange};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn open_tag(doc: &Document, id: NodeId, out: &mut String) {
    let Some(el) = doc.element(id) else {
        return;
    };
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
    if VOID_ELEMENTS.contains(&el.name.as_str()) && doc.children(id).is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
    }
}

fn close_tag(doc: &Document, id: NodeId, out: &mut String) {
    let Some(el) = doc.element(id) else {
        return;
    };
    if VOID_ELEMENTS.contains(&el.name.as_str()) && doc.children(id).is_empty() {
        return;
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let Some(data) = doc.data(id) else {
        return;
    };
    match data {
        NodeData::Document => {
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        NodeData::Text(t) => out.push_str(&html_escape::encode_text(t)),
        NodeData::Element(_) => {
            open_tag(doc, id, out);
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
            close_tag(doc, id, out);
        }
    }
}

pub(super) fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

pub(super) fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for &child in doc.children(id) {
        write_node(doc, child, &mut out);
    }
    out
}

fn collect_spans(doc: &Document, id: NodeId, pos: &mut usize, spans: &mut HashMap<NodeId, (usize, usize)>) {
    let start = *pos;
    if let Some(t) = doc.text(id) {
        *pos += t.len();
    } else {
        for &child in doc.children(id) {
            collect_spans(doc, child, pos, spans);
        }
    }
    spans.insert(id, (start, *pos));
}

fn write_range(
    doc: &Document,
    id: NodeId,
    spans: &HashMap<NodeId, (usize, usize)>,
    (s, e): (usize, usize),
    out: &mut String,
) {
    for &child in doc.children(id) {
        let Some(&(cs, ce)) = spans.get(&child) else {
            continue;
        };

        if let Some(t) = doc.text(child) {
            if ce > s && cs < e {
                let a = s.max(cs) - cs;
                let b = e.min(ce) - cs;
                if let Some(part) = t.get(a..b) {
                    out.push_str(&html_escape::encode_text(part));
                }
            }
            continue;
        }

        let inside = if cs == ce {
            s < cs && cs < e
        } else {
            ce > s && cs < e
        };
        if !inside {
            continue;
        }

        if s <= cs && ce <= e {
            write_node(doc, child, out);
        } else {
            open_tag(doc, child, out);
            write_range(doc, child, spans, (s, e), out);
            close_tag(doc, child, out);
        }
    }
}

pub(super) fn range_html(doc: &Document, scope: NodeId, range: &TextRange) -> Option<String> {
    let index = TextIndex::build(doc, scope);
    let span = index.span_of(range)?;

    if range.start.node == range.end.node {
        let text = doc.text(range.start.node)?.get(range.start.offset..range.end.offset)?;
        return Some(html_escape::encode_text(text).into_owned());
    }
    let common = doc.common_ancestor(range.start.node, range.end.node)?;

    let mut spans = HashMap::new();
    let mut pos = 0;
    collect_spans(doc, scope, &mut pos, &mut spans);

    let mut out = String::new();
    write_range(doc, common, &spans, span, &mut out);
    Some(out)
}
