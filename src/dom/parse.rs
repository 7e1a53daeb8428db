//! Page parsing
//!
//! Wiki engines usually render XHTML, so pages are first parsed with
//! roxmltree after a pre-pass that turns HTML-only named entities (`&nbsp;`,
//! `&hellip;`, ...) into numeric references and escapes stray ampersands.
//! Input that is not well-formed XML (`<br>`, unclosed `<p>`, unquoted
//! attributes) goes through the HTML5 tree builder instead.
//!
//! Both paths keep namespace prefixes on element and attribute names
//! (`xlink:href`, `xml:lang`) and the `xmlns` declarations, so a page
//! serialises back the way it came in.

use std::sync::OnceLock;

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, QualName};
use lol_html::{element, rewrite_str, RewriteStrSettings};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use regex::Regex;

use super::{Document, DomError, NodeId};

const FRAGMENT_WRAPPER: &str = "wiki-fragment";

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Entities XML understands without a DTD
const XML_ENTITIES: [&str; 5] = ["lt", "gt", "amp", "quot", "apos"];

fn entity_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").ok())
        .as_ref()
}

/// Rewrite HTML named entities so an XML parser accepts the input
pub fn normalize_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        match entity_pattern().and_then(|re| re.captures(tail)) {
            Some(caps) => {
                let whole = &caps[0];
                let name = &caps[1];
                if name.starts_with('#') || XML_ENTITIES.contains(&name) {
                    out.push_str(whole);
                } else {
                    let decoded = html_escape::decode_html_entities(whole);
                    if decoded == whole {
                        // Unknown entity: keep the literal text
                        out.push_str("&amp;");
                        out.push_str(&whole[1..]);
                    } else {
                        for ch in decoded.chars() {
                            out.push_str(&format!("&#{};", ch as u32));
                        }
                    }
                }
                rest = &tail[whole.len()..];
            }
            None => {
                out.push_str("&amp;");
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

pub(super) fn parse_document(input: &str) -> Result<Document, DomError> {
    let normalized = normalize_entities(input);
    let doc = match roxmltree::Document::parse_with_options(&normalized, parsing_options()) {
        Ok(xml) => {
            let mut doc = Document::new();
            let root = doc.root();
            for child in xml.root().children() {
                build_xml(&mut doc, root, child);
            }
            doc
        }
        Err(e) => {
            tracing::debug!("Page is not well-formed XHTML ({}), parsing as HTML", e);
            let dom = html5ever::parse_document(RcDom::default(), Default::default()).one(input);
            let mut doc = Document::new();
            let root = doc.root();
            for child in dom.document.children.borrow().iter() {
                build_html(&mut doc, root, child);
            }
            doc
        }
    };

    if doc.document_element().is_none() {
        return Err(DomError::EmptyDocument);
    }
    Ok(doc)
}

pub(super) fn parse_fragment(input: &str) -> Result<Document, DomError> {
    let wrapped = format!("<{0}>{1}</{0}>", FRAGMENT_WRAPPER, normalize_entities(input));
    let mut doc = Document::new();
    let root = doc.root();

    match roxmltree::Document::parse_with_options(&wrapped, parsing_options()) {
        Ok(xml) => {
            for child in xml.root_element().children() {
                build_xml(&mut doc, root, child);
            }
        }
        Err(e) => {
            tracing::debug!("Fragment is not well-formed XHTML ({}), parsing as HTML", e);
            let context = QualName::new(None, ns!(html), local_name!("body"));
            let dom = html5ever::parse_fragment(RcDom::default(), Default::default(), context, Vec::new())
                .one(input);
            // The tree builder puts fragment content under a synthetic <html>
            let document = dom.document.children.borrow();
            for wrapper in document.iter() {
                for child in wrapper.children.borrow().iter() {
                    build_html(&mut doc, root, child);
                }
            }
        }
    }
    Ok(doc)
}

/// `xmlns` declarations made on this element rather than inherited
fn declared_namespaces(node: roxmltree::Node) -> Vec<(String, String)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.uri() != XML_NAMESPACE)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| {
            let name = match ns.name() {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_string(),
            };
            (name, ns.uri().to_string())
        })
        .collect()
}

fn qualified(node: roxmltree::Node, namespace: Option<&str>, local: &str) -> String {
    let prefix = match namespace {
        Some(XML_NAMESPACE) => Some("xml"),
        Some(uri) => node.lookup_prefix(uri),
        None => None,
    };
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
        _ => local.to_string(),
    }
}

fn build_xml(doc: &mut Document, parent: NodeId, node: roxmltree::Node) {
    if node.is_element() {
        let mut attrs = declared_namespaces(node);
        attrs.extend(
            node.attributes()
                .map(|a| (qualified(node, a.namespace(), a.name()), a.value().to_string())),
        );

        let tag = node.tag_name();
        let name = match tag.namespace() {
            None | Some(XHTML_NAMESPACE) => tag.name().to_ascii_lowercase(),
            namespace => qualified(node, namespace, tag.name()),
        };
        let el = doc.create_element(&name, attrs);
        doc.append_child(parent, el);
        for child in node.children() {
            build_xml(doc, el, child);
        }
    } else if node.is_text() {
        if let Some(text) = node.text() {
            let t = doc.create_text(text);
            doc.append_child(parent, t);
        }
    }
    // Comments and processing instructions carry no anchorable content
}

fn html_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

fn build_html(doc: &mut Document, parent: NodeId, handle: &Handle) {
    match &handle.data {
        RcNodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| (html_name(&a.name), a.value.to_string()))
                .collect();
            let el = doc.create_element(&html_name(name), attrs);
            doc.append_child(parent, el);
            for child in handle.children.borrow().iter() {
                build_html(doc, el, child);
            }
        }
        RcNodeData::Text { contents } => {
            let t = doc.create_text(&contents.borrow());
            doc.append_child(parent, t);
        }
        _ => {}
    }
}

/// Strip scripts, inline styles and event handlers before anchoring
pub fn sanitize_html(html: &str) -> Result<String, DomError> {
    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("style", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let handlers: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|a| a.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for attr in handlers {
                        el.remove_attribute(&attr);
                    }
                    for attr in ["href", "src"] {
                        if let Some(value) = el.get_attribute(attr) {
                            if value.trim().to_lowercase().starts_with("javascript:") {
                                el.remove_attribute(attr);
                            }
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| DomError::Rewrite(e.to_string()))?;

    Ok(result)
}
