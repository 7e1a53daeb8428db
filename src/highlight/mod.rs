//! Highlight application
//!
//! Marks resolved targets in the document and keeps a journal so every mark
//! can be taken back. Text ranges are wrapped in a marker element after
//! splitting whatever inline elements the range cuts through; elements get
//! the marker class and id attribute directly.

mod journal;

use std::collections::HashMap;

use crate::codec::Target;
use crate::config::AnchorConfig;
use crate::dom::{Document, NodeId, TextRange};
use crate::error::{AnchorError, Result};

pub use journal::{Entry, Mutation};

/// Inline elements that may be cut in two around a highlight
const SPLITTABLE: [&str; 29] = [
    "a", "abbr", "b", "bdi", "bdo", "big", "cite", "code", "data", "del", "dfn", "em", "font",
    "i", "ins", "kbd", "mark", "q", "s", "samp", "small", "span", "strike", "strong", "sub",
    "sup", "time", "tt", "u",
];

/// Containers whose children cannot be wrapped in an inline element
const RIGID_CONTAINERS: [&str; 11] = [
    "table", "thead", "tbody", "tfoot", "tr", "colgroup", "ul", "ol", "dl", "select", "optgroup",
];

/// Applies and tears down comment highlights on one document
pub struct Highlighter {
    config: AnchorConfig,
    journal: Vec<Entry>,
    markers: HashMap<NodeId, String>,
}

/// Split plan computed before anything is mutated
struct TextPlan {
    container: NodeId,
    /// Ancestors of the start node below `container`, bottom-up, that need a split
    left_splits: Vec<NodeId>,
    right_splits: Vec<NodeId>,
}

impl Highlighter {
    pub fn new(config: &AnchorConfig) -> Self {
        Self {
            config: config.clone(),
            journal: Vec::new(),
            markers: HashMap::new(),
        }
    }

    fn record(&mut self, comment_id: &str, mutation: Mutation) {
        self.journal.push(Entry {
            comment_id: comment_id.to_string(),
            mutation,
        });
    }

    fn is_splittable(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        doc.attr(node, "id").is_none()
            && (SPLITTABLE.contains(&tag) || tag == self.config.wrapper_tag)
    }

    /// Mark a decoded target. Returns the node that carries the marker.
    pub fn apply(&mut self, doc: &mut Document, comment_id: &str, target: &Target) -> Result<NodeId> {
        let marker = match target {
            Target::Text { range } => self.apply_text(doc, comment_id, range)?,
            Target::Element { node } => self.apply_element(doc, comment_id, *node)?,
        };
        doc.clear_selection();
        Ok(marker)
    }

    /// Add the marker class and id attribute to an element, or to an image's container
    pub fn apply_element(&mut self, doc: &mut Document, comment_id: &str, node: NodeId) -> Result<NodeId> {
        let target = if doc.tag_name(node) == Some("img") {
            doc.parent(node)
                .filter(|&p| doc.is_element(p))
                .ok_or_else(|| AnchorError::ExtractionFailure("image has no container".into()))?
        } else {
            node
        };
        if !doc.is_element(target) || !doc.is_attached(target) {
            return Err(AnchorError::ExtractionFailure(format!(
                "node {} is not a live element",
                target.index()
            )));
        }

        let class = self.config.marker_class(comment_id);
        let id_attribute = self.config.id_attribute.clone();

        let previous = doc.attr(target, "class").map(str::to_string);
        doc.add_class(target, &class);
        self.record(
            comment_id,
            Mutation::SetAttr {
                node: target,
                name: "class".to_string(),
                previous,
            },
        );

        let previous = doc.attr(target, &id_attribute).map(str::to_string);
        doc.set_attr(target, &id_attribute, comment_id);
        self.record(
            comment_id,
            Mutation::SetAttr {
                node: target,
                name: id_attribute,
                previous,
            },
        );

        self.markers.insert(target, comment_id.to_string());
        Ok(target)
    }

    fn plan_text(&self, doc: &Document, range: &TextRange) -> Result<TextPlan> {
        let (start, end) = (range.start, range.end);
        let fail = |reason: &str| Err(AnchorError::ExtractionFailure(reason.to_string()));

        for point in [start, end] {
            let Some(text) = doc.text(point.node) else {
                return fail("range endpoint is not a text node");
            };
            if !doc.is_attached(point.node) || !text.is_char_boundary(point.offset) {
                return fail("range endpoint is not in the document");
            }
        }
        if start.node == end.node && start.offset >= end.offset {
            return fail("range is empty");
        }

        let container = if start.node == end.node {
            doc.parent(start.node)
        } else {
            doc.common_ancestor(start.node, end.node)
        };
        let Some(container) = container.filter(|&c| doc.is_element(c)) else {
            return fail("range is not inside an element");
        };
        if doc
            .tag_name(container)
            .is_some_and(|tag| RIGID_CONTAINERS.contains(&tag))
        {
            return fail("range crosses table or list structure");
        }

        let below = |node: NodeId| -> Vec<NodeId> {
            doc.ancestors(node)
                .into_iter()
                .take_while(|&a| a != container)
                .collect()
        };

        // An ancestor must be split when it holds anything outside the range,
        // text or not, on the side being cut
        let end_len = doc.text(end.node).map(str::len).unwrap_or_default();
        let has_outside = |ancestor: NodeId, node: NodeId, before: bool| {
            let mut current = node;
            while current != ancestor {
                let sibling = if before {
                    doc.previous_sibling(current)
                } else {
                    doc.next_sibling(current)
                };
                if sibling.is_some() {
                    return true;
                }
                match doc.parent(current) {
                    Some(parent) => current = parent,
                    None => return false,
                }
            }
            false
        };

        let mut left_splits = Vec::new();
        for ancestor in below(start.node) {
            if start.offset > 0 || has_outside(ancestor, start.node, true) {
                if !self.is_splittable(doc, ancestor) {
                    return fail("range starts inside a block element");
                }
                left_splits.push(ancestor);
            }
        }

        let mut right_splits = Vec::new();
        for ancestor in below(end.node) {
            if end.offset < end_len || has_outside(ancestor, end.node, false) {
                if !self.is_splittable(doc, ancestor) {
                    return fail("range ends inside a block element");
                }
                right_splits.push(ancestor);
            }
        }

        Ok(TextPlan {
            container,
            left_splits,
            right_splits,
        })
    }

    /// Child of `container` on the path to `node`
    fn top_below(doc: &Document, container: NodeId, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = doc.parent(current) {
            if parent == container {
                break;
            }
            current = parent;
        }
        current
    }

    fn clone_shallow(&mut self, doc: &mut Document, node: NodeId) -> NodeId {
        let (name, attrs) = match doc.element(node) {
            Some(el) => (el.name.clone(), el.attrs.clone()),
            None => (String::new(), Vec::new()),
        };
        let clone = doc.create_element(&name, attrs);
        if let Some(owner) = self.markers.get(&node).cloned() {
            self.markers.insert(clone, owner);
        }
        clone
    }

    /// Wrap a text range in a marker element
    pub fn apply_text(&mut self, doc: &mut Document, comment_id: &str, range: &TextRange) -> Result<NodeId> {
        let plan = self.plan_text(doc, range)?;
        let (start, end) = (range.start.node, range.end.node);
        let mut end_offset = range.end.offset;

        // Cut the start text node
        if range.start.offset > 0 {
            let text = doc.text(start).unwrap_or_default().to_string();
            let (head_text, rest) = text.split_at(range.start.offset);
            let head = doc.create_text(head_text);
            doc.set_text(start, rest);
            if let Some(parent) = doc.parent(start) {
                doc.insert_before(parent, head, Some(start));
            }
            self.record(comment_id, Mutation::SplitTextBefore { node: start, head });
            if start == end {
                end_offset -= range.start.offset;
            }
        }
        for &ancestor in &plan.left_splits {
            let path = Self::top_below(doc, ancestor, start);
            let head = self.clone_shallow(doc, ancestor);
            if let Some(parent) = doc.parent(ancestor) {
                doc.insert_before(parent, head, Some(ancestor));
            }
            let leading: Vec<NodeId> = doc
                .children(ancestor)
                .iter()
                .copied()
                .take_while(|&c| c != path)
                .collect();
            for child in leading {
                doc.append_child(head, child);
            }
            self.record(comment_id, Mutation::SplitElementBefore { node: ancestor, head });
        }

        // Cut the end text node
        let end_len = doc.text(end).map(str::len).unwrap_or_default();
        if end_offset < end_len {
            let text = doc.text(end).unwrap_or_default().to_string();
            let (kept, tail_text) = text.split_at(end_offset);
            let tail = doc.create_text(tail_text);
            doc.set_text(end, kept);
            if let Some(parent) = doc.parent(end) {
                doc.insert_after(parent, tail, end);
            }
            self.record(comment_id, Mutation::SplitTextAfter { node: end, tail });
        }
        for &ancestor in &plan.right_splits {
            let path = Self::top_below(doc, ancestor, end);
            let tail = self.clone_shallow(doc, ancestor);
            if let Some(parent) = doc.parent(ancestor) {
                doc.insert_after(parent, tail, ancestor);
            }
            let trailing: Vec<NodeId> = doc
                .children(ancestor)
                .iter()
                .copied()
                .skip_while(|&c| c != path)
                .skip(1)
                .collect();
            for child in trailing {
                doc.append_child(tail, child);
            }
            self.record(comment_id, Mutation::SplitElementAfter { node: ancestor, tail });
        }

        // Wrap the run between the two paths
        let container = plan.container;
        let first = Self::top_below(doc, container, start);
        let last = Self::top_below(doc, container, end);
        let children = doc.children(container);
        let (Some(from), Some(to)) = (
            children.iter().position(|&c| c == first),
            children.iter().position(|&c| c == last),
        ) else {
            return Err(AnchorError::ExtractionFailure("range lost its container".into()));
        };
        let run = children[from..=to].to_vec();

        let wrapper = doc.create_element(
            &self.config.wrapper_tag,
            vec![
                (self.config.id_attribute.clone(), comment_id.to_string()),
                ("class".to_string(), self.config.marker_class(comment_id)),
            ],
        );
        doc.insert_before(container, wrapper, Some(first));
        for child in run {
            doc.append_child(wrapper, child);
        }
        self.record(comment_id, Mutation::Wrap { wrapper });
        self.markers.insert(wrapper, comment_id.to_string());
        Ok(wrapper)
    }

    /// Comment owning the innermost marker at or above `node`
    pub fn comment_at(&self, doc: &Document, node: NodeId) -> Option<&str> {
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| self.markers.get(&n))
            .map(String::as_str)
    }

    /// Marker nodes currently owned by a comment, in creation order
    pub fn markers_of(&self, comment_id: &str) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .markers
            .iter()
            .filter(|(_, owner)| owner.as_str() == comment_id)
            .map(|(&node, _)| node)
            .collect();
        nodes.sort();
        nodes
    }

    /// Ids with at least one live mutation, in first-applied order
    pub fn applied(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for entry in &self.journal {
            if !ids.contains(&entry.comment_id) {
                ids.push(entry.comment_id.clone());
            }
        }
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    fn undo_last(&mut self, doc: &mut Document) -> Option<String> {
        let entry = self.journal.pop()?;
        entry.mutation.undo(doc);
        if let Some(created) = entry.mutation.created() {
            self.markers.remove(&created);
        }
        if let Mutation::SetAttr { node, name, .. } = &entry.mutation {
            if name == "class" {
                self.markers.remove(node);
                // An earlier comment may still mark the same element
                let earlier = self.journal.iter().rev().find(|e| {
                    matches!(&e.mutation, Mutation::SetAttr { node: n, name, .. } if n == node && name == "class")
                });
                if let Some(e) = earlier {
                    self.markers.insert(*node, e.comment_id.clone());
                }
            }
        }
        Some(entry.comment_id)
    }

    /// Remove the highlights of `ids`
    ///
    /// The journal is unwound from the newest entry back to the oldest entry
    /// of any id in `ids`. Highlights of other comments applied after that
    /// point are removed too and their ids returned, so the caller can apply
    /// them again.
    pub fn teardown(&mut self, doc: &mut Document, ids: &[String]) -> Vec<String> {
        let Some(oldest) = self
            .journal
            .iter()
            .position(|e| ids.contains(&e.comment_id))
        else {
            return Vec::new();
        };

        let mut collateral: Vec<String> = Vec::new();
        while self.journal.len() > oldest {
            let Some(id) = self.undo_last(doc) else {
                break;
            };
            if !ids.contains(&id) && !collateral.contains(&id) {
                collateral.push(id);
            }
        }
        collateral.reverse();
        tracing::debug!(
            "Tore down {} highlight(s), {} collateral",
            ids.len(),
            collateral.len()
        );
        collateral
    }

    /// Undo every highlight
    pub fn teardown_all(&mut self, doc: &mut Document) {
        while self.undo_last(doc).is_some() {}
        self.markers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{find_nth, SearchOptions};

    fn range(doc: &Document, needle: &str, n: i64) -> TextRange {
        find_nth(doc, doc.root(), needle, n, SearchOptions::default())
            .unwrap()
            .range
    }

    fn highlighter() -> Highlighter {
        Highlighter::new(&AnchorConfig::default())
    }

    #[test]
    fn test_wraps_text_in_single_node() {
        let mut doc = Document::parse_fragment("<p>the cat sat on the cat mat</p>").unwrap();
        let r = range(&doc, "cat", 1);
        let mut h = highlighter();
        let wrapper = h.apply_text(&mut doc, "7", &r).unwrap();
        assert_eq!(
            doc.to_html(doc.root()),
            r#"<p>the cat sat on the <span data-comment-id="7" class="marker-7">cat</span> mat</p>"#
        );
        assert_eq!(h.comment_at(&doc, wrapper), Some("7"));
        let inner = doc.children(wrapper)[0];
        assert_eq!(h.comment_at(&doc, inner), Some("7"));
    }

    #[test]
    fn test_splits_partial_inline_ancestors() {
        let html = "<p>one <b>two three</b> four <i>five six</i></p>";
        let mut doc = Document::parse_fragment(html).unwrap();
        let r = range(&doc, "three four five", 0);
        let mut h = highlighter();
        h.apply_text(&mut doc, "c", &r).unwrap();
        assert_eq!(
            doc.to_html(doc.root()),
            r#"<p>one <b>two </b><span data-comment-id="c" class="marker-c"><b>three</b> four <i>five</i></span><i> six</i></p>"#
        );
        assert_eq!(doc.text_content(doc.root()), "one two three four five six");

        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_splits_ancestor_with_leading_element() {
        let html = r#"<p>x <b><img src="/a.png"/>bold</b> y</p>"#;
        let mut doc = Document::parse_fragment(html).unwrap();
        let r = range(&doc, "bold y", 0);
        let mut h = highlighter();
        h.apply_text(&mut doc, "m", &r).unwrap();
        assert_eq!(
            doc.to_html(doc.root()),
            r#"<p>x <b><img src="/a.png"/></b><span data-comment-id="m" class="marker-m"><b>bold</b> y</span></p>"#
        );

        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_cuts_multibyte_text() {
        let html = "<p>café <b>crème</b> brûlée</p>";
        let mut doc = Document::parse_fragment(html).unwrap();
        let r = range(&doc, "é crè", 0);
        let mut h = highlighter();
        h.apply_text(&mut doc, "u", &r).unwrap();
        assert_eq!(
            doc.to_html(doc.root()),
            r#"<p>caf<span data-comment-id="u" class="marker-u">é <b>crè</b></span><b>me</b> brûlée</p>"#
        );

        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_block_boundary_fails_before_mutation() {
        let html = "<div><p>alpha beta</p><p>gamma delta</p></div>";
        let mut doc = Document::parse_fragment(html).unwrap();
        let r = range(&doc, "betagamma", 0);
        let mut h = highlighter();
        let err = h.apply_text(&mut doc, "1", &r).unwrap_err();
        assert!(matches!(err, AnchorError::ExtractionFailure(_)));
        assert_eq!(doc.to_html(doc.root()), html);
        assert!(h.is_empty());
    }

    #[test]
    fn test_element_with_id_is_not_split() {
        let html = r#"<p>a <span id="k">b c</span> d</p>"#;
        let mut doc = Document::parse_fragment(html).unwrap();
        let r = range(&doc, "c d", 0);
        assert!(highlighter().apply_text(&mut doc, "1", &r).is_err());
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_image_marks_container() {
        let html = r#"<figure class="thumb"><img src="/a.png"/></figure>"#;
        let mut doc = Document::parse_fragment(html).unwrap();
        let img = doc.elements_by_tag(doc.root(), "img")[0];
        let mut h = highlighter();
        let marked = h
            .apply(&mut doc, "9", &Target::Element { node: img })
            .unwrap();
        assert_eq!(doc.tag_name(marked), Some("figure"));
        assert_eq!(doc.attr(marked, "class"), Some("thumb marker-9"));
        assert_eq!(doc.attr(marked, "data-comment-id"), Some("9"));
        assert_eq!(h.comment_at(&doc, img), Some("9"));

        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_class_attribute_removed_when_absent_before() {
        let html = "<figure><img src=\"/a.png\"/></figure>";
        let mut doc = Document::parse_fragment(html).unwrap();
        let figure = doc.elements_by_tag(doc.root(), "figure")[0];
        let mut h = highlighter();
        h.apply_element(&mut doc, "1", figure).unwrap();
        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_nested_highlights_and_partial_teardown() {
        let html = "<p>the quick brown fox jumps</p>";
        let mut doc = Document::parse_fragment(html).unwrap();
        let mut h = highlighter();

        let outer = range(&doc, "quick brown fox", 0);
        h.apply_text(&mut doc, "a", &outer).unwrap();
        let inner = range(&doc, "brown", 0);
        h.apply_text(&mut doc, "b", &inner).unwrap();
        let late = range(&doc, "jumps", 0);
        h.apply_text(&mut doc, "c", &late).unwrap();

        let brown = range(&doc, "brown", 0);
        assert_eq!(h.comment_at(&doc, brown.start.node), Some("b"));
        assert_eq!(h.applied(), vec!["a", "b", "c"]);

        let collateral = h.teardown(&mut doc, &["b".to_string()]);
        assert_eq!(collateral, vec!["c".to_string()]);
        assert_eq!(h.applied(), vec!["a"]);
        assert!(!doc.to_html(doc.root()).contains("marker-b"));
        assert!(doc.to_html(doc.root()).contains("marker-a"));

        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_overlapping_highlight_splits_existing_marker() {
        let html = "<p>one two three</p>";
        let mut doc = Document::parse_fragment(html).unwrap();
        let mut h = highlighter();
        let first = range(&doc, "one two", 0);
        h.apply_text(&mut doc, "x", &first).unwrap();
        let second = range(&doc, "two three", 0);
        h.apply_text(&mut doc, "y", &second).unwrap();

        let one = range(&doc, "one", 0);
        let two = range(&doc, "two", 0);
        assert_eq!(h.comment_at(&doc, one.start.node), Some("x"));
        assert_eq!(h.comment_at(&doc, two.start.node), Some("x"));
        assert_eq!(h.markers_of("x").len(), 2);

        h.teardown_all(&mut doc);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn test_apply_clears_selection() {
        let mut doc = Document::parse_fragment("<p>abc</p>").unwrap();
        let r = range(&doc, "b", 0);
        doc.set_selection(r);
        highlighter()
            .apply(&mut doc, "1", &Target::Text { range: r })
            .unwrap();
        assert!(doc.selection().is_none());
    }
}
