//! Minimal arena DOM
//!
//! Wiki pages are parsed into a flat arena of nodes addressed by [`NodeId`].
//! Detached nodes stay in the arena, so ids handed out to callers remain
//! valid for the lifetime of the document even after the node is moved or
//! removed. This is what lets the highlight journal undo its mutations.
//!
//! # Modules
//!
//! - `parse`: XHTML parsing (roxmltree) with an HTML5 fallback (html5ever),
//!   optional sanitisation (lol_html)
//! - `serialize`: HTML output and range-to-markup serialisation
//! - `range`: text points, ranges and the flattened text index
//! - `selector`: a small CSS selector engine
//! - `layout`: geometry seam used for image fingerprints and positions

mod layout;
mod parse;
mod range;
mod selector;
mod serialize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use layout::{AttributeLayout, FixedLayout, Layout, Rect};
pub use parse::{normalize_entities, sanitize_html};
pub use range::{TextIndex, TextPoint, TextRange, TextSegment};
pub use selector::{SelectorError, SelectorList};

/// Errors raised while building a document
#[derive(Debug, Error)]
pub enum DomError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),

    #[error("Document has no root element")]
    EmptyDocument,
}

/// Stable handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Element name and attributes, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// An arena-backed document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    selection: Option<TextRange>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            root: NodeId(0),
            selection: None,
        }
    }

    /// Parse a complete page, XHTML or HTML
    pub fn parse(input: &str) -> Result<Self, DomError> {
        parse::parse_document(input)
    }

    /// Parse a fragment that may have several top-level nodes
    pub fn parse_fragment(input: &str) -> Result<Self, DomError> {
        parse::parse_fragment(input)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first element child of the document node (usually `<html>`)
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeData::Element(ElementData {
            name: name.to_string(),
            attrs,
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// True when `id` was handed out by this document
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).map(|n| &n.data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id)? {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Tag name, if this is an element. HTML names are lowercase.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Replace the contents of a text node. No-op for other node kinds.
    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let Some(Node {
            data: NodeData::Text(t),
            ..
        }) = self.nodes.get_mut(id.0)
        {
            *t = value.to_string();
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(k, _)| k != name);
        }
    }

    /// Whitespace-separated tokens of the `class` attribute
    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).contains(&class)
    }

    /// Append a class token, keeping the existing tokens verbatim
    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &value);
    }

    /// Remove a single class token. Other tokens keep their order.
    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        if !existing.split_whitespace().any(|c| c == class) {
            return;
        }
        let remaining: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        let value = remaining.join(" ");
        self.set_attr(id, "class", &value);
    }

    /// Position of a node among its parent's children
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        idx.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        self.children(parent).get(idx + 1).copied()
    }

    /// Remove a node from its parent. The node and its subtree stay addressable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(id.0).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.retain(|&c| c != id);
        }
    }

    /// Ids from another document are ignored
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `before`, or at the end when `before` is `None`
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        let idx = before
            .and_then(|b| self.children(parent).iter().position(|&c| c == b))
            .unwrap_or(self.children(parent).len());
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(idx, child);
    }

    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, after: NodeId) {
        let before = self.next_sibling(after);
        self.insert_before(parent, child, before);
    }

    /// True when the node is attached (directly or transitively) under the document node
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Ancestors from the parent up to the document node
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(n) = current {
            out.push(n);
            current = self.parent(n);
        }
        out
    }

    /// Deepest node containing both `a` and `b`
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut chain = vec![a];
        chain.extend(self.ancestors(a));
        let mut current = Some(b);
        while let Some(n) = current {
            if chain.contains(&n) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Nodes under `id` in document (pre-)order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Elements under `id` with the given tag name, in document order
    pub fn elements_by_tag(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.tag_name(n) == Some(name))
            .collect()
    }

    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.attr(n, "id") == Some(value))
    }

    /// Concatenated text of every text node under `id`
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// The live user selection, if any
    pub fn selection(&self) -> Option<&TextRange> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, range: TextRange) {
        self.selection = Some(range);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Evaluate a selector and return the first match under `scope`
    pub fn query_selector(&self, scope: NodeId, selector: &SelectorList) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&n| selector.matches(self, n))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| selector.matches(self, n))
            .collect()
    }

    /// Serialise the subtree rooted at `id`
    pub fn to_html(&self, id: NodeId) -> String {
        serialize::outer_html(self, id)
    }

    /// Serialise the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        serialize::inner_html(self, id)
    }

    /// Serialise the part of the tree covered by `range`, re-opening partially covered elements
    pub fn range_html(&self, scope: NodeId, range: &TextRange) -> Option<String> {
        serialize::range_html(self, scope, range)
    }
}
