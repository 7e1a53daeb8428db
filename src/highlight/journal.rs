//! Reversible DOM mutations
//!
//! Every change the highlighter makes is recorded as a [`Mutation`]. Undoing
//! the journal in reverse order restores the document exactly, node ids
//! included.

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// `head` was cut from the front of text node `node`
    SplitTextBefore { node: NodeId, head: NodeId },
    /// `tail` was cut from the end of text node `node`
    SplitTextAfter { node: NodeId, tail: NodeId },
    /// Shallow clone `head`, inserted before `node`, took its leading children
    SplitElementBefore { node: NodeId, head: NodeId },
    /// Shallow clone `tail`, inserted after `node`, took its trailing children
    SplitElementAfter { node: NodeId, tail: NodeId },
    /// `wrapper` was inserted around a run of siblings
    Wrap { wrapper: NodeId },
    /// An attribute was set; `previous` is its old value
    SetAttr {
        node: NodeId,
        name: String,
        previous: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub comment_id: String,
    pub mutation: Mutation,
}

fn move_children_to_front(doc: &mut Document, from: NodeId, to: NodeId) {
    let first = doc.children(to).first().copied();
    for child in doc.children(from).to_vec() {
        doc.insert_before(to, child, first);
    }
}

fn move_children_to_end(doc: &mut Document, from: NodeId, to: NodeId) {
    for child in doc.children(from).to_vec() {
        doc.append_child(to, child);
    }
}

impl Mutation {
    /// Node this mutation created, if any
    pub fn created(&self) -> Option<NodeId> {
        match *self {
            Mutation::SplitTextBefore { head, .. } => Some(head),
            Mutation::SplitTextAfter { tail, .. } => Some(tail),
            Mutation::SplitElementBefore { head, .. } => Some(head),
            Mutation::SplitElementAfter { tail, .. } => Some(tail),
            Mutation::Wrap { wrapper } => Some(wrapper),
            Mutation::SetAttr { .. } => None,
        }
    }

    /// Reverse the mutation. Only valid when every later mutation has been undone.
    pub fn undo(&self, doc: &mut Document) {
        match self {
            Mutation::SplitTextBefore { node, head } => {
                let merged = format!(
                    "{}{}",
                    doc.text(*head).unwrap_or_default(),
                    doc.text(*node).unwrap_or_default()
                );
                doc.set_text(*node, &merged);
                doc.detach(*head);
            }
            Mutation::SplitTextAfter { node, tail } => {
                let merged = format!(
                    "{}{}",
                    doc.text(*node).unwrap_or_default(),
                    doc.text(*tail).unwrap_or_default()
                );
                doc.set_text(*node, &merged);
                doc.detach(*tail);
            }
            Mutation::SplitElementBefore { node, head } => {
                move_children_to_front(doc, *head, *node);
                doc.detach(*head);
            }
            Mutation::SplitElementAfter { node, tail } => {
                move_children_to_end(doc, *tail, *node);
                doc.detach(*tail);
            }
            Mutation::Wrap { wrapper } => {
                if let Some(parent) = doc.parent(*wrapper) {
                    for child in doc.children(*wrapper).to_vec() {
                        doc.insert_before(parent, child, Some(*wrapper));
                    }
                }
                doc.detach(*wrapper);
            }
            Mutation::SetAttr {
                node,
                name,
                previous,
            } => match previous {
                Some(value) => doc.set_attr(*node, name, value),
                None => doc.remove_attr(*node, name),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_undo_restores_order() {
        let mut doc = Document::parse_fragment("<p>a<b>b</b>c</p>").unwrap();
        let before = doc.to_html(doc.root());
        let p = doc.children(doc.root())[0];
        let kids = doc.children(p).to_vec();
        let wrapper = doc.create_element("span", Vec::new());
        doc.insert_before(p, wrapper, Some(kids[1]));
        doc.append_child(wrapper, kids[1]);
        doc.append_child(wrapper, kids[2]);
        assert_eq!(doc.to_html(doc.root()), "<p>a<span><b>b</b>c</span></p>");

        Mutation::Wrap { wrapper }.undo(&mut doc);
        assert_eq!(doc.to_html(doc.root()), before);
    }

    #[test]
    fn test_set_attr_undo_removes_new_attribute() {
        let mut doc = Document::parse_fragment(r#"<p class="x">a</p>"#).unwrap();
        let p = doc.children(doc.root())[0];
        doc.set_attr(p, "data-comment-id", "1");
        doc.set_attr(p, "class", "x marker-1");
        Mutation::SetAttr {
            node: p,
            name: "class".into(),
            previous: Some("x".into()),
        }
        .undo(&mut doc);
        Mutation::SetAttr {
            node: p,
            name: "data-comment-id".into(),
            previous: None,
        }
        .undo(&mut doc);
        assert_eq!(doc.to_html(doc.root()), r#"<p class="x">a</p>"#);
    }
}
