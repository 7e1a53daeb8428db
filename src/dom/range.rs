//! Text points, ranges and the flattened text index
//!
//! Offsets inside a text node are byte offsets into that node's string and
//! always fall on `char` boundaries.

use serde::{Deserialize, Serialize};

use super::{Document, NodeId};

/// A position inside a text node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A range between two text points, start before end in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPoint,
    pub end: TextPoint,
}

impl TextRange {
    pub fn new(start: TextPoint, end: TextPoint) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Text covered by the range, or `None` if an endpoint is not a live text node under `scope`
    pub fn text(&self, doc: &Document, scope: NodeId) -> Option<String> {
        let index = TextIndex::build(doc, scope);
        let (s, e) = index.span_of(self)?;
        index.text().get(s..e).map(str::to_string)
    }
}

/// One text node's slice of the flattened text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSegment {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// Flattened text content of a scope with a map back to text nodes
///
/// Nested elements (including highlight wrappers) do not introduce any
/// separator, so the flattened text equals the scope's `textContent`.
#[derive(Debug, Clone)]
pub struct TextIndex {
    text: String,
    segments: Vec<TextSegment>,
}

impl TextIndex {
    pub fn build(doc: &Document, scope: NodeId) -> Self {
        let mut text = String::new();
        let mut segments = Vec::new();

        let nodes = if doc.text(scope).is_some() {
            vec![scope]
        } else {
            doc.descendants(scope)
        };

        for node in nodes {
            if let Some(t) = doc.text(node) {
                if t.is_empty() {
                    continue;
                }
                let start = text.len();
                text.push_str(t);
                segments.push(TextSegment {
                    node,
                    start,
                    end: text.len(),
                });
            }
        }

        Self { text, segments }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[TextSegment] {
        &self.segments
    }

    pub fn segment_of(&self, node: NodeId) -> Option<&TextSegment> {
        self.segments.iter().find(|s| s.node == node)
    }

    /// Global offset of a point, `None` when the node is outside this index
    /// or the offset splits a character
    pub fn offset_of(&self, point: TextPoint) -> Option<usize> {
        let seg = self.segment_of(point.node)?;
        let offset = seg.start.checked_add(point.offset)?;
        (offset <= seg.end && self.text.is_char_boundary(offset)).then_some(offset)
    }

    /// Global `[start, end)` of a range
    pub fn span_of(&self, range: &TextRange) -> Option<(usize, usize)> {
        let s = self.offset_of(range.start)?;
        let e = self.offset_of(range.end)?;
        (s <= e).then_some((s, e))
    }

    /// Point for a global offset where a range starts: a boundary between
    /// two nodes resolves to the start of the later node.
    pub fn start_point(&self, offset: usize) -> Option<TextPoint> {
        self.segments
            .iter()
            .find(|s| offset >= s.start && offset < s.end)
            .map(|s| TextPoint::new(s.node, offset - s.start))
    }

    /// Point for a global offset where a range ends: a boundary between two
    /// nodes resolves to the end of the earlier node.
    pub fn end_point(&self, offset: usize) -> Option<TextPoint> {
        self.segments
            .iter()
            .find(|s| offset > s.start && offset <= s.end)
            .map(|s| TextPoint::new(s.node, offset - s.start))
    }

    /// Range covering the global span `[start, end)`
    pub fn range(&self, start: usize, end: usize) -> Option<TextRange> {
        if start >= end {
            return None;
        }
        Some(TextRange::new(self.start_point(start)?, self.end_point(end)?))
    }
}
