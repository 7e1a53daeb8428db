//! Anchor records and load reports

use serde::{Deserialize, Serialize};

use crate::codec::Point;
use crate::dom::NodeId;

/// Page position of a highlighted comment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementPos {
    pub top: f64,
    pub left: f64,
}

/// A stored comment's anchor, as exchanged with the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAnchor {
    pub data_id: String,
    /// Position descriptor
    pub pos: String,
    /// Serialised preview shown when the anchor is broken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Set after a successful highlight
    #[serde(rename = "elementPos", default, skip_serializing_if = "Option::is_none")]
    pub element_pos: Option<ElementPos>,
}

impl CommentAnchor {
    pub fn new(data_id: impl Into<String>, pos: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            pos: pos.into(),
            image: None,
            element_pos: None,
        }
    }
}

/// A comment whose target could not be highlighted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokenAnchor {
    pub data_id: String,
    pub pos: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub reason: String,
}

/// Presentation record for one comment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightInfo {
    pub id: String,
    /// Marker node, absent for broken anchors
    pub target: Option<NodeId>,
    pub top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_offset: Option<Point>,
    pub is_broken: bool,
}

/// Outcome of re-anchoring a batch of comments
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub resolved_count: usize,
    pub broken: Vec<BrokenAnchor>,
    /// One entry per input comment, in input order
    pub highlights: Vec<HighlightInfo>,
}

impl LoadReport {
    pub fn is_broken(&self, data_id: &str) -> bool {
        self.broken.iter().any(|b| b.data_id == data_id)
    }
}
