//! Geometry seam
//!
//! The crate never renders anything. Rendered sizes and positions come from a
//! [`Layout`] supplied by the embedding application; [`AttributeLayout`]
//! derives what it can from markup alone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Source of rendered geometry
pub trait Layout {
    /// Bounding box of a node in page coordinates
    fn bounding_box(&self, doc: &Document, node: NodeId) -> Option<Rect>;

    /// Bounding box of the node or, failing that, of its nearest measured ancestor
    fn nearest_box(&self, doc: &Document, node: NodeId) -> Option<Rect> {
        self.bounding_box(doc, node).or_else(|| {
            doc.ancestors(node)
                .into_iter()
                .find_map(|a| self.bounding_box(doc, a))
        })
    }
}

/// Reads `width`/`height` (attributes or inline `style` pixels) and SVG-style `x`/`y`
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeLayout;

fn style_pixels(style: &str, property: &str) -> Option<f64> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if name.trim() != property {
            return None;
        }
        value.trim().trim_end_matches("px").trim().parse().ok()
    })
}

fn dimension(doc: &Document, node: NodeId, name: &str) -> Option<f64> {
    doc.attr(node, name)
        .and_then(|v| v.trim().trim_end_matches("px").parse().ok())
        .or_else(|| doc.attr(node, "style").and_then(|s| style_pixels(s, name)))
}

impl Layout for AttributeLayout {
    fn bounding_box(&self, doc: &Document, node: NodeId) -> Option<Rect> {
        doc.element(node)?;
        let width = dimension(doc, node, "width");
        let height = dimension(doc, node, "height");
        let x = dimension(doc, node, "x");
        let y = dimension(doc, node, "y");
        if width.is_none() && height.is_none() && x.is_none() && y.is_none() {
            return None;
        }
        Some(Rect::new(
            x.unwrap_or(0.0),
            y.unwrap_or(0.0),
            width.unwrap_or(0.0),
            height.unwrap_or(0.0),
        ))
    }
}

/// Measured boxes supplied by the host, falling back to [`AttributeLayout`]
#[derive(Debug, Clone, Default)]
pub struct FixedLayout {
    boxes: HashMap<NodeId, Rect>,
}

impl FixedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeId, rect: Rect) {
        self.boxes.insert(node, rect);
    }

    pub fn with(mut self, node: NodeId, rect: Rect) -> Self {
        self.set(node, rect);
        self
    }
}

impl Layout for FixedLayout {
    fn bounding_box(&self, doc: &Document, node: NodeId) -> Option<Rect> {
        self.boxes
            .get(&node)
            .copied()
            .or_else(|| AttributeLayout.bounding_box(doc, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_dimensions() {
        let doc = Document::parse_fragment(r#"<img src="/a.png" width="100" height="50px"/>"#).unwrap();
        let img = doc.children(doc.root())[0];
        let rect = AttributeLayout.bounding_box(&doc, img).unwrap();
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 50.0);
    }

    #[test]
    fn test_style_dimensions() {
        let doc = Document::parse_fragment(r#"<img src="/a.png" style="width: 20px; height:10px"/>"#).unwrap();
        let img = doc.children(doc.root())[0];
        let rect = AttributeLayout.bounding_box(&doc, img).unwrap();
        assert_eq!((rect.width, rect.height), (20.0, 10.0));
    }

    #[test]
    fn test_fixed_layout_nearest_box() {
        let doc = Document::parse_fragment("<div><p>text</p></div>").unwrap();
        let div = doc.children(doc.root())[0];
        let p = doc.children(div)[0];
        let layout = FixedLayout::new().with(div, Rect::new(0.0, 120.0, 300.0, 40.0));
        assert!(layout.bounding_box(&doc, p).is_none());
        assert_eq!(layout.nearest_box(&doc, p).unwrap().y, 120.0);
    }
}
