//! Addon strategies
//!
//! Addons own the `addon^NAME%PAYLOAD` form for their own `NAME`. They see
//! only the payload; the prefix is handled by [`AddonAdapter`].

use super::descriptor::{split_addon, ADDON_PREFIX, ADDON_SEPARATOR};
use super::{Capture, CodecContext, Located, Point, PositionStrategy};
use crate::dom::{Document, NodeId};

/// A pluggable target kind
pub trait AddonStrategy: Send + Sync {
    /// Registered name, the `NAME` in `addon^NAME%PAYLOAD`
    fn name(&self) -> &str;

    fn decode(&self, ctx: &CodecContext<'_>, payload: &str) -> Option<Located>;

    /// Payload to persist for a captured addon target
    fn encode(&self, payload: &str) -> Option<String> {
        (!payload.is_empty()).then(|| payload.to_string())
    }
}

/// Exposes an [`AddonStrategy`] as a [`PositionStrategy`]
pub struct AddonAdapter<A> {
    addon: A,
}

impl<A: AddonStrategy> AddonAdapter<A> {
    pub fn new(addon: A) -> Self {
        Self { addon }
    }
}

impl<A: AddonStrategy> PositionStrategy for AddonAdapter<A> {
    fn name(&self) -> &str {
        self.addon.name()
    }

    fn claims(&self, descriptor: &str) -> bool {
        split_addon(descriptor).is_some_and(|(name, _)| name == self.addon.name())
    }

    fn encode(&self, capture: &Capture) -> Option<String> {
        match capture {
            Capture::Addon { name, payload } if name == self.addon.name() => {
                let payload = self.addon.encode(payload)?;
                Some(format!("{}{}{}{}", ADDON_PREFIX, name, ADDON_SEPARATOR, payload))
            }
            _ => None,
        }
    }

    fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Option<Located> {
        let (_, payload) = split_addon(descriptor)?;
        self.addon.decode(ctx, payload)
    }
}

/// Nodes of embedded diagrams, addressed by their `data-cell-id`
#[derive(Debug, Clone)]
pub struct DiagramNodeStrategy {
    /// Class marking a diagram container
    pub container_class: String,
    pub cell_attribute: String,
}

impl Default for DiagramNodeStrategy {
    fn default() -> Self {
        Self {
            container_class: "diagram".to_string(),
            cell_attribute: "data-cell-id".to_string(),
        }
    }
}

impl DiagramNodeStrategy {
    fn containers(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .filter(|&n| doc.has_class(n, &self.container_class))
            .collect()
    }
}

impl AddonStrategy for DiagramNodeStrategy {
    fn name(&self) -> &str {
        "diagram"
    }

    fn decode(&self, ctx: &CodecContext<'_>, payload: &str) -> Option<Located> {
        let doc = ctx.doc;
        let (container, cell) = self.containers(doc, ctx.scope).into_iter().find_map(|c| {
            doc.descendants(c)
                .into_iter()
                .find(|&n| doc.attr(n, &self.cell_attribute) == Some(payload))
                .map(|cell| (c, cell))
        })?;

        // Centre of the cell's top edge, relative to the diagram
        let display_offset = ctx.layout.bounding_box(doc, cell).map(|cell_box| {
            let origin = ctx.layout.nearest_box(doc, container).unwrap_or_default();
            Point {
                x: cell_box.x + cell_box.width / 2.0 - origin.x,
                y: cell_box.y - origin.y,
            }
        });

        Some(Located {
            display_offset,
            ..Located::element(cell)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Target;
    use crate::dom::{AttributeLayout, FixedLayout, Rect};
    use crate::search::SearchOptions;

    const PAGE: &str = r#"<div class="page"><div class="diagram"><svg><g data-cell-id="n1"><rect x="10" y="20" width="40" height="10"/></g><g data-cell-id="n2" x="100" y="60" width="20" height="20"/></svg></div></div>"#;

    #[test]
    fn test_locates_cell_with_offset() {
        let doc = Document::parse_fragment(PAGE).unwrap();
        let container = doc
            .descendants(doc.root())
            .into_iter()
            .find(|&n| doc.has_class(n, "diagram"))
            .unwrap();
        let layout = FixedLayout::new().with(container, Rect::new(5.0, 10.0, 300.0, 200.0));
        let ctx = CodecContext {
            doc: &doc,
            scope: doc.root(),
            layout: &layout,
            search: SearchOptions::default(),
        };
        let located = DiagramNodeStrategy::default().decode(&ctx, "n2").unwrap();
        let Target::Element { node } = located.target else {
            panic!("expected an element");
        };
        assert_eq!(doc.attr(node, "data-cell-id"), Some("n2"));
        assert_eq!(located.display_offset, Some(Point { x: 105.0, y: 50.0 }));
    }

    #[test]
    fn test_unmeasured_cell_has_no_offset() {
        let doc = Document::parse_fragment(PAGE).unwrap();
        let ctx = CodecContext {
            doc: &doc,
            scope: doc.root(),
            layout: &AttributeLayout,
            search: SearchOptions::default(),
        };
        let located = DiagramNodeStrategy::default().decode(&ctx, "n1").unwrap();
        assert!(located.display_offset.is_none());
        assert!(DiagramNodeStrategy::default().decode(&ctx, "n9").is_none());
    }

    #[test]
    fn test_adapter_only_claims_own_name() {
        let adapter = AddonAdapter::new(DiagramNodeStrategy::default());
        assert!(adapter.claims("addon^diagram%n1"));
        assert!(!adapter.claims("addon^gallery%n1"));
        assert!(!adapter.claims("diagram%n1"));
    }
}
