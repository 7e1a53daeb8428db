use super::descriptor::{is_addon_form, is_image_form, OCCURRENCE_SEPARATOR};
use super::{Capture, CodecContext, Located, PositionStrategy};
use crate::dom::SelectorList;

/// A CSS selector stored verbatim
pub struct LiteralSelectorStrategy;

impl PositionStrategy for LiteralSelectorStrategy {
    fn name(&self) -> &str {
        "literal-selector"
    }

    fn claims(&self, descriptor: &str) -> bool {
        descriptor.contains('[')
            && descriptor.contains(']')
            && !descriptor.contains(OCCURRENCE_SEPARATOR)
            && !is_image_form(descriptor)
            && !is_addon_form(descriptor)
    }

    fn encode(&self, capture: &Capture) -> Option<String> {
        match capture {
            Capture::Block { selector } => Some(selector.clone()),
            _ => None,
        }
    }

    /// Images are highlighted through their container
    fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Option<Located> {
        let selector = match SelectorList::parse(descriptor) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Stored selector {:?} does not parse: {}", descriptor, e);
                return None;
            }
        };
        let hit = ctx.doc.query_selector(ctx.doc.root(), &selector)?;
        let target = if ctx.doc.tag_name(hit) == Some("img") {
            ctx.doc.parent(hit).filter(|&p| ctx.doc.is_element(p))?
        } else {
            hit
        };
        Some(Located::element(target))
    }
}
