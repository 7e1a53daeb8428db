use super::descriptor::{image_hash, is_image_form};
use super::{Capture, CodecContext, Located, PositionStrategy};
use crate::hash::content_hash;

/// `img[HASH]`: the first image whose content hash matches
pub struct ImageStrategy;

impl PositionStrategy for ImageStrategy {
    fn name(&self) -> &str {
        "image"
    }

    fn claims(&self, descriptor: &str) -> bool {
        is_image_form(descriptor)
    }

    fn encode(&self, capture: &Capture) -> Option<String> {
        match capture {
            Capture::Image { hash } => Some(format!("img[{}]", hash)),
            _ => None,
        }
    }

    fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Option<Located> {
        let wanted = image_hash(descriptor)?;
        ctx.doc
            .elements_by_tag(ctx.scope, "img")
            .into_iter()
            .find(|&img| content_hash(ctx.doc, img, ctx.layout).as_deref() == Some(wanted))
            .map(Located::element)
    }
}
