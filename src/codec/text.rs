//! Occurrence-based text strategies

use super::descriptor::{has_markup, is_addon_form, markup_text, split_occurrence, OCCURRENCE_SEPARATOR};
use super::{Capture, CodecContext, Located, PositionStrategy};
use crate::search::find_nth;

/// `<b>Hello</b>|0`: occurrence of the tag-stripped text
pub struct MarkupOccurrenceStrategy;

impl PositionStrategy for MarkupOccurrenceStrategy {
    fn name(&self) -> &str {
        "markup-occurrence"
    }

    fn claims(&self, descriptor: &str) -> bool {
        if is_addon_form(descriptor) {
            return false;
        }
        split_occurrence(descriptor).is_some_and(|(text, _)| has_markup(text))
    }

    fn encode(&self, capture: &Capture) -> Option<String> {
        match capture {
            Capture::Text {
                markup: Some(markup),
                occurrence,
                ..
            } => Some(format!("{}{}{}", markup, OCCURRENCE_SEPARATOR, occurrence)),
            _ => None,
        }
    }

    fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Option<Located> {
        let (markup, index) = split_occurrence(descriptor)?;
        let text = markup_text(markup);
        let found = find_nth(ctx.doc, ctx.scope, &text, index, ctx.search)?;
        Some(Located::text(found.range))
    }
}

/// `Hello|0`: occurrence of the literal text
pub struct PlainOccurrenceStrategy;

impl PositionStrategy for PlainOccurrenceStrategy {
    fn name(&self) -> &str {
        "plain-occurrence"
    }

    fn claims(&self, descriptor: &str) -> bool {
        if is_addon_form(descriptor) {
            return false;
        }
        match descriptor.rsplit_once(OCCURRENCE_SEPARATOR) {
            Some((text, _)) => !has_markup(text),
            None => false,
        }
    }

    fn encode(&self, capture: &Capture) -> Option<String> {
        match capture {
            Capture::Text {
                text,
                markup: None,
                occurrence,
            } => Some(format!("{}{}{}", text, OCCURRENCE_SEPARATOR, occurrence)),
            _ => None,
        }
    }

    fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Option<Located> {
        let (text, index) = split_occurrence(descriptor)?;
        let found = find_nth(ctx.doc, ctx.scope, text, index, ctx.search)?;
        Some(Located::text(found.range))
    }
}
