//! Descriptor grammar helpers
//!
//! ```text
//! text      = TEXT "|" N                 plain occurrence
//! markup    = "<b>TEXT</b>" "|" N        markup occurrence (raw or entity-escaped)
//! image     = "img[" HASH "]"
//! selector  = any string with "[" and "]" and no "|"
//! addon     = "addon^" NAME "%" PAYLOAD
//! ```

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

pub const OCCURRENCE_SEPARATOR: char = '|';
pub const ADDON_PREFIX: &str = "addon^";
pub const ADDON_SEPARATOR: char = '%';

/// A start, end or empty tag whose attributes all carry quoted values
fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"</?[A-Za-z][A-Za-z0-9:-]*(\s+[A-Za-z_:][-A-Za-z0-9_:.]*\s*=\s*("[^"]*"|'[^']*'))*\s*/?>"#,
            )
            .ok()
        })
        .as_ref()
}

fn image_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^img\[[^\[\]]+\]$").ok())
        .as_ref()
}

fn has_raw_tag(text: &str) -> bool {
    tag_pattern().is_some_and(|re| re.is_match(text))
}

/// True when the text contains an HTML tag, raw or entity-escaped
pub fn has_markup(text: &str) -> bool {
    has_raw_tag(text) || has_raw_tag(&html_escape::decode_html_entities(text))
}

/// Remove every tag, keeping text between them
pub fn strip_tags(text: &str) -> Cow<'_, str> {
    match tag_pattern() {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    }
}

/// Plain search text of a markup snippet
///
/// Raw markup is stripped and then entity-decoded once, like reading the
/// text content of the parsed snippet. Escaped markup is decoded first to
/// reveal its tags.
pub fn markup_text(markup: &str) -> String {
    if has_raw_tag(markup) {
        html_escape::decode_html_entities(&strip_tags(markup)).into_owned()
    } else {
        let unescaped = html_escape::decode_html_entities(markup);
        html_escape::decode_html_entities(&strip_tags(&unescaped)).into_owned()
    }
}

/// Split `TEXT|N` on the last separator
pub fn split_occurrence(descriptor: &str) -> Option<(&str, i64)> {
    let (text, index) = descriptor.rsplit_once(OCCURRENCE_SEPARATOR)?;
    let index = index.parse().ok()?;
    Some((text, index))
}

pub fn is_addon_form(descriptor: &str) -> bool {
    descriptor
        .strip_prefix(ADDON_PREFIX)
        .is_some_and(|rest| rest.contains(ADDON_SEPARATOR))
}

/// Split `addon^NAME%PAYLOAD` into `(NAME, PAYLOAD)`
pub fn split_addon(descriptor: &str) -> Option<(&str, &str)> {
    descriptor.strip_prefix(ADDON_PREFIX)?.split_once(ADDON_SEPARATOR)
}

pub fn is_image_form(descriptor: &str) -> bool {
    image_pattern().is_some_and(|re| re.is_match(descriptor))
}

/// Hash payload of `img[HASH]`
pub fn image_hash(descriptor: &str) -> Option<&str> {
    if !is_image_form(descriptor) {
        return None;
    }
    descriptor.strip_prefix("img[")?.strip_suffix(']')
}
