//! Configuration management for comment anchoring

use std::env;

use serde::Deserialize;

use crate::dom::{Document, NodeId, SelectorList};
use crate::search::SearchOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorConfig {
    /// Prefix of the per-comment class (`marker-<id>`)
    pub class_prefix: String,
    /// Attribute carrying the comment id on highlighted nodes
    pub id_attribute: String,
    /// Tag used to wrap highlighted text
    pub wrapper_tag: String,
    /// Selector of the element that holds the page content
    pub content_root: String,
    /// Upper bound on matches visited by a single search
    pub max_occurrences: usize,
    /// Matches examined per step of an incremental index resolution
    pub resolve_step: usize,
    /// Strip scripts and event handlers before parsing
    pub sanitize: bool,
    pub case_sensitive: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            class_prefix: "marker-".to_string(),
            id_attribute: "data-comment-id".to_string(),
            wrapper_tag: "span".to_string(),
            content_root: r#"div[class~="page"]"#.to_string(),
            max_occurrences: 10_000,
            resolve_step: 64,
            sanitize: true,
            case_sensitive: true,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl AnchorConfig {
    /// Read overrides from `ANCHOR_*` environment variables, keeping defaults for the rest
    pub fn from_env() -> Self {
        let defaults = AnchorConfig::default();
        AnchorConfig {
            class_prefix: env::var("ANCHOR_CLASS_PREFIX").unwrap_or(defaults.class_prefix),
            id_attribute: env::var("ANCHOR_ID_ATTRIBUTE").unwrap_or(defaults.id_attribute),
            wrapper_tag: env::var("ANCHOR_WRAPPER_TAG").unwrap_or(defaults.wrapper_tag),
            content_root: env::var("ANCHOR_CONTENT_ROOT").unwrap_or(defaults.content_root),
            max_occurrences: env::var("ANCHOR_MAX_OCCURRENCES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_occurrences),
            resolve_step: env::var("ANCHOR_RESOLVE_STEP")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.resolve_step),
            sanitize: env_flag("ANCHOR_SANITIZE", defaults.sanitize),
            case_sensitive: env_flag("ANCHOR_CASE_SENSITIVE", defaults.case_sensitive),
        }
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            case_sensitive: self.case_sensitive,
            max_occurrences: self.max_occurrences,
        }
    }

    /// The page's content element, or the document node when the page has none
    pub fn content_root_in(&self, doc: &Document) -> NodeId {
        match SelectorList::parse(&self.content_root) {
            Ok(selector) => doc.query_selector(doc.root(), &selector).unwrap_or(doc.root()),
            Err(e) => {
                tracing::warn!("Invalid content root selector {:?}: {}", self.content_root, e);
                doc.root()
            }
        }
    }

    /// Per-comment class name. Whitespace in ids would split the class token.
    pub fn marker_class(&self, comment_id: &str) -> String {
        let id: String = comment_id
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect();
        format!("{}{}", self.class_prefix, id)
    }
}
