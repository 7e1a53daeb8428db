//! Selection capture
//!
//! Turns a live selection into a [`Capture`] the codec can encode. Text
//! selections need their occurrence index, which is found by counting matches
//! of the selected text from the start of the content root. That count runs
//! in bounded steps so a long page never blocks the caller.
//!
//! ```text
//! Empty -> Capturing -> Valid | Invalid
//!   ^                     |
//!   +------ take() -------+
//! ```
//!
//! Starting a new capture abandons the one in flight: each capture carries a
//! ticket from a generation counter and completions with an old ticket are
//! dropped.

mod block;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;

use serde::Serialize;

use crate::codec::Capture;
use crate::config::AnchorConfig;
use crate::dom::{Document, Layout, NodeId, TextRange};
use crate::error::{AnchorError, Result};
use crate::hash::content_hash;
use crate::search::{OccurrenceSearch, SearchCursor, SearchOptions};

pub use block::block_selector;

/// Shared "comment mode" switch owned by the host UI
#[derive(Debug, Clone, Default)]
pub struct CommentMode(Arc<AtomicBool>);

impl CommentMode {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }
}

/// What the user selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSelection {
    Text(TextRange),
    Image(NodeId),
    Block(NodeId),
    Addon {
        node: NodeId,
        name: String,
        payload: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionState {
    Empty,
    Capturing,
    Valid,
    Invalid,
}

/// Result of starting a capture
#[derive(Debug)]
pub enum Begin {
    /// Comment mode is off; nothing changed
    Disabled,
    Invalid(AnchorError),
    Ready(Capture),
    /// Index resolution must run before the capture completes
    Pending(IndexResolution),
}

/// Outcome of a finished [`IndexResolution`], tagged with its capture ticket
#[derive(Debug)]
pub struct Resolved {
    ticket: u64,
    result: Result<Capture>,
}

/// Step-wise count of the occurrences preceding a text selection
#[derive(Debug)]
pub struct IndexResolution {
    ticket: u64,
    search: OccurrenceSearch,
    cursor: SearchCursor,
    /// Offset of the selection in the content root's text
    target: usize,
    text: String,
    markup: Option<String>,
    step: usize,
}

impl IndexResolution {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    fn capture(&self, occurrence: usize) -> Capture {
        Capture::Text {
            text: self.text.clone(),
            markup: self.markup.clone(),
            occurrence,
        }
    }

    /// Examine up to one step's worth of matches
    pub fn step(&mut self) -> Poll<Result<Capture>> {
        for _ in 0..self.step {
            let Some(m) = self.search.next_match(&mut self.cursor) else {
                return Poll::Ready(Err(AnchorError::EncodingFailure(format!(
                    "no occurrence of {:?} starts at the selection",
                    self.text
                ))));
            };
            if m.start == self.target {
                return Poll::Ready(Ok(self.capture(m.index)));
            }
            // Overlaps an earlier occurrence, so no index can address it
            if m.start > self.target {
                return Poll::Ready(Err(AnchorError::EncodingFailure(format!(
                    "selection of {:?} overlaps an earlier occurrence",
                    self.text
                ))));
            }
        }
        Poll::Pending
    }

    /// Drive the resolution to completion, yielding to the runtime between steps
    pub async fn run(mut self) -> Resolved {
        loop {
            match self.step() {
                Poll::Ready(result) => {
                    return Resolved {
                        ticket: self.ticket,
                        result,
                    }
                }
                Poll::Pending => tokio::task::yield_now().await,
            }
        }
    }
}

/// Selection state machine
pub struct SelectionValidator {
    config: AnchorConfig,
    mode: CommentMode,
    state: SelectionState,
    generation: u64,
    active: Option<u64>,
    result: Option<Capture>,
    last_error: Option<String>,
}

impl SelectionValidator {
    pub fn new(config: AnchorConfig, mode: CommentMode) -> Self {
        Self {
            config,
            mode,
            state: SelectionState::Empty,
            generation: 0,
            active: None,
            result: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// The valid capture, if any, without consuming it
    pub fn result(&self) -> Option<&Capture> {
        self.result.as_ref()
    }

    /// Why the last capture was rejected
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn search_options(&self) -> SearchOptions {
        self.config.search_options()
    }

    fn reject(&mut self, err: AnchorError) -> Begin {
        tracing::info!("Selection rejected: {}", err);
        self.active = None;
        self.state = SelectionState::Invalid;
        self.last_error = Some(err.to_string());
        Begin::Invalid(err)
    }

    fn accept(&mut self, capture: Capture) -> Begin {
        self.active = None;
        self.state = SelectionState::Valid;
        self.result = Some(capture.clone());
        Begin::Ready(capture)
    }

    /// Start capturing a selection, abandoning any capture in flight
    pub fn begin(&mut self, doc: &Document, layout: &dyn Layout, raw: RawSelection) -> Begin {
        if !self.mode.is_enabled() {
            return Begin::Disabled;
        }

        self.generation += 1;
        self.active = Some(self.generation);
        self.state = SelectionState::Capturing;
        self.result = None;
        self.last_error = None;

        let root = self.config.content_root_in(doc);
        let outside = |node: NodeId| !doc.is_inclusive_ancestor(root, node);

        match raw {
            RawSelection::Text(range) => self.begin_text(doc, root, range),
            RawSelection::Image(node) => {
                if outside(node) {
                    return self.reject(AnchorError::EncodingFailure(
                        "image is outside the page content".into(),
                    ));
                }
                match content_hash(doc, node, layout) {
                    Some(hash) => self.accept(Capture::Image { hash }),
                    None => self.reject(AnchorError::EncodingFailure(
                        "only images with a source can be commented".into(),
                    )),
                }
            }
            RawSelection::Block(node) => {
                if outside(node) {
                    return self.reject(AnchorError::EncodingFailure(
                        "block is outside the page content".into(),
                    ));
                }
                match block_selector(doc, node) {
                    Ok(selector) => self.accept(Capture::Block { selector }),
                    Err(e) => self.reject(e),
                }
            }
            RawSelection::Addon {
                node,
                name,
                payload,
            } => {
                if outside(node) || payload.is_empty() {
                    return self.reject(AnchorError::EncodingFailure(format!(
                        "no {} target selected",
                        name
                    )));
                }
                self.accept(Capture::Addon { name, payload })
            }
        }
    }

    fn begin_text(&mut self, doc: &Document, root: NodeId, range: TextRange) -> Begin {
        if range.is_collapsed() {
            return self.reject(AnchorError::EncodingFailure("selection is empty".into()));
        }
        let Some(text) = range.text(doc, root) else {
            return self.reject(AnchorError::EncodingFailure(
                "selection is outside the page content".into(),
            ));
        };
        if text.trim().is_empty() {
            return self.reject(AnchorError::EncodingFailure("selection is empty".into()));
        }

        let markup = doc
            .range_html(root, &range)
            .filter(|html| html.contains('<'));
        let search = OccurrenceSearch::new(doc, root, &text, self.search_options());
        let Some(target) = search.text_index().offset_of(range.start) else {
            return self.reject(AnchorError::EncodingFailure(
                "selection start is not in the page text".into(),
            ));
        };

        Begin::Pending(IndexResolution {
            ticket: self.generation,
            search,
            cursor: SearchCursor::default(),
            target,
            text,
            markup,
            step: self.config.resolve_step.max(1),
        })
    }

    /// Apply a finished resolution. Results from abandoned captures are ignored.
    pub fn complete(&mut self, resolved: Resolved) -> SelectionState {
        if self.active != Some(resolved.ticket) {
            tracing::debug!("Discarding stale capture #{}", resolved.ticket);
            return self.state;
        }
        match resolved.result {
            Ok(capture) => {
                self.accept(capture);
            }
            Err(e) => {
                self.reject(e);
            }
        }
        self.state
    }

    /// Begin and, if needed, run the index resolution to completion
    pub async fn capture(
        &mut self,
        doc: &Document,
        layout: &dyn Layout,
        raw: RawSelection,
    ) -> SelectionState {
        match self.begin(doc, layout, raw) {
            Begin::Pending(resolution) => {
                let resolved = resolution.run().await;
                self.complete(resolved)
            }
            _ => self.state,
        }
    }

    /// Consume a valid capture, returning to `Empty`
    pub fn take(&mut self) -> Option<Capture> {
        if self.state != SelectionState::Valid {
            return None;
        }
        self.state = SelectionState::Empty;
        self.result.take()
    }

    /// Drop whatever is in progress or pending
    pub fn clear(&mut self) {
        self.generation += 1;
        self.active = None;
        self.state = SelectionState::Empty;
        self.result = None;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{AttributeLayout, TextIndex, TextPoint};

    const PAGE: &str = r#"<html><body><div class="nav">the cat</div><div class="page" id="content"><p>the cat sat on the <b>cat</b> mat</p><img src="/a.png" width="4" height="4"/></div></body></html>"#;

    fn validator() -> SelectionValidator {
        SelectionValidator::new(AnchorConfig::default(), CommentMode::new(true))
    }

    fn range_of(doc: &Document, scope: NodeId, start: usize, end: usize) -> TextRange {
        TextIndex::build(doc, scope).range(start, end).unwrap()
    }

    fn page_root(doc: &Document) -> NodeId {
        doc.element_by_id("content").unwrap()
    }

    #[tokio::test]
    async fn test_text_capture_resolves_occurrence() {
        let doc = Document::parse(PAGE).unwrap();
        let range = range_of(&doc, page_root(&doc), 19, 22);
        let mut v = validator();
        let state = v.capture(&doc, &AttributeLayout, RawSelection::Text(range)).await;
        assert_eq!(state, SelectionState::Valid);
        assert_eq!(
            v.take(),
            Some(Capture::Text {
                text: "cat".into(),
                markup: None,
                occurrence: 1,
            })
        );
        assert_eq!(v.state(), SelectionState::Empty);
        assert!(v.take().is_none());
    }

    #[tokio::test]
    async fn test_markup_is_recorded() {
        let doc = Document::parse(PAGE).unwrap();
        let range = range_of(&doc, page_root(&doc), 15, 22);
        let mut v = validator();
        v.capture(&doc, &AttributeLayout, RawSelection::Text(range)).await;
        assert_eq!(
            v.take(),
            Some(Capture::Text {
                text: "the cat".into(),
                markup: Some("the <b>cat</b>".into()),
                occurrence: 1,
            })
        );
    }

    #[test]
    fn test_collapsed_and_outside_are_invalid() {
        let doc = Document::parse(PAGE).unwrap();
        let mut v = validator();

        let collapsed = range_of(&doc, page_root(&doc), 4, 7);
        let collapsed = TextRange::new(collapsed.start, collapsed.start);
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Text(collapsed)),
            Begin::Invalid(_)
        ));
        assert_eq!(v.state(), SelectionState::Invalid);

        let nav = doc.descendants(doc.root())
            .into_iter()
            .find(|&n| doc.has_class(n, "nav"))
            .unwrap();
        let outside = range_of(&doc, nav, 4, 7);
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Text(outside)),
            Begin::Invalid(_)
        ));
        assert!(v.last_error().is_some());
    }

    #[test]
    fn test_disabled_mode_ignores_selection() {
        let doc = Document::parse(PAGE).unwrap();
        let mode = CommentMode::new(false);
        let mut v = SelectionValidator::new(AnchorConfig::default(), mode.clone());
        let range = range_of(&doc, page_root(&doc), 4, 7);
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Text(range)),
            Begin::Disabled
        ));
        assert_eq!(v.state(), SelectionState::Empty);

        mode.set(true);
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Text(range)),
            Begin::Pending(_)
        ));
        assert_eq!(v.state(), SelectionState::Capturing);
    }

    #[tokio::test]
    async fn test_new_capture_cancels_in_flight() {
        let doc = Document::parse(PAGE).unwrap();
        let mut v = validator();
        let first = range_of(&doc, page_root(&doc), 4, 7);
        let Begin::Pending(stale) = v.begin(&doc, &AttributeLayout, RawSelection::Text(first)) else {
            panic!("expected a pending capture");
        };
        let second = range_of(&doc, page_root(&doc), 19, 22);
        let Begin::Pending(current) = v.begin(&doc, &AttributeLayout, RawSelection::Text(second)) else {
            panic!("expected a pending capture");
        };

        let stale = stale.run().await;
        assert_eq!(v.complete(stale), SelectionState::Capturing);
        let current = current.run().await;
        assert_eq!(v.complete(current), SelectionState::Valid);
        assert!(matches!(v.result(), Some(Capture::Text { occurrence: 1, .. })));
    }

    #[test]
    fn test_resolution_is_incremental() {
        let doc = Document::parse_fragment(r#"<div class="page"><p>x x x x x x x x</p></div>"#).unwrap();
        let config = AnchorConfig {
            resolve_step: 2,
            ..AnchorConfig::default()
        };
        let mut v = SelectionValidator::new(config, CommentMode::new(true));
        let root = doc.children(doc.root())[0];
        let last = range_of(&doc, root, 14, 15);
        let Begin::Pending(mut resolution) = v.begin(&doc, &AttributeLayout, RawSelection::Text(last)) else {
            panic!("expected a pending capture");
        };
        let mut polls = 1;
        let result = loop {
            match resolution.step() {
                Poll::Ready(r) => break r,
                Poll::Pending => polls += 1,
            }
        };
        assert_eq!(polls, 4);
        assert!(matches!(result, Ok(Capture::Text { occurrence: 7, .. })));
    }

    #[tokio::test]
    async fn test_overlapping_selection_is_invalid() {
        let doc = Document::parse_fragment(r#"<div class="page"><p>aaa</p></div>"#).unwrap();
        let root = doc.children(doc.root())[0];
        let mut v = validator();
        let range = range_of(&doc, root, 1, 3);
        let state = v.capture(&doc, &AttributeLayout, RawSelection::Text(range)).await;
        assert_eq!(state, SelectionState::Invalid);
    }

    #[test]
    fn test_image_and_block_captures() {
        let doc = Document::parse(PAGE).unwrap();
        let mut v = validator();
        let img = doc.elements_by_tag(doc.root(), "img")[0];
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Image(img)),
            Begin::Ready(Capture::Image { .. })
        ));
        let p = doc.elements_by_tag(doc.root(), "p")[0];
        let Begin::Ready(Capture::Block { selector }) =
            v.begin(&doc, &AttributeLayout, RawSelection::Block(p))
        else {
            panic!("expected a block capture");
        };
        assert_eq!(selector, r#"div[id="content"] > p:nth-of-type(1)"#);
    }

    #[tokio::test]
    async fn test_selection_inside_a_character_is_invalid() {
        let doc = Document::parse_fragment(r#"<div class="page"><p>café au lait</p></div>"#).unwrap();
        let root = doc.children(doc.root())[0];
        let text = doc.children(doc.children(root)[0])[0];
        let mut v = validator();
        let split = TextRange::new(TextPoint::new(text, 4), TextPoint::new(text, 8));
        let state = v.capture(&doc, &AttributeLayout, RawSelection::Text(split)).await;
        assert_eq!(state, SelectionState::Invalid);
        assert!(v.last_error().is_some());
    }

    #[tokio::test]
    async fn test_multibyte_occurrence() {
        let doc = Document::parse_fragment(r#"<div class="page"><p>crème brûlée, crème fraîche</p></div>"#).unwrap();
        let root = doc.children(doc.root())[0];
        let start = "crème brûlée, ".len();
        let range = range_of(&doc, root, start, start + "crème".len());
        let mut v = validator();
        let state = v.capture(&doc, &AttributeLayout, RawSelection::Text(range)).await;
        assert_eq!(state, SelectionState::Valid);
        assert_eq!(
            v.take(),
            Some(Capture::Text {
                text: "crème".into(),
                markup: None,
                occurrence: 1,
            })
        );
    }

    #[test]
    fn test_unknown_node_is_invalid() {
        let doc = Document::parse(PAGE).unwrap();
        let stale: NodeId = serde_json::from_str("9999").unwrap();
        let mut v = validator();
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Image(stale)),
            Begin::Invalid(_)
        ));
        assert!(matches!(
            v.begin(&doc, &AttributeLayout, RawSelection::Block(stale)),
            Begin::Invalid(_)
        ));
        assert_eq!(v.state(), SelectionState::Invalid);
    }

    #[test]
    fn test_clear_discards_result() {
        let doc = Document::parse(PAGE).unwrap();
        let mut v = validator();
        let img = doc.elements_by_tag(doc.root(), "img")[0];
        v.begin(&doc, &AttributeLayout, RawSelection::Image(img));
        assert_eq!(v.state(), SelectionState::Valid);
        v.clear();
        assert_eq!(v.state(), SelectionState::Empty);
        assert!(v.take().is_none());
    }
}
