//! Re-anchoring
//!
//! Decodes every stored comment against the current document, highlights the
//! ones that still resolve and reports the rest as broken. One comment's
//! failure never affects another.

mod types;

use crate::codec::{Capture, CodecContext, DiagramNodeStrategy, Located, StrategyRegistry};
use crate::config::AnchorConfig;
use crate::dom::{AttributeLayout, Document, Layout, NodeId};
use crate::error::{AnchorError, Result};
use crate::highlight::Highlighter;

pub use types::{BrokenAnchor, CommentAnchor, ElementPos, HighlightInfo, LoadReport};

/// Re-anchoring orchestrator for one document
pub struct Reanchorer {
    config: AnchorConfig,
    registry: StrategyRegistry,
    highlighter: Highlighter,
    layout: Box<dyn Layout + Send + Sync>,
    /// Comments highlighted by previous loads, for re-application after a partial teardown
    loaded: Vec<CommentAnchor>,
}

impl Reanchorer {
    pub fn new(
        config: AnchorConfig,
        registry: StrategyRegistry,
        layout: Box<dyn Layout + Send + Sync>,
    ) -> Self {
        let highlighter = Highlighter::new(&config);
        Self {
            config,
            registry,
            highlighter,
            layout,
            loaded: Vec::new(),
        }
    }

    /// Default strategies plus the diagram addon, geometry read from markup
    pub fn with_defaults(config: AnchorConfig) -> Self {
        let mut registry = StrategyRegistry::with_defaults();
        registry.register_addon(DiagramNodeStrategy::default());
        Self::new(config, registry, Box::new(AttributeLayout))
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn layout(&self) -> &dyn Layout {
        self.layout.as_ref()
    }

    /// Decode context rooted at the page content
    pub fn context<'a>(&'a self, doc: &'a Document) -> CodecContext<'a> {
        CodecContext {
            doc,
            scope: self.config.content_root_in(doc),
            layout: self.layout.as_ref(),
            search: self.config.search_options(),
        }
    }

    /// Locate a descriptor without touching the document
    pub fn locate(&self, doc: &Document, pos: &str) -> Result<Located> {
        self.registry.decode(&self.context(doc), pos)
    }

    /// Descriptor for a validated capture
    pub fn encode(&self, capture: &Capture) -> Result<String> {
        self.registry.encode(capture)
    }

    fn anchor_one(&mut self, doc: &mut Document, scope: NodeId, comment: &CommentAnchor) -> Result<(NodeId, Located)> {
        let located = {
            let ctx = CodecContext {
                doc: &*doc,
                scope,
                layout: self.layout.as_ref(),
                search: self.config.search_options(),
            };
            self.registry.decode(&ctx, &comment.pos)?
        };
        let marker = self.highlighter.apply(doc, &comment.data_id, &located.target)?;
        Ok((marker, located))
    }

    /// Re-anchor and highlight every comment, in input order
    ///
    /// Successful comments get their `element_pos` updated; broken ones have
    /// it cleared and are listed in the report with the reason.
    pub fn load_all(&mut self, doc: &mut Document, comments: &mut [CommentAnchor]) -> LoadReport {
        let scope = self.config.content_root_in(doc);
        let mut report = LoadReport::default();

        for comment in comments.iter_mut() {
            match self.anchor_one(doc, scope, comment) {
                Ok((marker, located)) => {
                    let element_pos = self.layout.nearest_box(doc, marker).map(|r| ElementPos {
                        top: r.y,
                        left: r.x,
                    });
                    comment.element_pos = element_pos;
                    tracing::debug!("Anchored comment {} at {:?}", comment.data_id, comment.pos);

                    report.resolved_count += 1;
                    report.highlights.push(HighlightInfo {
                        id: comment.data_id.clone(),
                        target: Some(marker),
                        top: element_pos.map(|p| p.top),
                        display_offset: located.display_offset,
                        is_broken: false,
                    });
                    self.loaded.retain(|c| c.data_id != comment.data_id);
                    self.loaded.push(comment.clone());
                }
                Err(err) => {
                    match &err {
                        AnchorError::ExtractionFailure(_) => {
                            tracing::error!("Cannot highlight comment {}: {}", comment.data_id, err)
                        }
                        _ => tracing::warn!("Broken anchor for comment {}: {}", comment.data_id, err),
                    }
                    comment.element_pos = None;
                    report.broken.push(BrokenAnchor {
                        data_id: comment.data_id.clone(),
                        pos: comment.pos.clone(),
                        image: comment.image.clone(),
                        reason: err.to_string(),
                    });
                    report.highlights.push(HighlightInfo {
                        id: comment.data_id.clone(),
                        target: None,
                        top: None,
                        display_offset: None,
                        is_broken: true,
                    });
                }
            }
        }

        tracing::info!(
            "Re-anchored {} of {} comments ({} broken)",
            report.resolved_count,
            comments.len(),
            report.broken.len()
        );
        report
    }

    /// Remove the highlights of `ids`
    ///
    /// Other comments whose highlights had to be unwound are anchored again;
    /// the returned report covers those.
    pub fn teardown(&mut self, doc: &mut Document, ids: &[String]) -> LoadReport {
        let collateral = self.highlighter.teardown(doc, ids);
        self.loaded.retain(|c| !ids.contains(&c.data_id));

        let mut again: Vec<CommentAnchor> = self
            .loaded
            .iter()
            .filter(|c| collateral.contains(&c.data_id))
            .cloned()
            .collect();
        if again.is_empty() {
            return LoadReport::default();
        }
        self.load_all(doc, &mut again)
    }

    /// Remove every highlight this orchestrator applied
    pub fn teardown_all(&mut self, doc: &mut Document) {
        self.highlighter.teardown_all(doc);
        self.loaded.clear();
    }

    /// Tear everything down and anchor `comments` from scratch
    pub fn reload(&mut self, doc: &mut Document, comments: &mut [CommentAnchor]) -> LoadReport {
        self.teardown_all(doc);
        self.load_all(doc, comments)
    }

    /// Comment whose highlight contains `node`
    pub fn comment_at(&self, doc: &Document, node: NodeId) -> Option<&str> {
        self.highlighter.comment_at(doc, node)
    }
}
