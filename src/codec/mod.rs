//! Position codec
//!
//! A descriptor is the persisted string that addresses a comment's target.
//! Its syntax selects the strategy that owns it:
//!
//! | strategy | form |
//! |---|---|
//! | markup occurrence | `<b>Hello</b>|0` (or entity-escaped) |
//! | plain occurrence | `Hello|0` |
//! | image | `img[HASH]` |
//! | literal selector | `div[id="x"] > p:nth-of-type(2)` |
//! | addon | `addon^NAME%PAYLOAD` |
//!
//! Main strategies are tried in registration order; addons are consulted
//! only when no main strategy claims the descriptor.

mod addon;
pub mod descriptor;
mod image;
mod selector;
mod text;

use serde::Serialize;

use crate::dom::{Document, Layout, NodeId, TextRange};
use crate::error::{AnchorError, Result};
use crate::search::SearchOptions;

pub use addon::{AddonAdapter, AddonStrategy, DiagramNodeStrategy};
pub use image::ImageStrategy;
pub use selector::LiteralSelectorStrategy;
pub use text::{MarkupOccurrenceStrategy, PlainOccurrenceStrategy};

/// What a descriptor resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Target {
    Text { range: TextRange },
    Element { node: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A decoded descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    pub target: Target,
    /// Where a marker for this target should be drawn, when the strategy knows better than the node box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_offset: Option<Point>,
}

impl Located {
    pub fn text(range: TextRange) -> Self {
        Self {
            target: Target::Text { range },
            display_offset: None,
        }
    }

    pub fn element(node: NodeId) -> Self {
        Self {
            target: Target::Element { node },
            display_offset: None,
        }
    }
}

/// A validated selection, ready to become a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Capture {
    Text {
        text: String,
        /// Serialised markup of the selection when it crosses element boundaries
        #[serde(skip_serializing_if = "Option::is_none")]
        markup: Option<String>,
        occurrence: usize,
    },
    Image { hash: String },
    Block { selector: String },
    Addon { name: String, payload: String },
}

/// Everything a strategy needs to decode against a document
pub struct CodecContext<'a> {
    pub doc: &'a Document,
    /// Element whose text the occurrence strategies search
    pub scope: NodeId,
    pub layout: &'a dyn Layout,
    pub search: SearchOptions,
}

/// One descriptor encoding
pub trait PositionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Does this descriptor belong to this strategy
    fn claims(&self, descriptor: &str) -> bool;

    /// Descriptor for a capture, `None` when the capture is not this strategy's kind
    fn encode(&self, capture: &Capture) -> Option<String>;

    /// Locate the descriptor's target, `None` when it no longer exists
    fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Option<Located>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Main,
    Addon,
}

/// Ordered strategy registry
#[derive(Default)]
pub struct StrategyRegistry {
    main: Vec<Box<dyn PositionStrategy>>,
    addons: Vec<Box<dyn PositionStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The four main strategies in their fixed precedence
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MarkupOccurrenceStrategy), Category::Main);
        registry.register(Box::new(PlainOccurrenceStrategy), Category::Main);
        registry.register(Box::new(ImageStrategy), Category::Main);
        registry.register(Box::new(LiteralSelectorStrategy), Category::Main);
        registry
    }

    pub fn register(&mut self, strategy: Box<dyn PositionStrategy>, category: Category) {
        tracing::debug!("Registering {:?} strategy '{}'", category, strategy.name());
        match category {
            Category::Main => self.main.push(strategy),
            Category::Addon => self.addons.push(strategy),
        }
    }

    /// Register an addon under its own name
    pub fn register_addon<A: AddonStrategy + 'static>(&mut self, addon: A) {
        self.register(Box::new(AddonAdapter::new(addon)), Category::Addon);
    }

    fn ordered(&self) -> impl Iterator<Item = &dyn PositionStrategy> {
        self.main.iter().chain(self.addons.iter()).map(|s| s.as_ref())
    }

    /// Names of every strategy claiming the descriptor, in precedence order
    pub fn claimants(&self, descriptor: &str) -> Vec<&str> {
        self.ordered()
            .filter(|s| s.claims(descriptor))
            .map(|s| s.name())
            .collect()
    }

    /// Owner of a descriptor: the first claiming main strategy, else the first claiming addon
    ///
    /// Several claimants is an invariant violation; it is logged and the first one wins.
    pub fn resolve(&self, descriptor: &str) -> Option<&dyn PositionStrategy> {
        let claimants = self.claimants(descriptor);
        if claimants.len() > 1 {
            let err = AnchorError::AmbiguousStrategyMatch {
                descriptor: descriptor.to_string(),
                strategies: claimants.iter().map(|s| s.to_string()).collect(),
            };
            tracing::warn!("{}", err);
        }
        self.ordered().find(|s| s.claims(descriptor))
    }

    /// Locate a descriptor's target
    pub fn decode(&self, ctx: &CodecContext<'_>, descriptor: &str) -> Result<Located> {
        let strategy = self.resolve(descriptor).ok_or_else(|| {
            AnchorError::DecodeNotFound(format!("no strategy claims '{}'", descriptor))
        })?;
        strategy.decode(ctx, descriptor).ok_or_else(|| {
            AnchorError::DecodeNotFound(format!("'{}' ({})", descriptor, strategy.name()))
        })
    }

    /// Turn a capture into a descriptor that exactly one strategy claims: the producer
    pub fn encode(&self, capture: &Capture) -> Result<String> {
        for strategy in self.ordered() {
            let Some(descriptor) = strategy.encode(capture) else {
                continue;
            };
            let claimants = self.claimants(&descriptor);
            if claimants.as_slice() != [strategy.name()] {
                return Err(AnchorError::EncodingFailure(format!(
                    "'{}' from {} is claimed by {:?}",
                    descriptor,
                    strategy.name(),
                    claimants
                )));
            }
            return Ok(descriptor);
        }
        Err(AnchorError::EncodingFailure(format!(
            "no strategy encodes {:?}",
            capture
        )))
    }
}
