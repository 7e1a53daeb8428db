//! Wiki Anchor Library
//!
//! Anchors comments to positions in wiki pages and finds them again after the
//! page has been re-rendered or edited.
//!
//! # Modules
//!
//! - `dom`: arena document, XHTML parsing, text ranges, CSS selectors
//! - `search`: nth-occurrence text search
//! - `hash`: image content fingerprints
//! - `codec`: position descriptors and the strategy registry
//! - `capture`: selection validation and occurrence resolution
//! - `highlight`: reversible highlight markers
//! - `anchor`: bulk re-anchoring of stored comments
//! - `store`: comment persistence interface

pub mod anchor;
pub mod capture;
pub mod codec;
pub mod config;
pub mod dom;
pub mod error;
pub mod hash;
pub mod highlight;
pub mod search;
pub mod store;

pub use anchor::{BrokenAnchor, CommentAnchor, ElementPos, HighlightInfo, LoadReport, Reanchorer};
pub use capture::{CommentMode, RawSelection, SelectionState, SelectionValidator};
pub use codec::{Capture, Category, Located, PositionStrategy, StrategyRegistry, Target};
pub use config::AnchorConfig;
pub use dom::{Document, NodeId};
pub use error::{AnchorError, Result};
pub use highlight::Highlighter;
pub use search::{find_nth, find_occurrences, SearchOptions, UNRESOLVED_OCCURRENCE};
