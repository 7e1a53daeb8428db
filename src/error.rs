//! Error types for comment anchoring

use thiserror::Error;

use crate::dom::{DomError, SelectorError};

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AnchorError>;

/// Anchoring error type
///
/// Only the input errors (`Dom`, `Selector`) stop an operation at the crate
/// boundary. The rest are per-comment outcomes that callers classify.
#[derive(Error, Debug)]
pub enum AnchorError {
    /// The selection cannot be turned into a descriptor ("cannot comment here")
    #[error("Cannot encode selection: {0}")]
    EncodingFailure(String),

    /// The descriptor no longer resolves to a live target
    #[error("Anchor not found: {0}")]
    DecodeNotFound(String),

    /// Highlighting would corrupt the document structure
    #[error("Cannot highlight range: {0}")]
    ExtractionFailure(String),

    /// More than one strategy claims a descriptor
    #[error("Descriptor '{descriptor}' claimed by {strategies:?}")]
    AmbiguousStrategyMatch {
        descriptor: String,
        strategies: Vec<String>,
    },

    #[error("Document error: {0}")]
    Dom(#[from] DomError),

    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),
}

impl AnchorError {
    /// True for outcomes that mark an anchor as broken rather than failing a load
    pub fn is_broken_anchor(&self) -> bool {
        matches!(
            self,
            AnchorError::DecodeNotFound(_) | AnchorError::ExtractionFailure(_)
        )
    }
}
