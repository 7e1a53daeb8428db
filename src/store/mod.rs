//! Comment persistence interface
//!
//! The anchoring core never performs I/O. Hosts implement [`CommentStore`]
//! over whatever backend holds their comments; [`MemoryStore`] backs tests
//! and the command-line tool.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchor::CommentAnchor;

pub use memory::MemoryStore;

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Comment not found: {0}")]
    NotFound(String),

    #[error("Invalid comment: {0}")]
    Invalid(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Page a comment belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageContext {
    pub page_id: String,
    #[serde(default)]
    pub revision: Option<String>,
}

impl PageContext {
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            revision: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(CommentStatus),
}

impl StatusFilter {
    pub fn accepts(&self, status: CommentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

/// Result of creating a comment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateOutcome {
    pub data_id: String,
    pub created_at: String,
}

/// Comment persistence
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Store a new comment anchored at `descriptor`
    async fn create(&self, descriptor: &str, text: &str, page: &PageContext) -> StoreResult<CreateOutcome>;

    /// Anchors of a page's comments, oldest first
    async fn list(&self, page: &PageContext, status: StatusFilter) -> StoreResult<Vec<CommentAnchor>>;

    /// Change a comment's status and/or text
    async fn update(&self, id: &str, status: Option<CommentStatus>, text: Option<&str>) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;
}
