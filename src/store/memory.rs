//! In-memory comment store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CommentStatus, CommentStore, CreateOutcome, PageContext, StatusFilter, StoreError, StoreResult,
};
use crate::anchor::CommentAnchor;

#[derive(Debug, Clone)]
struct StoredComment {
    /// Insertion order
    seq: u64,
    page: PageContext,
    anchor: CommentAnchor,
    text: String,
    status: CommentStatus,
    updated_at: DateTime<Utc>,
}

/// Comments held in a map behind an async lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    comments: RwLock<HashMap<String, StoredComment>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Seed the store with existing anchors for `page`
    pub async fn with_anchors(page: &PageContext, anchors: Vec<CommentAnchor>) -> Self {
        let store = Self::new();
        {
            let mut comments = store.comments.write().await;
            let now = Utc::now();
            for anchor in anchors {
                comments.insert(
                    anchor.data_id.clone(),
                    StoredComment {
                        seq: store.seq(),
                        page: page.clone(),
                        anchor,
                        text: String::new(),
                        status: CommentStatus::Open,
                        updated_at: now,
                    },
                );
            }
        }
        store
    }

    pub async fn len(&self) -> usize {
        self.comments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.comments.read().await.is_empty()
    }

    /// Text of a stored comment
    pub async fn text(&self, id: &str) -> Option<String> {
        self.comments.read().await.get(id).map(|c| c.text.clone())
    }

    pub async fn updated_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.comments.read().await.get(id).map(|c| c.updated_at)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create(&self, descriptor: &str, text: &str, page: &PageContext) -> StoreResult<CreateOutcome> {
        if descriptor.is_empty() {
            return Err(StoreError::Invalid("empty position descriptor".into()));
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let stored = StoredComment {
            seq: self.seq(),
            page: page.clone(),
            anchor: CommentAnchor::new(id.clone(), descriptor),
            text: text.to_string(),
            status: CommentStatus::Open,
            updated_at: now,
        };
        self.comments.write().await.insert(id.clone(), stored);
        tracing::debug!("Created comment {} on page {}", id, page.page_id);

        Ok(CreateOutcome {
            data_id: id,
            created_at: now.to_rfc3339(),
        })
    }

    async fn list(&self, page: &PageContext, status: StatusFilter) -> StoreResult<Vec<CommentAnchor>> {
        let comments = self.comments.read().await;
        let mut matching: Vec<&StoredComment> = comments
            .values()
            .filter(|c| c.page.page_id == page.page_id && status.accepts(c.status))
            .collect();
        matching.sort_by_key(|c| c.seq);
        Ok(matching.into_iter().map(|c| c.anchor.clone()).collect())
    }

    async fn update(&self, id: &str, status: Option<CommentStatus>, text: Option<&str>) -> StoreResult<()> {
        let mut comments = self.comments.write().await;
        let comment = comments
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(status) = status {
            comment.status = status;
        }
        if let Some(text) = text {
            comment.text = text.to_string();
        }
        comment.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.comments
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
