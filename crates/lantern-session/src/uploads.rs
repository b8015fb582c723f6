//! Capacity-bounded cache of uploaded documents.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Extracted text of one uploaded document. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub id: String,
    pub name: String,
    pub text: Arc<str>,
    pub uploaded_at: DateTime<Utc>,
}

/// Holds uploaded documents by id, evicting the oldest-inserted entry when full.
///
/// Lookups use `peek` so reads never change eviction order.
pub struct UploadCache {
    documents: Mutex<LruCache<String, Arc<UploadedDocument>>>,
}

impl UploadCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            documents: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Store a document under a fresh id.
    pub fn insert(&self, name: impl Into<String>, text: impl Into<Arc<str>>) -> Arc<UploadedDocument> {
        let document = Arc::new(UploadedDocument {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            text: text.into(),
            uploaded_at: Utc::now(),
        });

        let mut documents = self.documents.lock();
        if let Some((evicted, _)) = documents.push(document.id.clone(), document.clone()) {
            tracing::debug!(file_id = %evicted, "Evicted oldest upload");
        }
        tracing::debug!(file_id = %document.id, name = %document.name, cached = documents.len(), "Upload cached");
        document
    }

    pub fn get(&self, id: &str) -> Option<Arc<UploadedDocument>> {
        self.documents.lock().peek(id).cloned()
    }

    /// Look up several ids in order; fails on the first missing one.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<UploadedDocument>>> {
        let documents = self.documents.lock();
        ids.iter()
            .map(|id| {
                documents
                    .peek(id.as_str())
                    .cloned()
                    .ok_or_else(|| Error::UploadNotFound(id.clone()))
            })
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.documents.lock().cap().get()
    }
}
