//! Thin retriever facades over [`LanceDocumentStore`].
//!
//! Each retriever holds a shared store handle, a default `top_k` and an
//! optional default filter; `retrieve` forwards to the store with
//! call-time overrides taking precedence. No state, no caching, no side
//! effects beyond the store call.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lancedocs_core::{Document, Filter};
use lancedocs_store::{DistanceMetric, LanceDocumentStore, Result};

pub const DEFAULT_TOP_K: usize = 10;

fn default_top_k() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_TOP_K).expect("default top_k is non-zero")
}

/// Retrieves documents by vector similarity.
pub struct EmbeddingRetriever {
    store: Arc<LanceDocumentStore>,
    top_k: NonZeroUsize,
    filter: Option<Filter>,
    metric: DistanceMetric,
}

impl EmbeddingRetriever {
    pub fn new(store: Arc<LanceDocumentStore>) -> Self {
        Self {
            store,
            top_k: default_top_k(),
            filter: None,
            metric: DistanceMetric::default(),
        }
    }

    pub fn with_top_k(mut self, top_k: NonZeroUsize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Top-k nearest documents for `query_embedding`. Call-time `top_k`
    /// and `filter` take precedence over the retriever's defaults.
    /// Ranking and score semantics are those of
    /// [`LanceDocumentStore::similarity_search`].
    pub async fn retrieve(
        &self,
        query_embedding: &[f32],
        top_k: Option<NonZeroUsize>,
        filter: Option<&Filter>,
    ) -> Result<Vec<Document>> {
        let k = top_k.unwrap_or(self.top_k).get();
        let filter = filter.or(self.filter.as_ref());
        self.store
            .similarity_search(query_embedding, k, filter, self.metric)
            .await
    }
}

/// Retrieves documents through the store's full-text index.
pub struct FtsRetriever {
    store: Arc<LanceDocumentStore>,
    top_k: NonZeroUsize,
    filter: Option<Filter>,
    text_field: String,
}

impl FtsRetriever {
    pub fn new(store: Arc<LanceDocumentStore>) -> Self {
        Self {
            store,
            top_k: default_top_k(),
            filter: None,
            text_field: "content".to_string(),
        }
    }

    pub fn with_top_k(mut self, top_k: NonZeroUsize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_text_field(mut self, text_field: impl Into<String>) -> Self {
        self.text_field = text_field.into();
        self
    }

    /// Top-k lexical matches for `query`. Call-time `top_k` and `filter`
    /// take precedence over the retriever's defaults. Requires the
    /// full-text index to exist; see
    /// [`LanceDocumentStore::text_search`].
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<NonZeroUsize>,
        filter: Option<&Filter>,
    ) -> Result<Vec<Document>> {
        let k = top_k.unwrap_or(self.top_k).get();
        let filter = filter.or(self.filter.as_ref());
        self.store
            .text_search(query, k, filter, &self.text_field)
            .await
    }
}
