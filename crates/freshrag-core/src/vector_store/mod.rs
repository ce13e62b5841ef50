//! Vector-store abstraction.
//!
//! The pipeline only ever upserts and queries; it never reads records
//! back or manages index internals. Backends must document their
//! similarity metric and hold it fixed; the bundled [`memory`] store
//! uses cosine similarity.

pub mod memory;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::RetrievedDoc;

/// External vector index exposing upsert and nearest-neighbour query.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the record for `doc_id`. Upsert semantics make
    /// re-indexing idempotent: the same id always maps to one record.
    async fn upsert(
        &self,
        doc_id: &str,
        vector: &[f32],
        text: &str,
    ) -> Result<(), VectorStoreError>;

    /// Return the `top_n` most similar documents, best first.
    async fn query(
        &self,
        vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<RetrievedDoc>, VectorStoreError>;
}
