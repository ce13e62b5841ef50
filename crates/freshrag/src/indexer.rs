//! Embedding indexer: crawl artifacts into the vector store.
//!
//! Re-running an indexing pass is idempotent: the artifact's domain is
//! the document id, and the vector store upserts, so a domain never has
//! more than one record.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use freshrag_core::embedding::Embedder;
use freshrag_core::models::IndexResult;
use freshrag_core::vector_store::VectorStore;

use crate::content_store::ContentStore;

pub struct EmbeddingIndexer {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    content_store: Arc<ContentStore>,
}

impl EmbeddingIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        content_store: Arc<ContentStore>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            content_store,
        }
    }

    /// Index every stored artifact, returning one outcome per artifact
    /// that was embedded. Artifacts with empty text are skipped without
    /// an entry; there is nothing meaningful to embed.
    ///
    /// A failure on one artifact is recorded in its [`IndexResult`] and
    /// does not stop the pass.
    pub async fn index_all(&self) -> Result<Vec<IndexResult>> {
        let artifacts = self.content_store.read_all()?;
        let mut results = Vec::new();

        for artifact in artifacts {
            if artifact.text.trim().is_empty() {
                debug!(domain = %artifact.domain, "skipping artifact with empty text");
                continue;
            }

            let outcome = self.index_one(&artifact.domain, &artifact.text).await;
            if let Some(error) = &outcome.error {
                warn!(domain = %outcome.doc_id, error = %error, "indexing failed");
            }
            results.push(outcome);
        }

        Ok(results)
    }

    async fn index_one(&self, doc_id: &str, text: &str) -> IndexResult {
        let vector = match self.embedder.embed_one(text).await {
            Ok(v) => v,
            Err(e) => {
                return IndexResult {
                    doc_id: doc_id.to_string(),
                    error: Some(e.to_string()),
                }
            }
        };
        match self.vector_store.upsert(doc_id, &vector, text).await {
            Ok(()) => IndexResult {
                doc_id: doc_id.to_string(),
                error: None,
            },
            Err(e) => IndexResult {
                doc_id: doc_id.to_string(),
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use freshrag_core::error::EmbedError;
    use freshrag_core::models::CrawlArtifact;
    use freshrag_core::vector_store::memory::InMemoryVectorStore;

    /// Deterministic embedder: vector derived from byte content, so
    /// different texts map to different vectors.
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }

        fn dims(&self) -> usize {
            4
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let sum: u32 = t.bytes().map(u32::from).sum();
                    vec![sum as f32, t.len() as f32, 1.0, 0.0]
                })
                .collect())
        }
    }

    fn write_artifact(store: &ContentStore, domain: &str, text: &str) {
        store
            .write_artifact(&CrawlArtifact {
                domain: domain.to_string(),
                title: String::new(),
                text: text.to_string(),
                fetched_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_text_skipped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let content = Arc::new(ContentStore::new(dir.path()));
        write_artifact(&content, "empty.example", "   ");
        write_artifact(&content, "full.example", "some text");

        let vectors = Arc::new(InMemoryVectorStore::new());
        let indexer = EmbeddingIndexer::new(Arc::new(FakeEmbedder), vectors.clone(), content);

        let results = indexer.index_all().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "full.example");
        assert!(results[0].error.is_none());
        assert_eq!(vectors.len(), 1);
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent_and_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let content = Arc::new(ContentStore::new(dir.path()));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let indexer =
            EmbeddingIndexer::new(Arc::new(FakeEmbedder), vectors.clone(), content.clone());

        write_artifact(&content, "billboard.com", "first crawl");
        indexer.index_all().await.unwrap();
        let first = vectors.vector_for("billboard.com").unwrap();

        write_artifact(&content, "billboard.com", "second crawl with more text");
        indexer.index_all().await.unwrap();

        assert_eq!(vectors.len(), 1);
        let second = vectors.vector_for("billboard.com").unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_embed_failure_recorded_per_artifact() {
        struct FailingEmbedder;

        #[async_trait]
        impl Embedder for FailingEmbedder {
            fn model_name(&self) -> &str {
                "failing"
            }
            fn dims(&self) -> usize {
                4
            }
            async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
                Err(EmbedError("model not loaded".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let content = Arc::new(ContentStore::new(dir.path()));
        write_artifact(&content, "a.example", "text a");
        write_artifact(&content, "b.example", "text b");

        let indexer = EmbeddingIndexer::new(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            content,
        );

        let results = indexer.index_all().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.error.is_some()));
    }
}
