//! Retrieval-augmented query engine.
//!
//! One pass per question: embed the query, pull the nearest documents,
//! join their text with newlines, and hand context plus question to the
//! generator. Nothing is cached between calls, and failures surface as
//! typed [`QueryError`]s; the caller decides whether to retry.

use std::sync::Arc;
use tracing::debug;

use freshrag_core::embedding::Embedder;
use freshrag_core::error::QueryError;
use freshrag_core::generator::{GenerationMode, GenerationRequest, Generator};
use freshrag_core::models::QueryContext;
use freshrag_core::vector_store::VectorStore;

pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    top_n: usize,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        top_n: usize,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            generator,
            top_n: top_n.max(1),
        }
    }

    /// Embed the query and fetch its nearest documents.
    ///
    /// An empty store yields an empty context, not an error; the
    /// generator still runs with whatever context there is.
    pub async fn retrieve(&self, query: &str) -> Result<QueryContext, QueryError> {
        let query_vector = self.embedder.embed_one(query).await?;
        let retrieved_docs = self.vector_store.query(&query_vector, self.top_n).await?;
        debug!(
            query,
            retrieved = retrieved_docs.len(),
            "retrieved context documents"
        );
        Ok(QueryContext {
            query: query.to_string(),
            query_vector,
            retrieved_docs,
        })
    }

    /// Full retrieval-augmented answer for `query`.
    pub async fn answer(&self, query: &str, mode: GenerationMode) -> Result<String, QueryError> {
        let context = self.retrieve(query).await?;
        self.answer_with_context(&context, mode).await
    }

    /// Generate from an already-retrieved context. Lets callers show or
    /// log the context before spending a generation call on it.
    pub async fn answer_with_context(
        &self,
        context: &QueryContext,
        mode: GenerationMode,
    ) -> Result<String, QueryError> {
        let request = GenerationRequest {
            context: context.context_string(),
            question: context.query.clone(),
            mode,
        };
        Ok(self.generator.generate(&request).await?)
    }
}
