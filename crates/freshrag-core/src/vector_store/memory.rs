//! In-memory [`VectorStore`] implementation.
//!
//! Brute-force cosine similarity over all stored vectors, behind a
//! `std::sync::RwLock`. Suitable for a single-process index rebuilt from
//! crawl artifacts, and for tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::VectorStore;
use crate::embedding::cosine_similarity;
use crate::error::VectorStoreError;
use crate::models::RetrievedDoc;

struct Record {
    vector: Vec<f32>,
    text: String,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, Record>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, for test assertions.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored vector for `doc_id`, for test assertions.
    pub fn vector_for(&self, doc_id: &str) -> Option<Vec<f32>> {
        self.records
            .read()
            .unwrap()
            .get(doc_id)
            .map(|r| r.vector.clone())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        doc_id: &str,
        vector: &[f32],
        text: &str,
    ) -> Result<(), VectorStoreError> {
        let mut records = self.records.write().unwrap();
        records.insert(
            doc_id.to_string(),
            Record {
                vector: vector.to_vec(),
                text: text.to_string(),
            },
        );
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<RetrievedDoc>, VectorStoreError> {
        let records = self.records.read().unwrap();
        let mut scored: Vec<RetrievedDoc> = records
            .iter()
            .map(|(doc_id, record)| RetrievedDoc {
                doc_id: doc_id.clone(),
                text: record.text.clone(),
                score: cosine_similarity(vector, &record.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_n);
        Ok(scored)
    }
}
