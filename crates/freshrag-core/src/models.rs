//! Data model for the crawl and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::coordination::LeaseId;
use crate::error::TargetError;

/// A site to crawl, created from static configuration.
///
/// The domain is the URL's host with a leading `www.` stripped, so
/// `https://a.example/` and `https://www.a.example/` compete for the same
/// semaphore slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    pub domain: String,
}

impl CrawlTarget {
    /// Parse a target URL and derive its concurrency domain.
    pub fn parse(url: &str) -> Result<Self, TargetError> {
        let parsed = Url::parse(url).map_err(|e| TargetError {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| TargetError {
            url: url.to_string(),
            reason: "no host component".to_string(),
        })?;
        Ok(Self {
            url: url.to_string(),
            domain: strip_www(host).to_string(),
        })
    }
}

/// Strip a single leading `www.` label from a hostname.
fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// One unit of crawl concurrency held against a domain.
///
/// Owned exclusively by the task that acquired it. Released explicitly on
/// completion; if the owning process dies first, the lease TTL expires the
/// key. That expiry is the system's sole crash-recovery mechanism.
#[derive(Debug, Clone)]
pub struct SemaphoreSlot {
    pub domain: String,
    pub slot_key: String,
    pub lease_id: LeaseId,
    pub expires_at: DateTime<Utc>,
}

/// The content extracted from one successful crawl of a domain.
///
/// Persisted as one JSON document per domain; re-crawling overwrites the
/// prior artifact (last-write-wins, no versioning).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlArtifact {
    pub domain: String,
    pub title: String,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Per-target outcome of a crawl batch.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub url: String,
    /// Where the artifact was written, when the crawl succeeded.
    pub output_location: Option<String>,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn ok(url: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_location: Some(location.into()),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_location: None,
            error: Some(error.into()),
        }
    }
}

/// Per-artifact outcome of an indexing pass.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub doc_id: String,
    pub error: Option<String>,
}

/// A document returned from nearest-neighbour search.
#[derive(Debug, Clone)]
pub struct RetrievedDoc {
    pub doc_id: String,
    pub text: String,
    pub score: f32,
}

/// Ephemeral state of one query: built fresh per call, never persisted.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub query: String,
    pub query_vector: Vec<f32>,
    pub retrieved_docs: Vec<RetrievedDoc>,
}

impl QueryContext {
    /// The retrieved documents' text, newline-separated, in retrieval order.
    pub fn context_string(&self) -> String {
        self.retrieved_docs
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
