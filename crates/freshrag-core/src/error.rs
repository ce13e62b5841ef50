//! Error taxonomy for the crawl and retrieval pipeline.
//!
//! Failure policy, in one place:
//!
//! - [`CoordinationError::Unavailable`] is fatal at startup: without the
//!   coordination service there is no mutual-exclusion guarantee and the
//!   system must not proceed.
//! - [`CoordinationError::Transient`] is retryable; it propagates to the
//!   caller of the individual operation.
//! - Fetch and index failures are recorded per target/artifact and never
//!   abort sibling work.
//! - Retrieval and generation failures surface to the query caller as a
//!   typed [`QueryError`]; there is no automatic retry.
//! - Slot-release failures are logged, not escalated; lease expiry is the
//!   backstop.

use thiserror::Error;

/// Failure talking to the coordination service.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The service could not be reached at all. Fatal at startup.
    #[error("coordination service unavailable: {0}")]
    Unavailable(String),

    /// A single operation failed; the caller may retry.
    #[error("coordination request failed: {0}")]
    Transient(String),
}

/// Failure while acquiring a semaphore slot.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// The caller's cancellation token fired while waiting for a slot.
    #[error("acquisition cancelled for domain {0}")]
    Cancelled(String),

    /// A caller-imposed bound elapsed before a slot became free.
    #[error("acquisition timed out for domain {0}")]
    Timeout(String),
}

/// Failure fetching or parsing a page. Recorded per target.
#[derive(Debug, Error)]
#[error("fetch failed for {url}: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Failure computing an embedding vector.
#[derive(Debug, Error)]
#[error("embedding failed: {0}")]
pub struct EmbedError(pub String);

/// Failure talking to the vector store.
#[derive(Debug, Error)]
#[error("vector store error: {0}")]
pub struct VectorStoreError(pub String);

/// Failure calling the generative model.
#[derive(Debug, Error)]
#[error("generation failed: {0}")]
pub struct GenerationError(pub String);

/// Failure answering a query. Surfaced to the caller, never retried
/// automatically.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// A target URL that cannot participate in crawling (no host component).
#[derive(Debug, Error)]
#[error("invalid crawl target {url}: {reason}")]
pub struct TargetError {
    pub url: String,
    pub reason: String,
}
