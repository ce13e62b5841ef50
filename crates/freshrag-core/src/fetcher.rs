//! Page-fetching capability trait.

use async_trait::async_trait;

use crate::error::FetchError;

/// The content extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub title: String,
    pub text: String,
}

/// Capability that turns a URL into `{title, text}`.
///
/// Fetching and HTML parsing are external collaborators of the pipeline;
/// the orchestrator only sees this trait.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}
