//! Crawl orchestration: one task per target, gated per domain.
//!
//! Each target acquires a semaphore slot for its domain before fetching,
//! and releases it whether or not the fetch succeeded. A failed target is
//! recorded in its [`CrawlResult`] and never aborts the siblings.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use freshrag_core::cancel::CancelToken;
use freshrag_core::fetcher::PageFetcher;
use freshrag_core::models::{CrawlArtifact, CrawlResult, CrawlTarget};
use freshrag_core::semaphore::DomainSemaphore;

use crate::content_store::ContentStore;

pub struct CrawlOrchestrator {
    semaphore: Arc<DomainSemaphore>,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<ContentStore>,
}

impl CrawlOrchestrator {
    pub fn new(
        semaphore: Arc<DomainSemaphore>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<ContentStore>,
    ) -> Self {
        Self {
            semaphore,
            fetcher,
            store,
        }
    }

    /// Crawl every target concurrently and collect per-target outcomes,
    /// in the same order as `targets`.
    pub async fn run(&self, targets: &[CrawlTarget], cancel: &CancelToken) -> Vec<CrawlResult> {
        let tasks = targets.iter().map(|target| {
            let semaphore = self.semaphore.clone();
            let fetcher = self.fetcher.clone();
            let store = self.store.clone();
            let target = target.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                crawl_one(&semaphore, fetcher.as_ref(), &store, &target, &cancel).await
            })
        });

        join_all(tasks)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| match joined {
                Ok(result) => result,
                Err(e) => CrawlResult::failed(&target.url, format!("task panicked: {e}")),
            })
            .collect()
    }
}

async fn crawl_one(
    semaphore: &DomainSemaphore,
    fetcher: &dyn PageFetcher,
    store: &ContentStore,
    target: &CrawlTarget,
    cancel: &CancelToken,
) -> CrawlResult {
    let slot = match semaphore.acquire(&target.domain, cancel).await {
        Ok(slot) => slot,
        Err(e) => {
            warn!(url = %target.url, error = %e, "could not acquire crawl slot");
            return CrawlResult::failed(&target.url, e.to_string());
        }
    };

    // The slot is released on every path past this point.
    let outcome = fetch_and_store(fetcher, store, target).await;
    semaphore.release(slot).await;

    match outcome {
        Ok(location) => {
            info!(url = %target.url, location = %location, "crawled");
            CrawlResult::ok(&target.url, location)
        }
        Err(reason) => {
            warn!(url = %target.url, error = %reason, "crawl failed");
            CrawlResult::failed(&target.url, reason)
        }
    }
}

async fn fetch_and_store(
    fetcher: &dyn PageFetcher,
    store: &ContentStore,
    target: &CrawlTarget,
) -> Result<String, String> {
    let page = fetcher
        .fetch(&target.url)
        .await
        .map_err(|e| e.to_string())?;
    let artifact = CrawlArtifact {
        domain: target.domain.clone(),
        title: page.title,
        text: page.text,
        fetched_at: chrono::Utc::now(),
    };
    let path = store
        .write_artifact(&artifact)
        .map_err(|e| e.to_string())?;
    Ok(path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use freshrag_core::coordination::memory::InMemoryCoordinator;
    use freshrag_core::error::FetchError;
    use freshrag_core::fetcher::FetchedPage;
    use std::time::Duration;

    struct FakeFetcher;

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            if url.contains("broken") {
                return Err(FetchError::new(url, "status 503"));
            }
            Ok(FetchedPage {
                title: "t".into(),
                text: format!("content of {url}"),
            })
        }
    }

    fn orchestrator(dir: &std::path::Path) -> CrawlOrchestrator {
        let coord = Arc::new(InMemoryCoordinator::new());
        let semaphore = Arc::new(DomainSemaphore::with_limits(
            coord,
            5,
            Duration::from_secs(300),
            Duration::from_millis(20),
        ));
        CrawlOrchestrator::new(semaphore, Arc::new(FakeFetcher), Arc::new(ContentStore::new(dir)))
    }

    #[tokio::test]
    async fn test_results_match_target_order() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let targets = vec![
            CrawlTarget::parse("https://www.billboard.com/").unwrap(),
            CrawlTarget::parse("https://pitchfork.com/").unwrap(),
        ];
        let results = orch.run(&targets, &CancelToken::new()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.billboard.com/");
        assert_eq!(results[1].url, "https://pitchfork.com/");
        assert!(results.iter().all(|r| r.error.is_none()));
        assert!(dir.path().join("billboard.com.json").exists());
        assert!(dir.path().join("pitchfork.com.json").exists());
    }

    #[tokio::test]
    async fn test_failed_target_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let targets = vec![
            CrawlTarget::parse("https://broken.example/").unwrap(),
            CrawlTarget::parse("https://pitchfork.com/").unwrap(),
        ];
        let results = orch.run(&targets, &CancelToken::new()).await;
        assert!(results[0].error.as_deref().unwrap().contains("503"));
        assert!(results[0].output_location.is_none());
        assert!(results[1].error.is_none());
        assert!(dir.path().join("pitchfork.com.json").exists());
    }

    #[tokio::test]
    async fn test_slot_released_after_failed_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let coord = Arc::new(InMemoryCoordinator::new());
        let semaphore = Arc::new(DomainSemaphore::with_limits(
            coord.clone(),
            1,
            Duration::from_secs(300),
            Duration::from_millis(20),
        ));
        let orch = CrawlOrchestrator::new(
            semaphore,
            Arc::new(FakeFetcher),
            Arc::new(ContentStore::new(dir.path())),
        );

        let targets = vec![CrawlTarget::parse("https://broken.example/").unwrap()];
        orch.run(&targets, &CancelToken::new()).await;
        assert_eq!(coord.live_key_count(), 0);
    }
}
