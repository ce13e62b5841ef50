//! Per-domain bounded-concurrency gate over the coordination service.
//!
//! Each domain gets its own key prefix (`/crawler/semaphores/{domain}/`);
//! a slot is one lease-scoped key under that prefix. The slot count is
//! enforced by the coordination service's key space, never by local state,
//! because competing acquirers may live in different processes or hosts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::coordination::LeaseCoordinator;
use crate::error::AcquireError;
use crate::models::SemaphoreSlot;

pub const DEFAULT_THREAD_LIMIT: usize = 5;
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_BACKOFF: Duration = Duration::from_secs(2);

const KEY_PREFIX: &str = "/crawler/semaphores";

/// Bounded-concurrency semaphore keyed by domain.
pub struct DomainSemaphore {
    coordinator: Arc<dyn LeaseCoordinator>,
    thread_limit: usize,
    lease_ttl: Duration,
    poll_backoff: Duration,
}

impl DomainSemaphore {
    pub fn new(coordinator: Arc<dyn LeaseCoordinator>) -> Self {
        Self {
            coordinator,
            thread_limit: DEFAULT_THREAD_LIMIT,
            lease_ttl: DEFAULT_LEASE_TTL,
            poll_backoff: DEFAULT_POLL_BACKOFF,
        }
    }

    pub fn with_limits(
        coordinator: Arc<dyn LeaseCoordinator>,
        thread_limit: usize,
        lease_ttl: Duration,
        poll_backoff: Duration,
    ) -> Self {
        Self {
            coordinator,
            thread_limit: thread_limit.max(1),
            lease_ttl,
            poll_backoff,
        }
    }

    fn prefix(domain: &str) -> String {
        format!("{KEY_PREFIX}/{domain}/")
    }

    /// Attempt to take one slot for `domain` without waiting.
    ///
    /// Lists the live keys under the domain prefix (a fresh read against
    /// the coordination service) and, when the count is below the limit,
    /// writes a uniquely named key under a new lease. The count check and
    /// the key write are two separate calls, not one transaction: under
    /// heavy cross-process contention the limit can be transiently
    /// exceeded by a small margin. That is an accepted property of the
    /// protocol, traded for simplicity over strict exactness.
    pub async fn try_acquire(
        &self,
        domain: &str,
    ) -> Result<Option<SemaphoreSlot>, AcquireError> {
        let prefix = Self::prefix(domain);
        let keys = self.coordinator.list_keys_with_prefix(&prefix).await?;
        if keys.len() >= self.thread_limit {
            return Ok(None);
        }

        let lease = self.coordinator.create_lease(self.lease_ttl).await?;
        // Random 64-bit suffix keeps concurrent acquirers from colliding
        // on a key name.
        let suffix: u64 = rand::random();
        let slot_key = format!("{prefix}thread-{suffix:016x}");
        self.coordinator.put_under_lease(&slot_key, &lease).await?;

        debug!(domain, key = %slot_key, "acquired semaphore slot");
        Ok(Some(SemaphoreSlot {
            domain: domain.to_string(),
            slot_key,
            lease_id: lease,
            expires_at: Utc::now() + chrono::Duration::from_std(self.lease_ttl).unwrap_or_default(),
        }))
    }

    /// Take a slot for `domain`, waiting as long as it takes.
    ///
    /// Retries [`try_acquire`](Self::try_acquire) on a fixed backoff with
    /// no retry cap, so callers that cannot wait forever must pass a token
    /// they will cancel (or use [`acquire_timeout`](Self::acquire_timeout)).
    pub async fn acquire(
        &self,
        domain: &str,
        cancel: &CancelToken,
    ) -> Result<SemaphoreSlot, AcquireError> {
        loop {
            if cancel.is_cancelled() {
                return Err(AcquireError::Cancelled(domain.to_string()));
            }
            if let Some(slot) = self.try_acquire(domain).await? {
                return Ok(slot);
            }
            debug!(domain, "thread limit reached, waiting");
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AcquireError::Cancelled(domain.to_string()));
                }
                _ = tokio::time::sleep(self.poll_backoff) => {}
            }
        }
    }

    /// [`acquire`](Self::acquire) with a caller-imposed bound.
    pub async fn acquire_timeout(
        &self,
        domain: &str,
        bound: Duration,
        cancel: &CancelToken,
    ) -> Result<SemaphoreSlot, AcquireError> {
        match tokio::time::timeout(bound, self.acquire(domain, cancel)).await {
            Ok(result) => result,
            Err(_) => Err(AcquireError::Timeout(domain.to_string())),
        }
    }

    /// Release a slot: delete its key, then revoke its lease.
    ///
    /// Both calls are best-effort. A failed delete or revoke is logged and
    /// not retried; the lease TTL deletes the key eventually, which is
    /// the same backstop that covers a crashed owner.
    pub async fn release(&self, slot: SemaphoreSlot) {
        if let Err(err) = self.coordinator.delete_key(&slot.slot_key).await {
            warn!(
                domain = %slot.domain,
                key = %slot.slot_key,
                %err,
                "failed to delete slot key; lease expiry will reclaim it"
            );
        }
        if let Err(err) = self.coordinator.revoke_lease(&slot.lease_id).await {
            warn!(
                domain = %slot.domain,
                lease = %slot.lease_id,
                %err,
                "failed to revoke slot lease; it will expire on its own"
            );
        }
    }
}
