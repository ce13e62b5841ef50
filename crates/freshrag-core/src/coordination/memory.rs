//! In-memory [`LeaseCoordinator`] for tests.
//!
//! Single-process stand-in for an external coordination service. Lease
//! expiry is evaluated lazily against the tokio clock on every operation,
//! so tests can drive TTL behaviour with `tokio::time::pause` and
//! `advance` instead of sleeping.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{LeaseCoordinator, LeaseId};
use crate::error::CoordinationError;

#[derive(Default)]
struct State {
    /// lease id -> expiry deadline.
    leases: HashMap<u64, Instant>,
    /// key -> owning lease. BTreeMap gives ordered prefix listings.
    keys: BTreeMap<String, u64>,
}

/// In-memory coordination service with lazily-expired leases.
#[derive(Default)]
pub struct InMemoryCoordinator {
    state: Mutex<State>,
    next_lease: AtomicU64,
}

impl InMemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired leases and every key written under them.
    fn prune(state: &mut State) {
        let now = Instant::now();
        let expired: Vec<u64> = state
            .leases
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            state.leases.remove(&id);
            state.keys.retain(|_, lease| *lease != id);
        }
    }

    fn parse_lease(lease: &LeaseId) -> Result<u64, CoordinationError> {
        lease
            .as_str()
            .parse::<u64>()
            .map_err(|_| CoordinationError::Transient(format!("unknown lease id {lease}")))
    }

    /// Number of live keys, for test assertions.
    pub fn live_key_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        Self::prune(&mut state);
        state.keys.len()
    }
}

#[async_trait]
impl LeaseCoordinator for InMemoryCoordinator {
    async fn create_lease(&self, ttl: Duration) -> Result<LeaseId, CoordinationError> {
        let id = self.next_lease.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.lock().unwrap();
        Self::prune(&mut state);
        state.leases.insert(id, Instant::now() + ttl);
        Ok(LeaseId::new(id.to_string()))
    }

    async fn put_under_lease(&self, key: &str, lease: &LeaseId) -> Result<(), CoordinationError> {
        let id = Self::parse_lease(lease)?;
        let mut state = self.state.lock().unwrap();
        Self::prune(&mut state);
        if !state.leases.contains_key(&id) {
            return Err(CoordinationError::Transient(format!(
                "lease {lease} expired or revoked"
            )));
        }
        state.keys.insert(key.to_string(), id);
        Ok(())
    }

    async fn list_keys_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, CoordinationError> {
        let mut state = self.state.lock().unwrap();
        Self::prune(&mut state);
        Ok(state
            .keys
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete_key(&self, key: &str) -> Result<(), CoordinationError> {
        let mut state = self.state.lock().unwrap();
        Self::prune(&mut state);
        state.keys.remove(key);
        Ok(())
    }

    async fn revoke_lease(&self, lease: &LeaseId) -> Result<(), CoordinationError> {
        let id = Self::parse_lease(lease)?;
        let mut state = self.state.lock().unwrap();
        state.leases.remove(&id);
        state.keys.retain(|_, owner| *owner != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_list_prefix() {
        let coord = InMemoryCoordinator::new();
        let lease = coord.create_lease(Duration::from_secs(60)).await.unwrap();
        coord.put_under_lease("/s/a/thread-1", &lease).await.unwrap();
        coord.put_under_lease("/s/a/thread-2", &lease).await.unwrap();
        coord.put_under_lease("/s/b/thread-3", &lease).await.unwrap();

        let keys = coord.list_keys_with_prefix("/s/a/").await.unwrap();
        assert_eq!(keys, vec!["/s/a/thread-1", "/s/a/thread-2"]);
    }

    #[tokio::test]
    async fn test_revoke_deletes_leased_keys() {
        let coord = InMemoryCoordinator::new();
        let lease = coord.create_lease(Duration::from_secs(60)).await.unwrap();
        coord.put_under_lease("/s/a/thread-1", &lease).await.unwrap();
        coord.revoke_lease(&lease).await.unwrap();
        assert!(coord.list_keys_with_prefix("/s/").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_removes_keys() {
        let coord = InMemoryCoordinator::new();
        let lease = coord.create_lease(Duration::from_secs(300)).await.unwrap();
        coord.put_under_lease("/s/a/thread-1", &lease).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(coord.list_keys_with_prefix("/s/a/").await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(coord.list_keys_with_prefix("/s/a/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_under_unknown_lease_fails() {
        let coord = InMemoryCoordinator::new();
        let bogus = LeaseId::new("9999");
        assert!(coord.put_under_lease("/s/a/k", &bogus).await.is_err());
    }
}
