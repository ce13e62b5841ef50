//! Coordination-service abstraction.
//!
//! The [`LeaseCoordinator`] trait captures the five primitives the crawl
//! semaphore needs from an external linearizable key-value store with TTL
//! leases: lease creation, lease-scoped writes, prefix listing, key
//! deletion, and lease revocation. Any etcd-style provider can back it; the
//! app crate ships an etcd v3 implementation and [`memory`] provides an
//! in-process one for tests.
//!
//! Implementations must not cache: every prefix listing is a fresh read
//! against the service, so slot counts are never computed from stale local
//! state shared across processes.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoordinationError;

/// A time-bounded ownership token issued by the coordination service.
///
/// Keys written under a lease are deleted automatically when the lease
/// expires or is revoked. Stored as an opaque string so backends with
/// numeric or textual lease identifiers both fit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(String);

impl LeaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// External linearizable KV store with TTL leases.
#[async_trait]
pub trait LeaseCoordinator: Send + Sync {
    /// Create a lease that expires `ttl` after creation unless revoked.
    async fn create_lease(&self, ttl: Duration) -> Result<LeaseId, CoordinationError>;

    /// Write an empty key scoped to `lease`.
    async fn put_under_lease(&self, key: &str, lease: &LeaseId) -> Result<(), CoordinationError>;

    /// List all live key names under `prefix`, in the service's ordering.
    async fn list_keys_with_prefix(&self, prefix: &str)
        -> Result<Vec<String>, CoordinationError>;

    /// Delete a single key.
    async fn delete_key(&self, key: &str) -> Result<(), CoordinationError>;

    /// Revoke a lease, deleting every key written under it.
    async fn revoke_lease(&self, lease: &LeaseId) -> Result<(), CoordinationError>;
}
