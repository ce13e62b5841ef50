//! etcd v3 coordination client.
//!
//! Talks to the etcd JSON gateway (`/v3/...`) with plain HTTP so no gRPC
//! stack is needed. Keys travel base64-encoded on the wire, as the gateway
//! requires. Every call is a fresh round trip; nothing is cached locally.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use freshrag_core::coordination::{LeaseCoordinator, LeaseId};
use freshrag_core::error::CoordinationError;

/// [`LeaseCoordinator`] backed by an etcd v3 JSON gateway.
#[derive(Debug)]
pub struct EtcdCoordinator {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LeaseGrantResponse {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Deserialize, Default)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<RangeKv>,
}

#[derive(Deserialize)]
struct RangeKv {
    key: String,
}

impl EtcdCoordinator {
    /// Build a client and probe the endpoint once.
    ///
    /// A failed probe is [`CoordinationError::Unavailable`]: without the
    /// coordination service there is no concurrency guarantee, so callers
    /// treat this as fatal at startup.
    pub async fn connect(base_url: &str, timeout: Duration) -> Result<Self, CoordinationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        let coordinator = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        };

        let response = coordinator
            .client
            .post(format!("{}/v3/maintenance/status", coordinator.base_url))
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| {
                CoordinationError::Unavailable(format!("{}: {}", coordinator.base_url, e))
            })?;
        if !response.status().is_success() {
            return Err(CoordinationError::Unavailable(format!(
                "{}: status {}",
                coordinator.base_url,
                response.status()
            )));
        }

        Ok(coordinator)
    }

    async fn call(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, CoordinationError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoordinationError::Transient(format!("{path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CoordinationError::Transient(format!(
                "{path}: status {status}: {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CoordinationError::Transient(format!("{path}: invalid response: {e}")))
    }
}

/// End of the range that covers exactly the keys starting with `prefix`,
/// per etcd's range semantics: the prefix with its last byte incremented.
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // All 0xff: "\0" means "end of keyspace" to etcd.
    vec![0]
}

#[async_trait]
impl LeaseCoordinator for EtcdCoordinator {
    async fn create_lease(&self, ttl: Duration) -> Result<LeaseId, CoordinationError> {
        let body = json!({ "TTL": ttl.as_secs() });
        let value = self.call("/v3/lease/grant", body).await?;
        let grant: LeaseGrantResponse = serde_json::from_value(value).map_err(|e| {
            CoordinationError::Transient(format!("lease grant: invalid response: {e}"))
        })?;
        Ok(LeaseId::new(grant.id))
    }

    async fn put_under_lease(&self, key: &str, lease: &LeaseId) -> Result<(), CoordinationError> {
        let body = json!({
            "key": BASE64.encode(key),
            "value": BASE64.encode(""),
            "lease": lease.as_str(),
        });
        self.call("/v3/kv/put", body).await?;
        Ok(())
    }

    async fn list_keys_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, CoordinationError> {
        let body = json!({
            "key": BASE64.encode(prefix),
            "range_end": BASE64.encode(prefix_range_end(prefix.as_bytes())),
            "keys_only": true,
        });
        let value = self.call("/v3/kv/range", body).await?;
        let range: RangeResponse = serde_json::from_value(value)
            .map_err(|e| CoordinationError::Transient(format!("range: invalid response: {e}")))?;

        let mut keys = Vec::with_capacity(range.kvs.len());
        for kv in range.kvs {
            let raw = BASE64
                .decode(&kv.key)
                .map_err(|e| CoordinationError::Transient(format!("range: bad key: {e}")))?;
            let key = String::from_utf8(raw)
                .map_err(|e| CoordinationError::Transient(format!("range: bad key: {e}")))?;
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete_key(&self, key: &str) -> Result<(), CoordinationError> {
        let body = json!({ "key": BASE64.encode(key) });
        self.call("/v3/kv/deleterange", body).await?;
        Ok(())
    }

    async fn revoke_lease(&self, lease: &LeaseId) -> Result<(), CoordinationError> {
        let body = json!({ "ID": lease.as_str() });
        self.call("/v3/lease/revoke", body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_prefix_range_end_increments_last_byte() {
        assert_eq!(prefix_range_end(b"/crawler/"), b"/crawler0".to_vec());
        assert_eq!(prefix_range_end(b"a"), b"b".to_vec());
    }

    #[test]
    fn test_prefix_range_end_carries_past_ff() {
        assert_eq!(prefix_range_end(&[b'a', 0xff]), vec![b'b']);
        assert_eq!(prefix_range_end(&[0xff, 0xff]), vec![0]);
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        // Reserved TEST-NET-1 address: nothing listens there.
        let err = EtcdCoordinator::connect("http://192.0.2.1:1", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_lease_grant_and_put() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/maintenance/status");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;
        let grant = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/lease/grant")
                    .json_body(serde_json::json!({ "TTL": 300 }));
                then.status(200)
                    .json_body(serde_json::json!({ "ID": "7587878053905404" }));
            })
            .await;
        let put = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/kv/put")
                    .json_body_partial(format!(
                        r#"{{ "lease": "7587878053905404", "key": "{}" }}"#,
                        BASE64.encode("/crawler/semaphores/example.com/thread-1")
                    ));
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let coordinator = EtcdCoordinator::connect(&server.base_url(), Duration::from_secs(5))
            .await
            .unwrap();
        let lease = coordinator
            .create_lease(Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(lease.as_str(), "7587878053905404");
        coordinator
            .put_under_lease("/crawler/semaphores/example.com/thread-1", &lease)
            .await
            .unwrap();

        grant.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_decodes_keys_and_handles_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/maintenance/status");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/range");
                then.status(200).json_body(serde_json::json!({
                    "kvs": [
                        { "key": BASE64.encode("/crawler/semaphores/example.com/thread-a") },
                        { "key": BASE64.encode("/crawler/semaphores/example.com/thread-b") },
                    ],
                    "count": "2",
                }));
            })
            .await;

        let coordinator = EtcdCoordinator::connect(&server.base_url(), Duration::from_secs(5))
            .await
            .unwrap();
        let keys = coordinator
            .list_keys_with_prefix("/crawler/semaphores/example.com/")
            .await
            .unwrap();
        assert_eq!(
            keys,
            vec![
                "/crawler/semaphores/example.com/thread-a",
                "/crawler/semaphores/example.com/thread-b",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_range_yields_no_keys() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/maintenance/status");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;
        // etcd omits "kvs" entirely when the range is empty.
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/range");
                then.status(200)
                    .json_body(serde_json::json!({ "header": {} }));
            })
            .await;

        let coordinator = EtcdCoordinator::connect(&server.base_url(), Duration::from_secs(5))
            .await
            .unwrap();
        let keys = coordinator
            .list_keys_with_prefix("/crawler/semaphores/empty.example/")
            .await
            .unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/maintenance/status");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/lease/grant");
                then.status(500).body("etcdserver: leader changed");
            })
            .await;

        let coordinator = EtcdCoordinator::connect(&server.base_url(), Duration::from_secs(5))
            .await
            .unwrap();
        let err = coordinator
            .create_lease(Duration::from_secs(300))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::Transient(_)));
    }
}
