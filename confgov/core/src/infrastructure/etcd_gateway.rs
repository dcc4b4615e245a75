// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! etcd v3 JSON Gateway Store
//!
//! `CoordinationStore` backed by the etcd grpc-gateway (`POST /v3/kv/range`).
//! Keys and values travel base64-encoded; a prefix scan is a range request
//! whose `range_end` is the prefix with its last byte incremented.
//! Each env/zone is served by its own gateway URL.

use crate::domain::node::ZoneTarget;
use crate::domain::probe::{CoordinationStore, ProbeError, StoreEntry};
use crate::domain::reconciler_config::CoordinationConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct RangeRequest {
    key: String,
    range_end: String,
}

#[derive(Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

/// Smallest key greater than every key starting with `prefix`.
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // every byte was 0xff: scan to the end of the key space
    vec![0]
}

pub struct EtcdGatewayStore {
    client: Client,
    coordination: CoordinationConfig,
}

impl EtcdGatewayStore {
    pub fn new(coordination: &CoordinationConfig) -> Self {
        Self::with_client(Client::new(), coordination)
    }

    pub fn with_client(client: Client, coordination: &CoordinationConfig) -> Self {
        Self {
            client,
            coordination: coordination.clone(),
        }
    }
}

#[async_trait]
impl CoordinationStore for EtcdGatewayStore {
    async fn scan_prefix(&self, zone: &ZoneTarget, key_prefix: &str) -> Result<Vec<StoreEntry>, ProbeError> {
        let base = self
            .coordination
            .endpoint_for(zone)
            .ok_or_else(|| ProbeError::Unroutable(zone.to_string()))?;
        let url = format!("{}/v3/kv/range", base.trim_end_matches('/'));

        let request = RangeRequest {
            key: STANDARD.encode(key_prefix),
            range_end: STANDARD.encode(prefix_range_end(key_prefix.as_bytes())),
        };
        debug!(zone = %zone, url = %url, key = key_prefix, "Scanning coordination store");

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProbeError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let range: RangeResponse = serde_json::from_str(&body)?;
        Ok(range.kvs.into_iter().filter_map(decode_entry).collect())
    }
}

/// Decode one gateway pair. An undecodable pair is skipped on its own.
fn decode_entry(kv: KeyValue) -> Option<StoreEntry> {
    let key = match STANDARD.decode(&kv.key) {
        Ok(key) => String::from_utf8_lossy(&key).into_owned(),
        Err(e) => {
            debug!(raw_key = %kv.key, error = %e, "Skipping store entry with undecodable key");
            return None;
        }
    };
    match STANDARD.decode(&kv.value) {
        Ok(value) => Some(StoreEntry { key, value }),
        Err(e) => {
            debug!(key = %key, error = %e, "Skipping store entry with undecodable value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reconciler_config::StoreEndpoint;
    use mockito::Matcher;

    #[test]
    fn test_prefix_range_end() {
        assert_eq!(prefix_range_end(b"/a/b"), b"/a/c".to_vec());
        assert_eq!(prefix_range_end(&[b'a', 0xff]), b"b".to_vec());
        assert_eq!(prefix_range_end(&[0xff, 0xff]), vec![0]);
    }

    fn store(url: String) -> EtcdGatewayStore {
        EtcdGatewayStore::new(&CoordinationConfig {
            endpoints: vec![StoreEndpoint {
                env: "prod".to_string(),
                zone: "z1".to_string(),
                url,
            }],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_scan_decodes_entries() {
        let key = "/juno-agent/callback/svc/app.toml";
        let value = r#"{"hostname":"h1","version":"v3","timestamp":1000}"#;
        let body = serde_json::json!({
            "header": {"revision": "42"},
            "kvs": [{
                "key": STANDARD.encode(format!("{}/h1", key)),
                "value": STANDARD.encode(value),
                "mod_revision": "41"
            }],
            "count": "1"
        });

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/kv/range")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "key": STANDARD.encode(key),
                "range_end": STANDARD.encode("/juno-agent/callback/svc/app.tomm"),
            })))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let entries = store(server.url())
            .scan_prefix(&ZoneTarget::new("prod", "z1"), key)
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "/juno-agent/callback/svc/app.toml/h1");
        assert_eq!(entries[0].value, value.as_bytes());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_skipped() {
        let value = r#"{"hostname":"h1","version":"v3","timestamp":1000}"#;
        let body = serde_json::json!({
            "kvs": [
                {"key": STANDARD.encode("/p/callback/svc/app.toml/h1"), "value": STANDARD.encode(value)},
                {"key": STANDARD.encode("/p/callback/svc/app.toml/h2"), "value": "!!not-base64!!"},
                {"key": "%%%", "value": STANDARD.encode(value)}
            ]
        });

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v3/kv/range")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let entries = store(server.url())
            .scan_prefix(&ZoneTarget::new("prod", "z1"), "/p/callback/svc/app.toml")
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "/p/callback/svc/app.toml/h1");
        assert_eq!(entries[0].value, value.as_bytes());
    }

    #[tokio::test]
    async fn test_scan_without_kvs_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v3/kv/range")
            .with_status(200)
            .with_body(r#"{"header":{"revision":"42"}}"#)
            .create_async()
            .await;

        let entries = store(server.url())
            .scan_prefix(&ZoneTarget::new("prod", "z1"), "/p/callback/svc/app.toml")
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_zone_is_unroutable() {
        let err = store("http://127.0.0.1:9".to_string())
            .scan_prefix(&ZoneTarget::new("prod", "z9"), "/p")
            .await
            .unwrap_err();
        assert_eq!(err, ProbeError::Unroutable("prod/z9".to_string()));
    }
}
