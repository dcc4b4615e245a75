// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sync Status Probe
//!
//! Scans `/{prefix}/callback/{app}/{file}` in the coordination store for the
//! acknowledgements hosts publish once they received the file. Only hosts
//! still waiting for sync are kept. A single malformed value is skipped; an
//! empty scan is reported as `ProbeError::NoCallbackEntries` so it can be
//! told apart from a store that could not be reached.

use crate::domain::node::ZoneTarget;
use crate::domain::probe::{callback_key, CallbackRecord, CoordinationStore, ProbeError};
use crate::domain::status::SyncObservation;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct SyncStatusProbe {
    store: Arc<dyn CoordinationStore>,
    scan_timeout: Duration,
}

impl SyncStatusProbe {
    pub fn new(store: Arc<dyn CoordinationStore>, scan_timeout: Duration) -> Self {
        Self { store, scan_timeout }
    }

    /// Scan one key-space prefix.
    ///
    /// When a host published more than one record under the prefix, the one
    /// with the newest timestamp is kept.
    pub async fn probe(
        &self,
        zone: &ZoneTarget,
        app_name: &str,
        file_name: &str,
        prefix: &str,
        pending: &HashSet<String>,
    ) -> Result<HashMap<String, SyncObservation>, ProbeError> {
        let key = callback_key(prefix, app_name, file_name);

        let entries = tokio::time::timeout(self.scan_timeout, self.store.scan_prefix(zone, &key))
            .await
            .unwrap_or(Err(ProbeError::Timeout(self.scan_timeout)))
            .inspect_err(|e| {
                warn!(app = app_name, zone = %zone, key = %key, error = %e, "Coordination store scan failed");
            })?;

        if entries.is_empty() {
            warn!(app = app_name, zone = %zone, key = %key, "No callback entries published");
            return Err(ProbeError::NoCallbackEntries { key });
        }

        let mut observed: HashMap<String, SyncObservation> = HashMap::new();
        for entry in entries {
            let record: CallbackRecord = match serde_json::from_slice(&entry.value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(key = %entry.key, error = %e, "Skipping malformed callback entry");
                    continue;
                }
            };

            if !pending.contains(&record.hostname) {
                continue;
            }

            let newer = observed
                .get(&record.hostname)
                .map_or(true, |seen| record.timestamp > seen.timestamp);
            if newer {
                observed.insert(
                    record.hostname,
                    SyncObservation {
                        version: record.version,
                        timestamp: record.timestamp,
                    },
                );
            }
        }

        debug!(app = app_name, key = %key, hosts = observed.len(), "Callback scan finished");
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::probe::StoreEntry;
    use async_trait::async_trait;

    enum Scan {
        Entries(Vec<StoreEntry>),
        Fail(ProbeError),
        Hang,
    }

    struct FakeStore {
        scan: Scan,
    }

    #[async_trait]
    impl CoordinationStore for FakeStore {
        async fn scan_prefix(&self, _zone: &ZoneTarget, key_prefix: &str) -> Result<Vec<StoreEntry>, ProbeError> {
            assert_eq!(key_prefix, "/juno-agent/callback/svc/app.toml");
            match &self.scan {
                Scan::Entries(entries) => Ok(entries.clone()),
                Scan::Fail(e) => Err(e.clone()),
                Scan::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(vec![])
                }
            }
        }
    }

    fn entry(host: &str, value: &str) -> StoreEntry {
        StoreEntry {
            key: format!("/juno-agent/callback/svc/app.toml/{}", host),
            value: value.as_bytes().to_vec(),
        }
    }

    fn pending(hosts: &[&str]) -> HashSet<String> {
        hosts.iter().map(|h| h.to_string()).collect()
    }

    async fn run(scan: Scan, hosts: &[&str]) -> Result<HashMap<String, SyncObservation>, ProbeError> {
        let probe = SyncStatusProbe::new(Arc::new(FakeStore { scan }), Duration::from_millis(50));
        probe
            .probe(&ZoneTarget::new("prod", "z1"), "svc", "app.toml", "juno-agent", &pending(hosts))
            .await
    }

    #[tokio::test]
    async fn test_filters_to_pending_hosts() {
        let scan = Scan::Entries(vec![
            entry("h1", r#"{"hostname":"h1","version":"v3","timestamp":1000}"#),
            entry("h9", r#"{"hostname":"h9","version":"v3","timestamp":1000}"#),
        ]);
        let result = run(scan, &["h1", "h2"]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["h1"].version, "v3");
        assert_eq!(result["h1"].timestamp, 1000);
    }

    #[tokio::test]
    async fn test_malformed_entry_skipped() {
        let scan = Scan::Entries(vec![
            entry("h1", "not json"),
            entry("h2", r#"{"hostname":"h2","version":"v3","timestamp":5}"#),
        ]);
        let result = run(scan, &["h1", "h2"]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("h2"));
    }

    #[tokio::test]
    async fn test_newest_record_per_host() {
        let scan = Scan::Entries(vec![
            entry("h1", r#"{"hostname":"h1","version":"v3","timestamp":20}"#),
            entry("h1", r#"{"hostname":"h1","version":"v2","timestamp":10}"#),
        ]);
        let result = run(scan, &["h1"]).await.unwrap();
        assert_eq!(result["h1"].version, "v3");
    }

    #[tokio::test]
    async fn test_empty_scan_is_distinct_error() {
        let err = run(Scan::Entries(vec![]), &["h1"]).await.unwrap_err();
        assert_eq!(
            err,
            ProbeError::NoCallbackEntries { key: "/juno-agent/callback/svc/app.toml".to_string() }
        );
        assert!(!err.is_unreachable());
    }

    #[tokio::test]
    async fn test_store_failure_and_timeout() {
        let err = run(Scan::Fail(ProbeError::Transport("refused".to_string())), &["h1"]).await.unwrap_err();
        assert!(err.is_unreachable());

        let err = run(Scan::Hang, &["h1"]).await.unwrap_err();
        assert_eq!(err, ProbeError::Timeout(Duration::from_millis(50)));
    }
}
