// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Take Effect Probe
//!
//! Queries the governance endpoint of every host that has not yet confirmed
//! adoption. Every reply is reported as-is; comparing against the target
//! version is left to the `Reconciler`. A failing host is recorded and the
//! fan-out carries on with the rest.

use crate::domain::node::{Node, ZoneTarget};
use crate::domain::probe::{GovernanceClient, GovernanceReply, ProbeError};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub host_name: String,
    pub error: ProbeError,
}

#[derive(Debug, Clone, Default)]
pub struct TakeEffectReport {
    /// host -> governance reply
    pub versions: HashMap<String, GovernanceReply>,
    /// Every failed host, sorted by host name
    pub failures: Vec<HostFailure>,
}

pub struct TakeEffectProbe {
    client: Arc<dyn GovernanceClient>,
    timeout: Duration,
    concurrency: usize,
}

impl TakeEffectProbe {
    pub fn new(client: Arc<dyn GovernanceClient>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            client,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn probe(&self, zone: &ZoneTarget, nodes: &[Node]) -> TakeEffectReport {
        let replies: Vec<(String, Result<GovernanceReply, ProbeError>)> = futures::stream::iter(nodes)
            .map(|node| async move {
                let address = node.governance_address();
                let reply = tokio::time::timeout(self.timeout, self.client.query_active_version(zone, &address))
                    .await
                    .unwrap_or(Err(ProbeError::Timeout(self.timeout)));
                (node.host_name.clone(), reply)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = TakeEffectReport::default();
        for (host_name, reply) in replies {
            match reply {
                Ok(reply) => {
                    debug!(
                        host = %host_name,
                        version = %reply.juno_configuration_version,
                        agent_md5 = %reply.juno_agent_md5,
                        "Governance endpoint replied"
                    );
                    report.versions.insert(host_name, reply);
                }
                Err(error) => {
                    metrics::counter!("confgov_probe_failures_total", "probe" => "take_effect").increment(1);
                    warn!(host = %host_name, zone = %zone, error = %error, "Governance query failed");
                    report.failures.push(HostFailure { host_name, error });
                }
            }
        }
        report.failures.sort_by(|a, b| a.host_name.cmp(&b.host_name));
        report
    }
}
