// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Used Status Probe
//!
//! Asks every host agent whether one of the candidate file paths is held by
//! a supervised process. Paths are tried in declaration order and the first
//! positive reply wins. A failed or malformed reply counts as "no signal":
//! it never fails the batch and never clears a known status.

use crate::domain::configuration::FilePathSet;
use crate::domain::node::{AgentEndpoint, ZoneTarget};
use crate::domain::probe::{AgentClient, ProbeError};
use crate::domain::status::UsedStatus;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct UsedStatusProbe {
    client: Arc<dyn AgentClient>,
    timeout: Duration,
    concurrency: usize,
}

impl UsedStatusProbe {
    pub fn new(client: Arc<dyn AgentClient>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            client,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Returns the positive statuses only; hosts without a signal are absent.
    pub async fn probe(
        &self,
        zone: &ZoneTarget,
        agents: &[AgentEndpoint],
        paths: &FilePathSet,
    ) -> HashMap<String, UsedStatus> {
        if paths.is_empty() {
            return HashMap::new();
        }

        futures::stream::iter(agents)
            .map(|agent| async move { (agent.host_name.clone(), self.probe_agent(zone, agent, paths).await) })
            .buffer_unordered(self.concurrency)
            .filter(|(_, status)| futures::future::ready(status.is_used()))
            .collect()
            .await
    }

    async fn probe_agent(&self, zone: &ZoneTarget, agent: &AgentEndpoint, paths: &FilePathSet) -> UsedStatus {
        for path in paths.iter() {
            let reply = tokio::time::timeout(self.timeout, self.client.query_used_status(zone, agent, path))
                .await
                .unwrap_or(Err(ProbeError::Timeout(self.timeout)));

            match reply {
                Ok(reply) => {
                    let status = reply.status();
                    if status.is_used() {
                        return status;
                    }
                }
                Err(e) => {
                    metrics::counter!("confgov_probe_failures_total", "probe" => "used").increment(1);
                    debug!(host = %agent.host_name, address = %agent.address, path, error = %e, "Used status query failed");
                }
            }
        }
        UsedStatus::Unused
    }
}
