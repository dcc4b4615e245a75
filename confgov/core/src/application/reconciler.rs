// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Reconciler Application Service
//!
//! Runs one reconciliation pass for one configuration in one env/zone:
//!
//! 1. Resolve the fleet (hard failure above the ceiling, nothing else runs).
//! 2. Fan out the three probes concurrently. Each probe accumulates into its
//!    own map; nothing touches the snapshot while calls are in flight.
//! 3. Fold the maps into a working copy of the snapshot using the monotonic
//!    `StatusRow::apply_*` rules, prefixes in configured order.
//! 4. Diff every row against its pass-start value and issue at most one
//!    repository write per changed dimension.
//!
//! Probe and persistence failures never abort the pass; they come back as
//! `ReconcileIssue`s next to the best-effort snapshot.

use crate::application::sync_status_probe::SyncStatusProbe;
use crate::application::take_effect_probe::TakeEffectProbe;
use crate::application::used_status_probe::UsedStatusProbe;
use crate::domain::configuration::{Configuration, FilePathSet};
use crate::domain::fleet::{FleetError, FleetResolver};
use crate::domain::node::{Node, ZoneTarget};
use crate::domain::probe::{AgentClient, CoordinationStore, GovernanceClient, ProbeError};
use crate::domain::reconciler_config::ReconcilerConfigSpec;
use crate::domain::repository::{RepositoryError, StatusRepository};
use crate::domain::status::{Dimension, StatusChange, StatusRow, StatusWrite};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One configuration/env/zone batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub app_name: String,
    pub zone: ZoneTarget,
    pub configuration: Configuration,
    /// Candidate on-host paths of the configuration file
    #[serde(default)]
    pub file_paths: FilePathSet,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueSource {
    Probe(ProbeError),
    Persistence(RepositoryError),
}

/// A non-fatal failure observed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileIssue {
    pub dimension: Dimension,
    pub host_name: Option<String>,
    pub prefix: Option<String>,
    pub source: IssueSource,
}

impl fmt::Display for ReconcileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.dimension)?;
        if let Some(host) = &self.host_name {
            write!(f, " host={}", host)?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, " prefix={}", prefix)?;
        }
        match &self.source {
            IssueSource::Probe(e) => write!(f, " probe: {}", e),
            IssueSource::Persistence(e) => write!(f, " persistence: {}", e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Snapshot after this pass
    pub rows: Vec<StatusRow>,
    /// Writes the repository accepted
    pub writes: Vec<StatusWrite>,
    pub issues: Vec<ReconcileIssue>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Fleet(#[from] FleetError),
}

pub struct Reconciler {
    resolver: FleetResolver,
    used_probe: UsedStatusProbe,
    sync_probe: SyncStatusProbe,
    take_effect_probe: TakeEffectProbe,
    repository: Arc<dyn StatusRepository>,
    prefixes: Vec<String>,
}

impl Reconciler {
    pub fn new(
        resolver: FleetResolver,
        used_probe: UsedStatusProbe,
        sync_probe: SyncStatusProbe,
        take_effect_probe: TakeEffectProbe,
        repository: Arc<dyn StatusRepository>,
        prefixes: Vec<String>,
    ) -> Self {
        Self {
            resolver,
            used_probe,
            sync_probe,
            take_effect_probe,
            repository,
            prefixes,
        }
    }

    /// Wire the probes from a config spec and injected clients
    pub fn from_config(
        spec: &ReconcilerConfigSpec,
        agent: Arc<dyn AgentClient>,
        store: Arc<dyn CoordinationStore>,
        governance: Arc<dyn GovernanceClient>,
        repository: Arc<dyn StatusRepository>,
    ) -> Self {
        Self::new(
            FleetResolver::new(spec.fleet.max_agents),
            UsedStatusProbe::new(agent, spec.agent.timeout, spec.probe_concurrency),
            SyncStatusProbe::new(store, spec.coordination.scan_timeout),
            TakeEffectProbe::new(governance, spec.governance.timeout, spec.probe_concurrency),
            repository,
            spec.coordination.prefixes.clone(),
        )
    }

    /// Run one pass over `snapshot`. On `Err` nothing was probed or written.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        snapshot: &[StatusRow],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let fleet = self.resolver.resolve(&request.nodes)?;
        metrics::counter!("confgov_reconcile_passes_total").increment(1);

        let mut rows = snapshot.to_vec();
        if fleet.is_empty() {
            debug!(app = %request.app_name, zone = %request.zone, "Empty fleet, nothing to reconcile");
            return Ok(ReconcileOutcome {
                rows,
                ..Default::default()
            });
        }

        // host -> row index, restricted to hosts in the fleet
        let fleet_hosts: HashSet<&str> = fleet.nodes().iter().map(|n| n.host_name.as_str()).collect();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            if !fleet_hosts.contains(row.host_name.as_str()) {
                continue;
            }
            if index.contains_key(&row.host_name) {
                warn!(host = %row.host_name, row_id = row.id, "Duplicate status row for host, ignoring");
                continue;
            }
            index.insert(row.host_name.clone(), i);
        }

        let sync_pending: HashSet<String> = index
            .iter()
            .filter(|(_, &i)| !rows[i].synced)
            .map(|(host, _)| host.clone())
            .collect();
        let effect_pending: Vec<Node> = fleet
            .nodes()
            .iter()
            .filter(|n| index.get(&n.host_name).is_some_and(|&i| !rows[i].take_effect))
            .cloned()
            .collect();
        let agents = fleet.agents();
        let file_name = request.configuration.file_name();

        let sync_scans = futures::future::join_all(self.prefixes.iter().filter(|_| !sync_pending.is_empty()).map(
            |prefix| {
                let file_name = &file_name;
                let sync_pending = &sync_pending;
                async move {
                    let result = self
                        .sync_probe
                        .probe(&request.zone, &request.app_name, file_name, prefix, sync_pending)
                        .await;
                    (prefix.clone(), result)
                }
            },
        ));

        let (used, scans, effect) = tokio::join!(
            self.used_probe.probe(&request.zone, &agents, &request.file_paths),
            sync_scans,
            self.take_effect_probe.probe(&request.zone, &effect_pending),
        );

        let mut issues = Vec::new();

        for (host, status) in used {
            if let Some(&i) = index.get(&host) {
                rows[i].apply_used(status);
            }
        }

        let mut change_logs: HashMap<String, String> = HashMap::new();
        for (prefix, result) in scans {
            let observed = match result {
                Ok(observed) => observed,
                Err(error) => {
                    metrics::counter!("confgov_probe_failures_total", "probe" => "synced").increment(1);
                    issues.push(ReconcileIssue {
                        dimension: Dimension::Synced,
                        host_name: None,
                        prefix: Some(prefix),
                        source: IssueSource::Probe(error),
                    });
                    continue;
                }
            };

            for (host, observation) in observed {
                let Some(&i) = index.get(&host) else { continue };
                if rows[i].synced {
                    continue;
                }
                let change_log = self
                    .change_log_for(&request.configuration, &observation.version, &host, &mut change_logs, &mut issues)
                    .await;
                rows[i].apply_sync(&observation, &request.configuration, &change_log);
            }
        }

        for (host, reply) in &effect.versions {
            if let Some(&i) = index.get(host) {
                rows[i].apply_take_effect(&reply.juno_configuration_version, &request.configuration);
            }
        }
        for failure in effect.failures {
            issues.push(ReconcileIssue {
                dimension: Dimension::TakeEffect,
                host_name: Some(failure.host_name),
                prefix: None,
                source: IssueSource::Probe(failure.error),
            });
        }

        let writes = self.persist(&rows, snapshot, &mut issues).await;

        info!(
            app = %request.app_name,
            zone = %request.zone,
            configuration = %request.configuration.name,
            version = %request.configuration.version,
            hosts = fleet.len(),
            limit = self.resolver.limit(),
            writes = writes.len(),
            issues = issues.len(),
            "Reconciliation pass finished"
        );

        Ok(ReconcileOutcome { rows, writes, issues })
    }

    async fn change_log_for(
        &self,
        configuration: &Configuration,
        version: &str,
        host: &str,
        cache: &mut HashMap<String, String>,
        issues: &mut Vec<ReconcileIssue>,
    ) -> String {
        if let Some(text) = cache.get(version) {
            return text.clone();
        }
        let text = match self.repository.find_change_log(configuration.id, version).await {
            Ok(text) => text.unwrap_or_default(),
            Err(error) => {
                warn!(configuration_id = configuration.id, version, error = %error, "Change log lookup failed");
                issues.push(ReconcileIssue {
                    dimension: Dimension::Synced,
                    host_name: Some(host.to_string()),
                    prefix: None,
                    source: IssueSource::Persistence(error),
                });
                String::new()
            }
        };
        cache.insert(version.to_string(), text.clone());
        text
    }

    /// One write per changed dimension per row. `rows` and `before` are
    /// index-aligned.
    async fn persist(
        &self,
        rows: &[StatusRow],
        before: &[StatusRow],
        issues: &mut Vec<ReconcileIssue>,
    ) -> Vec<StatusWrite> {
        let mut writes = Vec::new();
        for (row, prior) in rows.iter().zip(before) {
            for change in row.changes_since(prior) {
                let dimension = change.dimension();
                let result = match &change {
                    StatusChange::Used(status) => self.repository.update_used(row.id, *status).await,
                    StatusChange::Synced(update) => self.repository.update_synced(row.id, update).await,
                    StatusChange::TakeEffect => self.repository.update_take_effect(row.id).await,
                };

                match result {
                    Ok(()) => {
                        if change.confirms() {
                            metrics::counter!("confgov_status_confirmed_total", "dimension" => dimension.as_str())
                                .increment(1);
                        }
                        debug!(host = %row.host_name, row_id = row.id, dimension = %dimension, "Status updated");
                        writes.push(StatusWrite {
                            row_id: row.id,
                            host_name: row.host_name.clone(),
                            change,
                        });
                    }
                    Err(e) => {
                        metrics::counter!("confgov_persist_failures_total", "dimension" => dimension.as_str())
                            .increment(1);
                        error!(host = %row.host_name, row_id = row.id, dimension = %dimension, error = %e, "Failed to persist status update");
                        issues.push(ReconcileIssue {
                            dimension,
                            host_name: Some(row.host_name.clone()),
                            prefix: None,
                            source: IssueSource::Persistence(e),
                        });
                    }
                }
            }
        }
        writes
    }
}
