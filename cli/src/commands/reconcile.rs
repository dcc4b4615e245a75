// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reconcile command
//!
//! Loads a batch document (one configuration, one env/zone, its fleet),
//! wires the HTTP and coordination store clients from the configuration and
//! runs one or more reconciliation passes, printing each pass as JSON.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use confgov_core::application::{ReconcileOutcome, ReconcileRequest, Reconciler};
use confgov_core::domain::reconciler_config::{ReconcilerConfigManifest, ReconcilerConfigSpec};
use confgov_core::domain::repository::StatusRepository;
use confgov_core::domain::status::{StatusRow, StatusWrite};
use confgov_core::infrastructure::db::Database;
use confgov_core::infrastructure::repositories::{InMemoryStatusRepository, PostgresStatusRepository};
use confgov_core::infrastructure::{EtcdGatewayStore, HttpHostClient};

#[derive(Args)]
pub struct ReconcileCommand {
    /// Batch document (YAML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE")]
    pub batch: PathBuf,

    /// Number of passes to run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub passes: u32,

    /// Pause between passes
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub interval: Duration,
}

/// Input of one `confgov reconcile` run.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchDocument {
    #[serde(flatten)]
    pub request: ReconcileRequest,

    /// Seed rows for the in-memory status store; ignored with a database
    #[serde(default)]
    pub rows: Vec<StatusRow>,

    /// version -> change log, for the in-memory status store
    #[serde(default)]
    pub change_logs: HashMap<String, String>,
}

impl BatchDocument {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read batch file {:?}", path))?;

        let document = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).with_context(|| format!("Invalid batch JSON in {:?}", path))?
        } else {
            serde_yaml::from_str(&content).with_context(|| format!("Invalid batch YAML in {:?}", path))?
        };
        Ok(document)
    }

    /// Rows for the in-memory store: the batch rows, or one fresh row per node
    pub fn seed_rows(&self) -> Vec<StatusRow> {
        if !self.rows.is_empty() {
            return self.rows.clone();
        }
        self.request
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| StatusRow::new(i as u64 + 1, node.host_name.clone()))
            .collect()
    }
}

#[derive(Serialize)]
struct PassReport<'a> {
    pass: u32,
    rows: &'a [StatusRow],
    writes: &'a [StatusWrite],
    issues: Vec<String>,
}

pub async fn execute(command: ReconcileCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = ReconcilerConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    let spec = &config.spec;

    let batch = BatchDocument::from_file(&command.batch)?;
    let request = &batch.request;

    install_metrics_exporter(spec)?;

    let repository = build_repository(spec, &batch).await?;
    let host_client =
        Arc::new(HttpHostClient::from_config(&spec.agent, &spec.governance).context("Failed to build HTTP client")?);
    let store = Arc::new(EtcdGatewayStore::new(&spec.coordination));
    let reconciler = Reconciler::from_config(spec, host_client.clone(), store, host_client, repository.clone());

    info!(
        app = %request.app_name,
        zone = %request.zone,
        configuration = %request.configuration.name,
        version = %request.configuration.version,
        passes = command.passes,
        "Starting reconciliation"
    );

    for pass in 1..=command.passes {
        let snapshot = repository
            .list_by_configuration(request.configuration.id)
            .await
            .context("Failed to load status rows")?;

        let outcome = reconciler
            .reconcile(request, &snapshot)
            .await
            .with_context(|| format!("Reconciliation pass {} failed", pass))?;

        print_summary(pass, &outcome);
        let report = PassReport {
            pass,
            rows: &outcome.rows,
            writes: &outcome.writes,
            issues: outcome.issues.iter().map(|i| i.to_string()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);

        if pass < command.passes {
            tokio::time::sleep(command.interval).await;
        }
    }

    Ok(())
}

async fn build_repository(spec: &ReconcilerConfigSpec, batch: &BatchDocument) -> Result<Arc<dyn StatusRepository>> {
    if let Some(db) = &spec.database {
        let database = Database::new(db).await.context("Failed to connect to status database")?;
        info!("Using PostgreSQL status store");
        return Ok(Arc::new(PostgresStatusRepository::new(database.get_pool().clone())));
    }

    let configuration_id = batch.request.configuration.id;
    let repository = InMemoryStatusRepository::new();
    for row in batch.seed_rows() {
        repository.insert_row(configuration_id, row);
    }
    for (version, change_log) in &batch.change_logs {
        repository.insert_change_log(configuration_id, version.clone(), change_log.clone());
    }
    info!("Using in-memory status store");
    Ok(Arc::new(repository))
}

fn install_metrics_exporter(spec: &ReconcilerConfigSpec) -> Result<()> {
    let Some(metrics) = spec.observability.as_ref().and_then(|o| o.metrics.as_ref()) else {
        return Ok(());
    };
    if !metrics.enabled {
        return Ok(());
    }

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics.port))
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(port = metrics.port, "Prometheus exporter listening");
    Ok(())
}

fn print_summary(pass: u32, outcome: &ReconcileOutcome) {
    let confirmed = |f: fn(&StatusRow) -> bool| outcome.rows.iter().filter(|r| f(r)).count();
    eprintln!(
        "{} {} rows, used {}, synced {}, take effect {}, {} writes",
        format!("Pass {}:", pass).bold(),
        outcome.rows.len(),
        confirmed(|r| r.used.is_used()),
        confirmed(|r| r.synced),
        confirmed(|r| r.take_effect),
        outcome.writes.len(),
    );
    for issue in &outcome.issues {
        eprintln!("  {} {}", "⚠".yellow(), issue);
    }
}
