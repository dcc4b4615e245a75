// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Status Repository Implementations
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist `StatusRow` updates issued by the `Reconciler`
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! - **PostgresStatusRepository** - production status store
//! - **InMemoryStatusRepository** - dry runs and tests; keeps a log of every
//!   accepted write and can be told to reject writes for chosen rows

pub mod postgres_status;

pub use postgres_status::PostgresStatusRepository;

use crate::domain::repository::{RepositoryError, StatusRepository};
use crate::domain::status::{StatusChange, StatusRow, SyncUpdate, UsedStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct InMemoryState {
    /// row id -> (configuration id, row)
    rows: HashMap<u64, (u64, StatusRow)>,
    /// (configuration id, version) -> change log
    change_logs: HashMap<(u64, String), String>,
    write_log: Vec<(u64, StatusChange)>,
    failing_rows: HashSet<u64>,
}

#[derive(Clone, Default)]
pub struct InMemoryStatusRepository {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&self, configuration_id: u64, row: StatusRow) {
        self.state.write().rows.insert(row.id, (configuration_id, row));
    }

    pub fn insert_change_log(&self, configuration_id: u64, version: impl Into<String>, change_log: impl Into<String>) {
        self.state
            .write()
            .change_logs
            .insert((configuration_id, version.into()), change_log.into());
    }

    /// Reject every subsequent write to `row_id`
    pub fn fail_writes_for(&self, row_id: u64) {
        self.state.write().failing_rows.insert(row_id);
    }

    pub fn row(&self, row_id: u64) -> Option<StatusRow> {
        self.state.read().rows.get(&row_id).map(|(_, row)| row.clone())
    }

    /// Every accepted write, in order
    pub fn write_log(&self) -> Vec<(u64, StatusChange)> {
        self.state.read().write_log.clone()
    }

    fn apply(&self, row_id: u64, change: StatusChange) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        if state.failing_rows.contains(&row_id) {
            return Err(RepositoryError::Database(format!("write rejected for row {}", row_id)));
        }
        let (_, row) = state
            .rows
            .get_mut(&row_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("configuration status {}", row_id)))?;

        // confirmed dimensions are never rewritten, whatever snapshot the
        // caller started from
        let confirmed = match &change {
            StatusChange::Used(_) => row.used.is_used(),
            StatusChange::Synced(_) => row.synced,
            StatusChange::TakeEffect => row.take_effect,
        };
        if confirmed {
            return Ok(());
        }

        match &change {
            StatusChange::Used(status) => row.used = *status,
            StatusChange::Synced(update) => {
                row.synced = update.synced;
                row.version = update.version.clone();
                row.change_log = update.change_log.clone();
                row.synced_at = update.synced_at;
            }
            StatusChange::TakeEffect => row.take_effect = true,
        }
        state.write_log.push((row_id, change));
        Ok(())
    }
}

#[async_trait]
impl StatusRepository for InMemoryStatusRepository {
    async fn list_by_configuration(&self, configuration_id: u64) -> Result<Vec<StatusRow>, RepositoryError> {
        let state = self.state.read();
        let mut rows: Vec<StatusRow> = state
            .rows
            .values()
            .filter(|(config, _)| *config == configuration_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn update_used(&self, row_id: u64, used: UsedStatus) -> Result<(), RepositoryError> {
        self.apply(row_id, StatusChange::Used(used))
    }

    async fn update_synced(&self, row_id: u64, update: &SyncUpdate) -> Result<(), RepositoryError> {
        self.apply(row_id, StatusChange::Synced(update.clone()))
    }

    async fn update_take_effect(&self, row_id: u64) -> Result<(), RepositoryError> {
        self.apply(row_id, StatusChange::TakeEffect)
    }

    async fn find_change_log(&self, configuration_id: u64, version: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .state
            .read()
            .change_logs
            .get(&(configuration_id, version.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_updates_apply_and_log() {
        let repo = InMemoryStatusRepository::new();
        repo.insert_row(7, StatusRow::new(1, "h1"));
        repo.insert_row(7, StatusRow::new(2, "h2"));
        repo.insert_row(8, StatusRow::new(3, "h1"));

        repo.update_used(1, UsedStatus::Systemd).await.unwrap();
        repo.update_take_effect(2).await.unwrap();

        assert_eq!(repo.row(1).unwrap().used, UsedStatus::Systemd);
        assert!(repo.row(2).unwrap().take_effect);
        assert_eq!(repo.write_log().len(), 2);
        assert_eq!(repo.list_by_configuration(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_failing_rows() {
        let repo = InMemoryStatusRepository::new();
        repo.insert_row(7, StatusRow::new(1, "h1"));
        repo.fail_writes_for(1);

        assert!(matches!(repo.update_take_effect(1).await, Err(RepositoryError::Database(_))));
        assert!(matches!(repo.update_take_effect(99).await, Err(RepositoryError::NotFound(_))));
        assert!(repo.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_dimensions_are_not_rewritten() {
        let repo = InMemoryStatusRepository::new();
        repo.insert_row(7, StatusRow::new(1, "h1"));

        let synced = SyncUpdate {
            synced: true,
            version: "v3".to_string(),
            change_log: "bump".to_string(),
            synced_at: chrono::DateTime::from_timestamp(1000, 0),
        };
        let stale = SyncUpdate {
            synced: false,
            version: "v2".to_string(),
            change_log: String::new(),
            synced_at: chrono::DateTime::from_timestamp(900, 0),
        };
        repo.update_synced(1, &synced).await.unwrap();
        repo.update_synced(1, &stale).await.unwrap();
        repo.update_used(1, UsedStatus::Supervisor).await.unwrap();
        repo.update_used(1, UsedStatus::Systemd).await.unwrap();

        let row = repo.row(1).unwrap();
        assert!(row.synced);
        assert_eq!(row.version, "v3");
        assert_eq!(row.change_log, "bump");
        assert_eq!(row.used, UsedStatus::Supervisor);
        assert_eq!(repo.write_log().len(), 2);
    }

    #[tokio::test]
    async fn test_change_log_lookup() {
        let repo = InMemoryStatusRepository::new();
        repo.insert_change_log(7, "v3", "raise pool size");
        assert_eq!(repo.find_change_log(7, "v3").await.unwrap().as_deref(), Some("raise pool size"));
        assert_eq!(repo.find_change_log(7, "v4").await.unwrap(), None);
    }
}
