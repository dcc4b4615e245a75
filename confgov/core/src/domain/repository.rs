// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Status Repository Interface
//!
//! Persistence contract for `StatusRow`s. The reconciler only ever updates
//! existing rows by identifier, one dimension per call; rows are created
//! and deleted elsewhere.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryStatusRepository` | process memory, tests and dry runs |
//! | `PostgresStatusRepository` | `configuration_status` / `configuration_history` tables |

use crate::domain::status::{StatusRow, SyncUpdate, UsedStatus};
use async_trait::async_trait;

#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Current rows for one configuration
    async fn list_by_configuration(&self, configuration_id: u64) -> Result<Vec<StatusRow>, RepositoryError>;

    async fn update_used(&self, row_id: u64, used: UsedStatus) -> Result<(), RepositoryError>;

    /// Write the sync flag together with its observation columns
    async fn update_synced(&self, row_id: u64, update: &SyncUpdate) -> Result<(), RepositoryError>;

    /// Mark the row as taken effect
    async fn update_take_effect(&self, row_id: u64) -> Result<(), RepositoryError>;

    /// Change-log text recorded when `version` of the configuration was committed
    async fn find_change_log(&self, configuration_id: u64, version: &str) -> Result<Option<String>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
