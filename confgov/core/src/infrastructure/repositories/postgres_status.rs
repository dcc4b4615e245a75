// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Status Repository
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE configuration_status (
//!     id               BIGSERIAL PRIMARY KEY,
//!     configuration_id BIGINT      NOT NULL,
//!     host_name        TEXT        NOT NULL,
//!     used             INTEGER     NOT NULL DEFAULT 0,
//!     synced           SMALLINT    NOT NULL DEFAULT 0,
//!     synced_at        TIMESTAMPTZ,
//!     version          TEXT        NOT NULL DEFAULT '',
//!     change_log       TEXT        NOT NULL DEFAULT '',
//!     take_effect      SMALLINT    NOT NULL DEFAULT 0
//! );
//!
//! CREATE TABLE configuration_history (
//!     id               BIGSERIAL PRIMARY KEY,
//!     configuration_id BIGINT NOT NULL,
//!     version          TEXT   NOT NULL,
//!     change_log       TEXT   NOT NULL DEFAULT ''
//! );
//! ```

use crate::domain::repository::{RepositoryError, StatusRepository};
use crate::domain::status::{StatusRow, SyncUpdate, UsedStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgQueryResult, PgRow};
use sqlx::Row;

pub struct PostgresStatusRepository {
    pool: PgPool,
}

impl PostgresStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Updates only match unconfirmed rows. Zero affected rows is fine when
    /// the row exists and already holds the confirmed value.
    async fn expect_row(&self, result: PgQueryResult, row_id: u64) -> Result<(), RepositoryError> {
        if result.rows_affected() > 0 {
            return Ok(());
        }
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM configuration_status WHERE id = $1")
            .bind(row_id as i64)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!("configuration status {}", row_id))),
        }
    }
}

fn parse_status_row(row: PgRow) -> Result<StatusRow, RepositoryError> {
    let used: i32 = row.try_get("used")?;
    let used = u32::try_from(used)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))
        .and_then(|code| UsedStatus::try_from(code).map_err(RepositoryError::Serialization))?;
    let id: i64 = row.try_get("id")?;
    let synced: i16 = row.try_get("synced")?;
    let take_effect: i16 = row.try_get("take_effect")?;
    let synced_at: Option<DateTime<Utc>> = row.try_get("synced_at")?;

    Ok(StatusRow {
        id: id as u64,
        host_name: row.try_get("host_name")?,
        used,
        synced: synced == 1,
        synced_at,
        version: row.try_get("version")?,
        change_log: row.try_get("change_log")?,
        take_effect: take_effect == 1,
    })
}

#[async_trait]
impl StatusRepository for PostgresStatusRepository {
    async fn list_by_configuration(&self, configuration_id: u64) -> Result<Vec<StatusRow>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, host_name, used, synced, synced_at, version, change_log, take_effect
            FROM configuration_status
            WHERE configuration_id = $1
            ORDER BY id
            "#,
        )
        .bind(configuration_id as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_status_row).collect()
    }

    async fn update_used(&self, row_id: u64, used: UsedStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE configuration_status SET used = $1 WHERE id = $2 AND used = 0")
            .bind(used.code() as i32)
            .bind(row_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to update used status: {}", e)))?;
        self.expect_row(result, row_id).await
    }

    async fn update_synced(&self, row_id: u64, update: &SyncUpdate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE configuration_status
            SET synced = $1, version = $2, change_log = $3, synced_at = $4
            WHERE id = $5 AND synced = 0
            "#,
        )
        .bind(i16::from(update.synced))
        .bind(&update.version)
        .bind(&update.change_log)
        .bind(update.synced_at)
        .bind(row_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to update synced status: {}", e)))?;
        self.expect_row(result, row_id).await
    }

    async fn update_take_effect(&self, row_id: u64) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE configuration_status SET take_effect = 1 WHERE id = $1 AND take_effect = 0")
            .bind(row_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to update take effect status: {}", e)))?;
        self.expect_row(result, row_id).await
    }

    async fn find_change_log(&self, configuration_id: u64, version: &str) -> Result<Option<String>, RepositoryError> {
        let change_log: Option<String> = sqlx::query_scalar(
            r#"
            SELECT change_log
            FROM configuration_history
            WHERE configuration_id = $1 AND version = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(configuration_id as i64)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(change_log)
    }
}
