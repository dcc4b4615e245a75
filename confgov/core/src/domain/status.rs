// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Per-host Rollout Status
//!
//! One `StatusRow` exists per (configuration, host) pair. Each of its three
//! dimensions is a one-way state machine:
//!
//! | Dimension | UNKNOWN | CONFIRMED | Gate |
//! |-----------|---------|-----------|------|
//! | used | `UsedStatus::Unused` | `Supervisor` / `Systemd` | first positive agent reply |
//! | synced | `false` | `true` | store record version == target |
//! | take_effect | `false` | `true` | governance version == target |
//!
//! No transition ever leaves CONFIRMED. The `apply_*` methods enforce that,
//! so folding probe results in any order converges to the same row.

use crate::domain::configuration::Configuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which process manager holds the configuration file, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum UsedStatus {
    #[default]
    Unused,
    Supervisor,
    Systemd,
}

impl UsedStatus {
    pub fn code(self) -> u32 {
        match self {
            UsedStatus::Unused => 0,
            UsedStatus::Supervisor => 1,
            UsedStatus::Systemd => 2,
        }
    }

    pub fn is_used(self) -> bool {
        self != UsedStatus::Unused
    }
}

impl From<UsedStatus> for u32 {
    fn from(status: UsedStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u32> for UsedStatus {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UsedStatus::Unused),
            1 => Ok(UsedStatus::Supervisor),
            2 => Ok(UsedStatus::Systemd),
            other => Err(format!("unknown used status code: {}", other)),
        }
    }
}

/// Status dimension, used to label writes, issues and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Used,
    Synced,
    TakeEffect,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Used => "used",
            Dimension::Synced => "synced",
            Dimension::TakeEffect => "take_effect",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host's acknowledgement read from the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncObservation {
    pub version: String,
    /// Unix seconds at which the host wrote the acknowledgement
    pub timestamp: i64,
}

/// Row-level unit of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    /// Persistence identifier
    pub id: u64,
    pub host_name: String,
    #[serde(default)]
    pub used: UsedStatus,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    /// Last version the host reported through the coordination store
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub change_log: String,
    #[serde(default)]
    pub take_effect: bool,
}

impl StatusRow {
    pub fn new(id: u64, host_name: impl Into<String>) -> Self {
        Self {
            id,
            host_name: host_name.into(),
            used: UsedStatus::Unused,
            synced: false,
            synced_at: None,
            version: String::new(),
            change_log: String::new(),
            take_effect: false,
        }
    }

    /// Record a used-status reply. Absence of a signal never clears a
    /// previously observed one.
    pub fn apply_used(&mut self, status: UsedStatus) -> bool {
        if self.used.is_used() || !status.is_used() {
            return false;
        }
        self.used = status;
        true
    }

    /// Record a coordination-store acknowledgement. The observation fields are
    /// refreshed on every unsynced row; `synced` flips only on an exact
    /// version match. A synced row is frozen.
    pub fn apply_sync(
        &mut self,
        observation: &SyncObservation,
        target: &Configuration,
        change_log: &str,
    ) -> bool {
        if self.synced {
            return false;
        }
        let before = self.clone();
        self.version = observation.version.clone();
        self.change_log = change_log.to_string();
        self.synced_at = DateTime::from_timestamp(observation.timestamp, 0);
        if target.is_target_version(&observation.version) {
            self.synced = true;
        }
        *self != before
    }

    /// Record the version reported by the governance endpoint.
    pub fn apply_take_effect(&mut self, reported_version: &str, target: &Configuration) -> bool {
        if self.take_effect || !target.is_target_version(reported_version) {
            return false;
        }
        self.take_effect = true;
        true
    }

    /// Persistence writes needed to bring the stored row from `before` to
    /// `self`, at most one per dimension.
    pub fn changes_since(&self, before: &StatusRow) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        if self.used != before.used {
            changes.push(StatusChange::Used(self.used));
        }
        if self.synced != before.synced
            || self.version != before.version
            || self.change_log != before.change_log
            || self.synced_at != before.synced_at
        {
            changes.push(StatusChange::Synced(SyncUpdate {
                synced: self.synced,
                version: self.version.clone(),
                change_log: self.change_log.clone(),
                synced_at: self.synced_at,
            }));
        }
        if self.take_effect != before.take_effect {
            changes.push(StatusChange::TakeEffect);
        }
        changes
    }
}

/// Sync columns written together in one update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUpdate {
    pub synced: bool,
    pub version: String,
    pub change_log: String,
    pub synced_at: Option<DateTime<Utc>>,
}

/// One pending write against the status store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "value", rename_all = "snake_case")]
pub enum StatusChange {
    Used(UsedStatus),
    Synced(SyncUpdate),
    TakeEffect,
}

impl StatusChange {
    pub fn dimension(&self) -> Dimension {
        match self {
            StatusChange::Used(_) => Dimension::Used,
            StatusChange::Synced(_) => Dimension::Synced,
            StatusChange::TakeEffect => Dimension::TakeEffect,
        }
    }

    /// True when the write moves its dimension to CONFIRMED
    pub fn confirms(&self) -> bool {
        match self {
            StatusChange::Used(status) => status.is_used(),
            StatusChange::Synced(update) => update.synced,
            StatusChange::TakeEffect => true,
        }
    }
}

/// A write issued by a reconciliation pass, scoped by row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusWrite {
    pub row_id: u64,
    pub host_name: String,
    pub change: StatusChange,
}
