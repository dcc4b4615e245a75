// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Probe Ports (Anti-Corruption Layer)
//!
//! Domain interfaces for the three external status sources. Each adapter in
//! `crate::infrastructure` translates its wire protocol into these types so
//! the probes and the `Reconciler` never see HTTP or store specifics.
//!
//! | Port | Source | Wire format |
//! |------|--------|-------------|
//! | `AgentClient` | host agent HTTP API | `{code, data: {supervisor, systemd}, msg}` |
//! | `CoordinationStore` | shared KV store, prefix scan | `{hostname, version, timestamp}` |
//! | `GovernanceClient` | per-host governance endpoint | `{juno_configuration_version, juno_agent_md5}` |

use crate::domain::node::{AgentEndpoint, ZoneTarget};
use crate::domain::status::UsedStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host agent: is a file held by a supervised process?
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn query_used_status(
        &self,
        zone: &ZoneTarget,
        agent: &AgentEndpoint,
        file_path: &str,
    ) -> Result<UsedStatusReply, ProbeError>;
}

/// Coordination store: prefix scan over acknowledgement keys.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn scan_prefix(&self, zone: &ZoneTarget, key_prefix: &str) -> Result<Vec<StoreEntry>, ProbeError>;
}

/// Governance endpoint: which configuration version is active?
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    async fn query_active_version(&self, zone: &ZoneTarget, address: &str) -> Result<GovernanceReply, ProbeError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedStatusData {
    #[serde(default)]
    pub supervisor: bool,
    #[serde(default)]
    pub systemd: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedStatusReply {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub data: UsedStatusData,
    #[serde(default)]
    pub msg: String,
}

impl UsedStatusReply {
    /// supervisor wins over systemd
    pub fn status(&self) -> UsedStatus {
        if self.data.supervisor {
            UsedStatus::Supervisor
        } else if self.data.systemd {
            UsedStatus::Systemd
        } else {
            UsedStatus::Unused
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceReply {
    #[serde(default)]
    pub juno_configuration_version: String,
    #[serde(default)]
    pub juno_agent_md5: String,
}

/// Raw key/value pair returned by a store scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Value published by a host under the callback key once it received a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRecord {
    pub hostname: String,
    pub version: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Callback key prefix for one configuration file under one store prefix:
/// `/{prefix}/callback/{app}/{file}`.
pub fn callback_key(prefix: &str, app_name: &str, file_name: &str) -> String {
    format!("/{}/callback/{}/{}", prefix.trim_matches('/'), app_name, file_name)
}

/// Errors raised by a single probe call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("No callback entries under {key}")]
    NoCallbackEntries { key: String },

    #[error("No route for zone {0}")]
    Unroutable(String),
}

impl ProbeError {
    /// True when the source could not be reached at all, as opposed to
    /// answering with nothing useful.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ProbeError::Transport(_) | ProbeError::Timeout(_) | ProbeError::Unroutable(_)
        )
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProbeError::Decode(err.to_string())
        } else {
            ProbeError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Decode(err.to_string())
    }
}
