// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Fleet Resolution
//!
//! Turns raw node registry records into the bounded, deduplicated set of
//! hosts a reconciliation pass probes. The ceiling bounds worst-case fan-out
//! per pass; exceeding it fails before any probe or write happens.

use crate::domain::node::{AgentEndpoint, Node};
use std::collections::HashSet;
use tracing::warn;

/// Hard upper bound on hosts per reconciliation pass.
pub const MAX_FLEET_SIZE: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FleetError {
    #[error("fleet of {count} agents exceeds the limit of {limit}")]
    TooLarge { count: usize, limit: usize },
}

/// Deduplicated hosts of one pass, in registry order.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    nodes: Vec<Node>,
}

impl Fleet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn agents(&self) -> Vec<AgentEndpoint> {
        self.nodes
            .iter()
            .map(|n| AgentEndpoint {
                host_name: n.host_name.clone(),
                address: n.agent_address(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FleetResolver {
    limit: usize,
}

impl Default for FleetResolver {
    fn default() -> Self {
        Self { limit: MAX_FLEET_SIZE }
    }
}

impl FleetResolver {
    /// Create a resolver with a custom ceiling. Values above
    /// `MAX_FLEET_SIZE` are capped.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.min(MAX_FLEET_SIZE),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Resolve the addressable fleet. Records without a host name or IP are
    /// skipped; duplicate host names keep the first record.
    pub fn resolve(&self, nodes: &[Node]) -> Result<Fleet, FleetError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(nodes.len().min(self.limit));

        for node in nodes {
            if node.host_name.is_empty() || node.ip.is_empty() {
                warn!(host = %node.host_name, ip = %node.ip, "Skipping node without host name or IP");
                continue;
            }
            if seen.insert(node.host_name.as_str()) {
                resolved.push(node.clone());
            }
        }

        if resolved.len() > self.limit {
            return Err(FleetError::TooLarge {
                count: resolved.len(),
                limit: self.limit,
            });
        }

        Ok(Fleet { nodes: resolved })
    }
}
