// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Managed host records as delivered by the node registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment/zone pair every outbound call is routed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneTarget {
    pub env: String,
    pub zone: String,
}

impl ZoneTarget {
    pub fn new(env: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            zone: zone.into(),
        }
    }
}

impl fmt::Display for ZoneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.env, self.zone)
    }
}

/// Snapshot of one managed host. Not owned by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub host_name: String,
    pub ip: String,
    pub agent_port: u16,
    pub governance_port: u16,
}

impl Node {
    pub fn new(host_name: impl Into<String>, ip: impl Into<String>, agent_port: u16, governance_port: u16) -> Self {
        Self {
            host_name: host_name.into(),
            ip: ip.into(),
            agent_port,
            governance_port,
        }
    }

    /// `ip:port` of the host agent's local HTTP API
    pub fn agent_address(&self) -> String {
        format!("{}:{}", self.ip, self.agent_port)
    }

    /// `ip:port` of the governance endpoint of the supervised process
    pub fn governance_address(&self) -> String {
        format!("{}:{}", self.ip, self.governance_port)
    }
}

/// An addressable host agent resolved from a `Node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEndpoint {
    pub host_name: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses() {
        let node = Node::new("h1", "10.0.0.1", 50010, 9990);
        assert_eq!(node.agent_address(), "10.0.0.1:50010");
        assert_eq!(node.governance_address(), "10.0.0.1:9990");
    }

    #[test]
    fn test_zone_display() {
        assert_eq!(ZoneTarget::new("prod", "bj-1").to_string(), "prod/bj-1");
    }
}
