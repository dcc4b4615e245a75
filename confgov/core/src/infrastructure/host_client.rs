// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host HTTP Client
//!
//! reqwest adapter for the two per-host HTTP surfaces:
//!
//! - the host agent's used-status route (`POST {agent}{used_status_path}?config=<path>`)
//! - the governance route of the supervised process (`GET {ip}:{governance_port}{config_path}`)
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Implements:** `AgentClient`, `GovernanceClient`

use crate::domain::node::{AgentEndpoint, ZoneTarget};
use crate::domain::probe::{AgentClient, GovernanceClient, GovernanceReply, ProbeError, UsedStatusReply};
use crate::domain::reconciler_config::{AgentConfig, GovernanceConfig};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

pub struct HttpHostClient {
    client: Client,
    used_status_path: String,
    governance_path: String,
}

impl HttpHostClient {
    pub fn new(used_status_path: impl Into<String>, governance_path: impl Into<String>) -> Self {
        Self::with_client(Client::new(), used_status_path, governance_path)
    }

    pub fn with_client(
        client: Client,
        used_status_path: impl Into<String>,
        governance_path: impl Into<String>,
    ) -> Self {
        Self {
            client,
            used_status_path: used_status_path.into(),
            governance_path: governance_path.into(),
        }
    }

    /// Client whose transport timeout matches the slower of the two budgets
    pub fn from_config(agent: &AgentConfig, governance: &GovernanceConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(agent.timeout.max(governance.timeout))
            .build()?;
        Ok(Self::with_client(client, agent.used_status_path.clone(), governance.config_path.clone()))
    }

    fn url(address: &str, path: &str) -> String {
        format!("http://{}/{}", address.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Reject non-2xx replies, then decode the body as JSON.
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ProbeError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProbeError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl AgentClient for HttpHostClient {
    async fn query_used_status(
        &self,
        zone: &ZoneTarget,
        agent: &AgentEndpoint,
        file_path: &str,
    ) -> Result<UsedStatusReply, ProbeError> {
        let url = Self::url(&agent.address, &self.used_status_path);
        debug!(zone = %zone, url = %url, path = file_path, "Querying agent used status");

        let response = self
            .client
            .post(&url)
            .query(&[("config", file_path)])
            .send()
            .await?;

        decode_json(response).await
    }
}

#[async_trait]
impl GovernanceClient for HttpHostClient {
    async fn query_active_version(&self, zone: &ZoneTarget, address: &str) -> Result<GovernanceReply, ProbeError> {
        let url = Self::url(address, &self.governance_path);
        debug!(zone = %zone, url = %url, "Querying governance endpoint");

        let response = self.client.get(&url).send().await?;
        decode_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::UsedStatus;
    use mockito::Matcher;

    fn zone() -> ZoneTarget {
        ZoneTarget::new("prod", "z1")
    }

    #[tokio::test]
    async fn test_used_status_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/agent/config/status")
            .match_query(Matcher::UrlEncoded("config".into(), "/etc/app/a.toml".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":0,"data":{"supervisor":true,"systemd":false},"msg":"ok"}"#)
            .create_async()
            .await;

        let client = HttpHostClient::new("/api/v1/agent/config/status", "/api/v1/govern/config");
        let agent = AgentEndpoint {
            host_name: "h1".to_string(),
            address: server.host_with_port(),
        };
        let reply = client.query_used_status(&zone(), &agent, "/etc/app/a.toml").await.unwrap();

        assert_eq!(reply.status(), UsedStatus::Supervisor);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_used_status_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/agent/config/status")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>agent restarting</html>")
            .create_async()
            .await;

        let client = HttpHostClient::new("/api/v1/agent/config/status", "/api/v1/govern/config");
        let agent = AgentEndpoint {
            host_name: "h1".to_string(),
            address: server.host_with_port(),
        };
        let err = client.query_used_status(&zone(), &agent, "/etc/app/a.toml").await.unwrap_err();
        assert!(matches!(err, ProbeError::Decode(_)));
    }

    #[tokio::test]
    async fn test_governance_query() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/govern/config")
            .with_status(200)
            .with_body(r#"{"juno_configuration_version":"v3","juno_agent_md5":"9e107d9d"}"#)
            .create_async()
            .await;

        let client = HttpHostClient::new("/api/v1/agent/config/status", "api/v1/govern/config");
        let reply = client.query_active_version(&zone(), &server.host_with_port()).await.unwrap();
        assert_eq!(reply.juno_configuration_version, "v3");
        assert_eq!(reply.juno_agent_md5, "9e107d9d");
    }

    #[tokio::test]
    async fn test_governance_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/govern/config")
            .with_status(200)
            .with_body(r#"{"juno_configuration_version": 3"#)
            .create_async()
            .await;

        let client = HttpHostClient::new("/api/v1/agent/config/status", "/api/v1/govern/config");
        let err = client.query_active_version(&zone(), &server.host_with_port()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Decode(_)));
        assert!(!err.is_unreachable());
    }

    #[tokio::test]
    async fn test_governance_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/govern/config")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let client = HttpHostClient::new("/api/v1/agent/config/status", "/api/v1/govern/config");
        let err = client.query_active_version(&zone(), &server.host_with_port()).await.unwrap_err();
        assert_eq!(
            err,
            ProbeError::HttpStatus {
                status: 503,
                body: "unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let client = HttpHostClient::new("/api/v1/agent/config/status", "/api/v1/govern/config");
        // port 9 (discard) is closed on test hosts
        let err = client.query_active_version(&zone(), "127.0.0.1:9").await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
