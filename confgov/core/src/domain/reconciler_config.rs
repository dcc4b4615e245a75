// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Reconciler Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - fleet ceiling and probe fan-out width
// - host agent and governance endpoint paths and timeouts
// - coordination store prefixes, scan budget and per-zone gateways
// - status store connection
// - logging and metrics settings

use crate::domain::fleet::MAX_FLEET_SIZE;
use crate::domain::node::ZoneTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "confgov/v1";
pub const KIND: &str = "ReconcilerConfig";

/// Top-level reconciler configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfigManifest {
    /// API version (must be "confgov/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ReconcilerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ReconcilerConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfigSpec {
    #[serde(default)]
    pub fleet: FleetConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub governance: GovernanceConfig,

    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// Maximum in-flight calls per probe
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Ceiling on hosts per pass, at most 400
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent route answering used-status queries
    #[serde(default = "default_used_status_path")]
    pub used_status_path: String,

    #[serde(with = "humantime_serde", default = "default_agent_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Governance route reporting the active configuration version
    #[serde(default = "default_governance_path")]
    pub config_path: String,

    #[serde(with = "humantime_serde", default = "default_governance_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Key-space prefixes tried in order
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Budget for a single prefix scan
    #[serde(with = "humantime_serde", default = "default_scan_timeout")]
    pub scan_timeout: Duration,

    /// etcd v3 JSON gateway per env/zone
    #[serde(default)]
    pub endpoints: Vec<StoreEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEndpoint {
    pub env: String,
    pub zone: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string (supports CONFGOV_DATABASE_URL override)
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus exporter port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_probe_concurrency() -> usize {
    32
}

fn default_max_agents() -> usize {
    MAX_FLEET_SIZE
}

fn default_used_status_path() -> String {
    "/api/v1/agent/config/status".to_string()
}

fn default_agent_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_governance_path() -> String {
    "/api/v1/govern/config".to_string()
}

fn default_governance_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_prefixes() -> Vec<String> {
    vec!["juno-agent".to_string()]
}

fn default_scan_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            used_status_path: default_used_status_path(),
            timeout: default_agent_timeout(),
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            config_path: default_governance_path(),
            timeout: default_governance_timeout(),
        }
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            scan_timeout: default_scan_timeout(),
            endpoints: vec![],
        }
    }
}

impl Default for ReconcilerConfigSpec {
    fn default() -> Self {
        Self {
            fleet: FleetConfig::default(),
            agent: AgentConfig::default(),
            governance: GovernanceConfig::default(),
            coordination: CoordinationConfig::default(),
            probe_concurrency: default_probe_concurrency(),
            database: None,
            observability: None,
        }
    }
}

impl Default for ReconcilerConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "confgov".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ReconcilerConfigSpec::default(),
        }
    }
}

impl CoordinationConfig {
    /// Gateway URL serving `zone`, if one is configured
    pub fn endpoint_for(&self, zone: &ZoneTarget) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|e| e.env == zone.env && e.zone == zone.zone)
            .map(|e| e.url.as_str())
    }
}

impl ReconcilerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONFGOV_CONFIG_PATH environment variable
    /// 2. ./confgov-config.yaml (working directory)
    /// 3. ~/.confgov/config.yaml (user home)
    /// 4. /etc/confgov/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONFGOV_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./confgov-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".confgov").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/confgov/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CONFGOV_DATABASE_URL") {
            tracing::info!("Environment override: CONFGOV_DATABASE_URL");
            match self.spec.database.as_mut() {
                Some(db) => db.url = url,
                None => {
                    self.spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        if let Ok(val) = std::env::var("CONFGOV_PROBE_CONCURRENCY") {
            match val.parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: CONFGOV_PROBE_CONCURRENCY={}", n);
                    self.spec.probe_concurrency = n;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for CONFGOV_PROBE_CONCURRENCY: '{}'. Expected a number. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.fleet.max_agents == 0 || self.spec.fleet.max_agents > MAX_FLEET_SIZE {
            anyhow::bail!(
                "spec.fleet.max_agents must be between 1 and {}, got {}",
                MAX_FLEET_SIZE,
                self.spec.fleet.max_agents
            );
        }

        if self.spec.probe_concurrency == 0 {
            anyhow::bail!("spec.probe_concurrency must be at least 1");
        }

        if self.spec.agent.used_status_path.is_empty() {
            anyhow::bail!("spec.agent.used_status_path cannot be empty");
        }

        if self.spec.governance.config_path.is_empty() {
            anyhow::bail!("spec.governance.config_path cannot be empty");
        }

        if self.spec.coordination.prefixes.is_empty() {
            anyhow::bail!("spec.coordination.prefixes must name at least one prefix");
        }

        if self.spec.coordination.prefixes.iter().any(|p| p.trim_matches('/').is_empty()) {
            anyhow::bail!("spec.coordination.prefixes cannot contain empty prefixes");
        }

        for endpoint in &self.spec.coordination.endpoints {
            if endpoint.url.is_empty() {
                anyhow::bail!(
                    "Coordination endpoint url cannot be empty for {}/{}",
                    endpoint.env,
                    endpoint.zone
                );
            }
        }

        if let Some(db) = &self.spec.database {
            if db.url.is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = ReconcilerConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.spec.fleet.max_agents, 400);
        assert_eq!(manifest.spec.coordination.scan_timeout, Duration::from_secs(1));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
apiVersion: confgov/v1
kind: ReconcilerConfig
metadata:
  name: bj-rollout
spec:
  agent:
    timeout: 2s
  coordination:
    prefixes: ["juno-agent", "tenant-b"]
    scan_timeout: 800ms
    endpoints:
      - env: prod
        zone: bj-1
        url: http://etcd-gw.bj-1:2379
"#;
        let manifest = ReconcilerConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.agent.timeout, Duration::from_secs(2));
        assert_eq!(manifest.spec.agent.used_status_path, "/api/v1/agent/config/status");
        assert_eq!(manifest.spec.coordination.scan_timeout, Duration::from_millis(800));
        assert_eq!(manifest.spec.coordination.prefixes.len(), 2);
        assert_eq!(
            manifest.spec.coordination.endpoint_for(&ZoneTarget::new("prod", "bj-1")),
            Some("http://etcd-gw.bj-1:2379")
        );
        assert!(manifest.spec.coordination.endpoint_for(&ZoneTarget::new("prod", "sh-1")).is_none());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut manifest = ReconcilerConfigManifest::default();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.fleet.max_agents = 401;
        assert!(manifest.validate().is_err());
        manifest.spec.fleet.max_agents = 400;

        manifest.spec.probe_concurrency = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.probe_concurrency = 8;

        manifest.spec.coordination.prefixes = vec!["/".to_string()];
        assert!(manifest.validate().is_err());
        manifest.spec.coordination.prefixes = vec![];
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confgov-config.yaml");
        let mut manifest = ReconcilerConfigManifest::default();
        manifest.spec.database = Some(DatabaseConfig {
            url: "postgres://localhost/juno".to_string(),
            max_connections: 3,
        });

        manifest.to_yaml_file(&path).unwrap();
        let loaded = ReconcilerConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.database.unwrap().max_connections, 3);
        assert_eq!(loaded.spec.governance.timeout, Duration::from_secs(3));
    }
}
