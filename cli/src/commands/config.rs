// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use confgov_core::domain::reconciler_config::ReconcilerConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./confgov-config.yaml)
        #[arg(short, long, default_value = "./confgov-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config =
        ReconcilerConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CONFGOV_CONFIG_PATH: {}",
            std::env::var("CONFGOV_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./confgov-config.yaml");
        println!("  4. ~/.confgov/config.yaml");
        println!("  5. /etc/confgov/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Probes:".bold());
    println!("  Fleet ceiling: {}", spec.fleet.max_agents);
    println!("  Concurrency: {}", spec.probe_concurrency);
    println!(
        "  Agent: {} (timeout {})",
        spec.agent.used_status_path,
        humantime::format_duration(spec.agent.timeout)
    );
    println!(
        "  Governance: {} (timeout {})",
        spec.governance.config_path,
        humantime::format_duration(spec.governance.timeout)
    );
    println!();

    println!("{}", "Coordination store:".bold());
    println!("  Prefixes: {}", spec.coordination.prefixes.join(", "));
    println!("  Scan timeout: {}", humantime::format_duration(spec.coordination.scan_timeout));
    if spec.coordination.endpoints.is_empty() {
        println!("  Endpoints: {}", "(none)".dimmed());
    }
    for endpoint in &spec.coordination.endpoints {
        println!("  {}/{} → {}", endpoint.env, endpoint.zone, endpoint.url);
    }
    println!();

    println!("{}", "Status store:".bold());
    match &spec.database {
        Some(db) => println!("  PostgreSQL (max {} connections)", db.max_connections),
        None => println!("  In-memory"),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ReconcilerConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    if with_examples {
        std::fs::write(&output, include_str!("../../templates/config-with-examples.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        ReconcilerConfigManifest::default()
            .to_yaml_file(&output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_template_is_valid() {
        let config = ReconcilerConfigManifest::from_yaml_str(include_str!("../../templates/config-with-examples.yaml"))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.spec.coordination.prefixes.len(), 2);
        assert!(config.spec.database.is_some());
    }

    #[tokio::test]
    async fn test_generate_minimal_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confgov-config.yaml");
        generate(path.clone(), false).await.unwrap();

        let config = ReconcilerConfigManifest::from_yaml_file(&path).unwrap();
        config.validate().unwrap();
    }
}
