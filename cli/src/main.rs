// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # confgov
//!
//! Drives configuration rollout reconciliation from the command line.
//!
//! ## Commands
//!
//! - `confgov reconcile --batch <FILE>` - Run reconciliation passes for one batch
//! - `confgov config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use confgov_cli::commands::{self, ConfigCommand, ReconcileCommand};
use confgov_core::domain::reconciler_config::{LoggingConfig, ReconcilerConfigManifest};

/// Configuration rollout status reconciler
#[derive(Parser)]
#[command(name = "confgov")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONFGOV_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CONFGOV_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation passes for one configuration batch
    #[command(name = "reconcile")]
    Reconcile(ReconcileCommand),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();

    // A broken config file is reported by the command itself
    let logging = ReconcilerConfigManifest::load_or_default(cli.config.clone())
        .ok()
        .and_then(|c| c.spec.observability)
        .and_then(|o| o.logging);
    init_logging(cli.log_level.as_deref(), logging.as_ref())?;

    match cli.command {
        Some(Commands::Reconcile(command)) => commands::reconcile::execute(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Load `.env` (or `CONFGOV_ENV_FILE`) before argument parsing so clap sees
/// the variables. A missing file is fine.
fn load_env_file() {
    let env_file = std::env::var("CONFGOV_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    if let Err(e) = dotenvy::from_filename(&env_file) {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: failed to load {}: {}", env_file, e);
        }
    }
}

/// Initialize tracing subscriber for logging.
///
/// Level precedence: `RUST_LOG`, `--log-level`, config file, `info`.
fn init_logging(cli_level: Option<&str>, config: Option<&LoggingConfig>) -> Result<()> {
    let level = cli_level
        .or(config.map(|c| c.level.as_str()))
        .unwrap_or("info");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.is_some_and(|c| c.format == "json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
