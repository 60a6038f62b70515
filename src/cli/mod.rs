//! # Command Line Interface
//!
//! `cloudkeys resolve | inject | refresh` against settings loaded from an
//! optional file and `CLOUDKEYS_*` environment variables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{JsonConfigStore, Settings};
use crate::engine::{InjectionSummary, SecretEngine};
use crate::observability::{init_logging, log_settings_info};
use crate::secrets::{redact_secret, Resolution};

#[derive(Parser)]
#[command(name = "cloudkeys")]
#[command(about = "Resolve secrets from files or Vault and inject them into configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve every configured source and list the keys found
    Resolve,

    /// Inject mapped secrets into a configuration document and print it
    Inject {
        /// JSON document to start from
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Evict cached secrets, inject again and print the configuration
    Refresh {
        /// JSON document to start from
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(if cli.verbose { "debug" } else { "info" }, cli.json_logs)?;

    let settings =
        Settings::load(cli.config.as_deref()).context("Failed to load cloudkeys settings")?;
    log_settings_info(&settings);

    match cli.command {
        Commands::Resolve => {
            let engine = SecretEngine::builder(settings).build()?;
            print_resolution(&engine.resolve().await);
        }
        Commands::Inject { seed } => {
            let (engine, config) = engine_with_seed(settings, seed.as_deref())?;
            let summary = engine.inject().await;
            print_injection(&summary, &config)?;
        }
        Commands::Refresh { seed } => {
            let (engine, config) = engine_with_seed(settings, seed.as_deref())?;
            let summary = engine.refresh().await;
            print_injection(&summary, &config)?;
        }
    }

    Ok(())
}

fn engine_with_seed(
    settings: Settings,
    seed: Option<&Path>,
) -> anyhow::Result<(SecretEngine, Arc<JsonConfigStore>)> {
    let config = match seed {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read seed file {}", path.display()))?;
            let value = serde_json::from_str(&content)
                .with_context(|| format!("Seed file {} is not valid JSON", path.display()))?;
            Arc::new(JsonConfigStore::from_value(value))
        }
        None => Arc::new(JsonConfigStore::new()),
    };

    let engine = SecretEngine::builder(settings).config_store(config.clone()).build()?;
    Ok((engine, config))
}

fn print_resolution(resolution: &Resolution) {
    let width = resolution.secrets.keys().map(str::len).max().unwrap_or(0).max("KEY".len());

    println!("{:<width$}  VALUE", "KEY");
    println!("{}", "-".repeat(width + 16));
    for (key, value) in resolution.secrets.iter() {
        println!("{:<width$}  {}", key, redact_secret(value));
    }

    if !resolution.errors.is_empty() {
        println!();
        println!("Source errors:");
        for error in &resolution.errors {
            println!("  [{}] {}", error.kind(), error);
        }
    }
}

#[derive(Serialize)]
struct InjectionOutput<'a> {
    written: &'a [String],
    unset: &'a [String],
    config: serde_json::Value,
}

fn print_injection(summary: &InjectionSummary, config: &JsonConfigStore) -> anyhow::Result<()> {
    let output = InjectionOutput {
        written: &summary.written,
        unset: &summary.unset,
        config: config.snapshot(),
    };
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}
