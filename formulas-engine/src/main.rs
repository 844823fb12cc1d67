//! Formulas - keep local editor formulas in sync with the remote catalog.
//!
//! This is the main entry point for the `formulas` command, which:
//! - Loads configuration from TOML
//! - Initializes logging
//! - Dispatches to the registry subcommands

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use formulas_engine::config::FormulasConfig;
use formulas_engine::registry::{self, FormulasCommand};

/// Formulas - registry of reusable editor automations
#[derive(Parser, Debug)]
#[command(name = "formulas")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Run in verbose mode (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: FormulasCommand,
}

/// Locate the configuration file: explicit path, then current directory, then XDG.
fn config_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| {
        let local = PathBuf::from("formulas.toml");
        if local.exists() {
            return local;
        }

        if let Ok(dirs) = registry::store::project_dirs() {
            return dirs.config_dir().join("formulas.toml");
        }

        local
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config_path(args.config);
    let config = FormulasConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let log_level = if args.verbose || config.display.debug {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("Using configuration {}", config_path.display());

    registry::execute(args.command, config, &config_path)
        .await
        .context("Command failed")?;

    Ok(())
}
