//! CLI commands and output formatting for the registry.

use clap::Subcommand;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::catalog::{Catalog, HttpCatalog};
use super::error::Result;
use super::search::FilterOptions;
use super::service::{FormulaService, SyncReport, UpdateOutcome};
use super::store::RegistryStore;
use crate::config::FormulasConfig;
use crate::record::FormulaRecord;

/// Registry subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FormulasCommand {
    /// List known formulas
    List {
        /// Include hidden formulas
        #[arg(short, long)]
        all: bool,

        /// Include formulas only available from the catalog
        #[arg(short, long, conflicts_with = "local")]
        online: bool,

        /// Show only formulas with a local copy
        #[arg(short, long)]
        local: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search formulas by name
    Search {
        /// Search query; several words must all appear in the display name
        query: String,

        /// Include hidden formulas
        #[arg(short, long)]
        all: bool,

        /// Include formulas only available from the catalog
        #[arg(short, long, conflicts_with = "local")]
        online: bool,

        /// Show only formulas with a local copy
        #[arg(short, long)]
        local: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh the registry from local files and the catalog
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync periodically until interrupted
    Watch {
        /// Seconds between syncs
        #[arg(short, long, value_name = "SECS", default_value_t = 300)]
        interval: u64,
    },

    /// Download a formula's source
    Download {
        /// Name of the formula
        name: String,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Re-download formula(s) with a newer remote source
    Update {
        /// Name of the formula (default: all with an update)
        name: Option<String>,

        /// Preview without downloading
        #[arg(long)]
        dry_run: bool,
    },

    /// Hide a formula from listings
    Hide {
        /// Name of the formula
        name: String,
    },

    /// Show a hidden formula again
    Unhide {
        /// Name of the formula
        name: String,
    },

    /// Delete the local copy of a formula
    Delete {
        /// Name of the formula
        name: String,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show detailed information about a formula
    Info {
        /// Name of the formula
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change display preferences
    Prefs {
        /// Include hidden formulas in listings by default
        #[arg(long, value_name = "BOOL")]
        show_hidden: Option<bool>,

        /// Include online-only formulas in listings by default
        #[arg(long, value_name = "BOOL")]
        show_online: Option<bool>,

        /// Enable debug logging by default
        #[arg(long, value_name = "BOOL")]
        debug: Option<bool>,
    },
}

/// Execute a registry command.
///
/// `config_path` is where `prefs` writes changes.
pub async fn execute(command: FormulasCommand, config: FormulasConfig, config_path: &Path) -> Result<()> {
    let defaults = FilterOptions::from(config.display);

    match command {
        FormulasCommand::List {
            all,
            online,
            local,
            json,
        } => {
            let options = listing_options(defaults, all, online, local);
            handle_list(&open_service(&config)?, "", options, json)?;
        }
        FormulasCommand::Search {
            query,
            all,
            online,
            local,
            json,
        } => {
            let options = listing_options(defaults, all, online, local);
            handle_list(&open_service(&config)?, &query, options, json)?;
        }
        FormulasCommand::Sync { json } => {
            handle_sync(&open_service(&config)?, json).await?;
        }
        FormulasCommand::Watch { interval } => {
            handle_watch(&open_service(&config)?, Duration::from_secs(interval.max(1))).await;
        }
        FormulasCommand::Download { name, yes } => {
            handle_download(&open_service(&config)?, name, yes).await?;
        }
        FormulasCommand::Update { name, dry_run } => {
            handle_update(&open_service(&config)?, name, dry_run).await?;
        }
        FormulasCommand::Hide { name } => {
            open_service(&config)?.set_hidden(&name, true)?;
            eprintln!("Hidden {name}");
        }
        FormulasCommand::Unhide { name } => {
            open_service(&config)?.set_hidden(&name, false)?;
            eprintln!("Unhidden {name}");
        }
        FormulasCommand::Delete { name, yes } => {
            handle_delete(&open_service(&config)?, name, yes)?;
        }
        FormulasCommand::Info { name, json } => {
            handle_info(&open_service(&config)?, name, json)?;
        }
        FormulasCommand::Prefs {
            show_hidden,
            show_online,
            debug,
        } => {
            handle_prefs(config, config_path, show_hidden, show_online, debug)?;
        }
    }

    Ok(())
}

/// Build the service over the configured store and catalog.
fn open_service(config: &FormulasConfig) -> Result<FormulaService<HttpCatalog>> {
    let store = RegistryStore::new(config)?;
    let catalog = HttpCatalog::new(&config.catalog)?;
    Ok(FormulaService::new(store, catalog))
}

/// Command-line flags only widen or narrow the configured defaults.
fn listing_options(defaults: FilterOptions, all: bool, online: bool, local: bool) -> FilterOptions {
    FilterOptions {
        show_hidden: defaults.show_hidden || all,
        show_online: (defaults.show_online || online) && !local,
    }
}

fn handle_list<C: Catalog>(
    service: &FormulaService<C>,
    query: &str,
    options: FilterOptions,
    json: bool,
) -> Result<()> {
    let records = service.list(query, options)?;

    if json {
        let json_str = format_json(&records)?;
        println!("{json_str}");
    } else {
        let headers = &["NAME", "TITLE", "STATUS", "AUTHOR"];
        let rows: Vec<Vec<String>> = records.iter().map(list_row).collect();
        format_table(headers, rows);
    }

    Ok(())
}

fn list_row(record: &FormulaRecord) -> Vec<String> {
    let status = if record.hidden {
        format!("{} (hidden)", record.status())
    } else {
        record.status().to_string()
    };
    vec![
        record.name.clone(),
        record.title(),
        status,
        record.author.clone(),
    ]
}

async fn handle_sync<C: Catalog>(service: &FormulaService<C>, json: bool) -> Result<()> {
    let progress = spinner("Syncing formulas");
    let result = service.sync().await;
    progress.finish_and_clear();
    let report = result?;

    if json {
        let json_str = format_json(&report)?;
        println!("{json_str}");
    } else {
        print_sync_summary(&report);
    }
    Ok(())
}

fn print_sync_summary(report: &SyncReport) {
    eprintln!("{} formula(s) in registry", report.total);
    for name in &report.discovered {
        eprintln!("  + {name} (local)");
    }
    for name in &report.added {
        eprintln!("  + {name}");
    }
    for name in &report.pruned {
        eprintln!("  - {name}");
    }
    if !report.updates.is_empty() {
        eprintln!("Updates available: {}", report.updates.join(", "));
    }
    if let Some(error) = &report.catalog_error {
        eprintln!("Catalog not reachable, showing local state only: {error}");
    }
}

async fn handle_watch<C: Catalog>(service: &FormulaService<C>, interval: Duration) {
    info!("Syncing every {}s, press Ctrl+C to stop", interval.as_secs());
    run_watch(service, interval, tokio::signal::ctrl_c()).await;
    info!("Received Ctrl+C, stopping watch");
}

/// Sync on every tick until `shutdown` resolves, abandoning a sync in progress.
async fn run_watch<C: Catalog, F: Future>(service: &FormulaService<C>, interval: Duration, shutdown: F) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    result = service.sync() => match result {
                        Ok(report) => print_sync_summary(&report),
                        Err(e) => warn!("Sync failed: {}", e),
                    },
                    _ = &mut shutdown => break,
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

async fn handle_download<C: Catalog>(service: &FormulaService<C>, name: String, yes: bool) -> Result<()> {
    if !yes && is_tty() {
        let prompt = format!("Download {name}?");
        if !confirm(&prompt)? {
            eprintln!("Download cancelled");
            return Ok(());
        }
    }

    let progress = spinner(&format!("Downloading {name}"));
    let result = service.download(&name).await;
    progress.finish_and_clear();
    let record = result?;

    if let Some(path) = &record.local_path {
        eprintln!("Downloaded {} to {}", record.name, path.display());
    }
    Ok(())
}

async fn handle_update<C: Catalog>(
    service: &FormulaService<C>,
    name: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let progress = spinner("Checking for updates");
    let result = service.update(name.as_deref(), dry_run).await;
    progress.finish_and_clear();
    let outcomes = result?;

    if outcomes.is_empty() {
        eprintln!("All formulas are up to date");
    }
    for outcome in &outcomes {
        match outcome {
            UpdateOutcome::UpToDate { name } => eprintln!("{name} is up to date"),
            UpdateOutcome::WouldUpdate { name } => eprintln!("Would update {name}"),
            UpdateOutcome::Updated { name, path } => {
                eprintln!("Updated {name} at {}", path.display());
            }
            UpdateOutcome::Failed { name, error } => eprintln!("Failed to update {name}: {error}"),
        }
    }
    Ok(())
}

fn handle_delete<C: Catalog>(service: &FormulaService<C>, name: String, yes: bool) -> Result<()> {
    if !yes && is_tty() {
        let prompt = format!("Delete local copy of {name}?");
        if !confirm(&prompt)? {
            eprintln!("Deletion cancelled");
            return Ok(());
        }
    }

    let record = service.delete(&name)?;
    if record.has_remote_source() {
        eprintln!("Deleted {name}; it can be downloaded again from the catalog");
    } else {
        eprintln!("Deleted {name}");
    }
    Ok(())
}

fn handle_info<C: Catalog>(service: &FormulaService<C>, name: String, json: bool) -> Result<()> {
    let record = service.get(&name)?;

    if json {
        let json_str = format_json(&record)?;
        println!("{json_str}");
        return Ok(());
    }

    eprintln!("Name: {}", record.name);
    eprintln!("Title: {}", record.title());
    eprintln!("Status: {}", record.status());
    if record.hidden {
        eprintln!("Hidden: yes");
    }
    if !record.author.is_empty() {
        eprintln!("Author: {}", record.author);
    }
    if !record.description.is_empty() {
        eprintln!();
        eprintln!("{}", record.description);
    }
    eprintln!();
    if record.has_remote_source() {
        eprintln!("Source: {}", record.source_url);
    }
    if !record.page_url.is_empty() {
        eprintln!("Page: {}", record.page_url);
    }
    if let Some(path) = &record.local_path {
        eprintln!("Local: {}", path.display());
    }
    if let Some(at) = record.last_downloaded_at {
        eprintln!("Downloaded: {}", at.to_rfc3339());
    }
    if let Some(at) = record.source_updated_at {
        eprintln!("Remote updated: {}", at.to_rfc3339());
    }

    if !record.params.is_empty() {
        eprintln!();
        eprintln!("Parameters:");
        let headers = &["LABEL", "KIND", "DEFAULT", "OPTIONS"];
        let rows: Vec<Vec<String>> = record
            .params
            .iter()
            .map(|p| {
                vec![
                    p.label(),
                    p.kind.to_string(),
                    p.default_value().to_string(),
                    p.options.join("|"),
                ]
            })
            .collect();
        format_table(headers, rows);
    }

    Ok(())
}

fn handle_prefs(
    mut config: FormulasConfig,
    config_path: &Path,
    show_hidden: Option<bool>,
    show_online: Option<bool>,
    debug: Option<bool>,
) -> Result<()> {
    if show_hidden.is_none() && show_online.is_none() && debug.is_none() {
        let rows = vec![
            vec!["show_hidden".to_string(), config.display.show_hidden.to_string()],
            vec!["show_online".to_string(), config.display.show_online.to_string()],
            vec!["debug".to_string(), config.display.debug.to_string()],
        ];
        format_table(&["PREFERENCE", "VALUE"], rows);
        return Ok(());
    }

    if let Some(value) = show_hidden {
        config.display.show_hidden = value;
    }
    if let Some(value) = show_online {
        config.display.show_online = value;
    }
    if let Some(value) = debug {
        config.display.debug = value;
    }
    config.validate()?;
    config.save(config_path)?;
    eprintln!("Saved preferences to {}", config_path.display());
    Ok(())
}

/// Check if stdout is a TTY.
fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Prompt user for confirmation.
fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(result)
}

/// Spinner on stderr, hidden when not attached to a terminal.
fn spinner(message: &str) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Format and print a table to stdout.
fn format_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        eprintln!("No formulas found");
        return;
    }

    let widths = column_widths(headers, &rows);

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  ").trim_end());

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", separator.join("  "));

    for row in rows {
        let formatted_row: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = width)
            })
            .collect();
        println!("{}", formatted_row.join("  ").trim_end());
    }
}

/// Widest cell per column, headers included. Counts characters, not bytes.
fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}

/// Format data as JSON.
fn format_json<T: serde::Serialize>(data: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(data)?;
    Ok(json)
}
