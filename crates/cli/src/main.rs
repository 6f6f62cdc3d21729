//! shelfmark command-line entry point.
//!
//! The host-command surface: annotate/clear/rerun a page, refresh the
//! dataset caches, inspect cache status, manage settings, factory reset.
//! Logging goes to stderr so annotated HTML can stream to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shelfmark_annotate::{Document, DomScanner};
use shelfmark_client::{FetchClient, FetchConfig, RefreshOrchestrator};
use shelfmark_core::{AppConfig, KeyValueStore, SettingsStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shelfmark", version, about = "Badge web pages with catalog ownership status")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Annotate an HTML page with ownership badges
    Annotate {
        /// Input HTML file
        input: PathBuf,
        /// Write annotated HTML here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Page URL, checked against the configured page filters
        #[arg(long)]
        url: Option<String>,
        /// Ignore dataset TTLs for this run
        #[arg(long)]
        force_refresh: bool,
    },
    /// Strip every injected badge and processed flag from a page
    Clear {
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Clear and annotate again from scratch
    Rerun {
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Refresh expired datasets now
    Refresh {
        /// Ignore TTLs and refresh everything
        #[arg(long)]
        force: bool,
    },
    /// Show cache freshness per dataset
    Status,
    /// Inspect or modify settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Wipe every stored key: settings and cached datasets
    FactoryReset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommands {
    /// Print the effective settings as JSON
    Show,
    /// Set one field (value is parsed as JSON, else taken as a string)
    Set { field: String, value: String },
    /// Restore the default settings
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let store = KeyValueStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

    match cli.command {
        Commands::Annotate { input, output, url, force_refresh } => {
            annotate(&config, &store, &input, output.as_deref(), url.as_deref(), force_refresh, false).await
        }
        Commands::Clear { input, output } => clear(&store, &input, output.as_deref()).await,
        Commands::Rerun { input, output, url } => {
            annotate(&config, &store, &input, output.as_deref(), url.as_deref(), false, true).await
        }
        Commands::Refresh { force } => refresh(&config, &store, force).await,
        Commands::Status => status(&config, &store).await,
        Commands::Settings { command } => settings(&store, command).await,
        Commands::FactoryReset { yes } => factory_reset(&store, yes).await,
    }
}

fn build_orchestrator(config: &AppConfig, store: &KeyValueStore) -> Result<RefreshOrchestrator> {
    let client = FetchClient::new(FetchConfig::from(config)).context("failed to build fetch client")?;
    Ok(RefreshOrchestrator::new(store.clone(), Arc::new(client), config.clone()))
}

fn write_output(output: Option<&Path>, html: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{html}"),
    }
    Ok(())
}

async fn annotate(
    config: &AppConfig,
    store: &KeyValueStore,
    input: &Path,
    output: Option<&Path>,
    url: Option<&str>,
    force_refresh: bool,
    rerun: bool,
) -> Result<()> {
    let html = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let settings = SettingsStore::new(store.clone()).load().await?;

    if let Some(url) = url
        && !settings.allows_url(url)
    {
        tracing::info!(url, "page is filtered out, leaving it untouched");
        return write_output(output, &html);
    }

    let orchestrator = build_orchestrator(config, store)?;
    if force_refresh {
        orchestrator.invalidate_all().await?;
    }

    let snapshot = orchestrator.snapshot(&settings).await?;

    let scanner = DomScanner::new(settings);
    let mut doc = Document::parse(&html);
    if rerun {
        scanner.clear(&mut doc);
    }
    let outcome = scanner.scan(&mut doc, &snapshot);
    tracing::info!(annotated = outcome.annotated, skipped = outcome.skipped, "annotation pass finished");

    write_output(output, &doc.to_html())
}

async fn clear(store: &KeyValueStore, input: &Path, output: Option<&Path>) -> Result<()> {
    let html = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let settings = SettingsStore::new(store.clone()).load().await?;

    let scanner = DomScanner::new(settings);
    let mut doc = Document::parse(&html);
    let removed = scanner.clear(&mut doc);
    tracing::info!(removed, "cleared annotations");

    write_output(output, &doc.to_html())
}

async fn refresh(config: &AppConfig, store: &KeyValueStore, force: bool) -> Result<()> {
    let settings = SettingsStore::new(store.clone()).load().await?;
    let orchestrator = build_orchestrator(config, store)?;

    if force {
        orchestrator.invalidate_all().await?;
    }
    orchestrator.snapshot(&settings).await?;

    print_status(&orchestrator).await
}

async fn status(config: &AppConfig, store: &KeyValueStore) -> Result<()> {
    let orchestrator = build_orchestrator(config, store)?;
    print_status(&orchestrator).await
}

async fn print_status(orchestrator: &RefreshOrchestrator) -> Result<()> {
    for dataset in orchestrator.status().await? {
        let refreshed = dataset
            .refreshed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let entries = dataset.entries.map(|n| format!("{n} entries")).unwrap_or_else(|| "no data".to_string());
        println!("{:<20} {refreshed:<24} {entries}", dataset.key);
    }
    Ok(())
}

async fn settings(store: &KeyValueStore, command: SettingsCommands) -> Result<()> {
    let settings_store = SettingsStore::new(store.clone());
    let settings = match command {
        SettingsCommands::Show => settings_store.load().await?,
        SettingsCommands::Set { field, value } => {
            let value = serde_json::from_str(&value).unwrap_or_else(|_| serde_json::Value::String(value));
            settings_store.set_field(&field, value).await?
        }
        SettingsCommands::Reset => settings_store.reset().await?,
    };
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn factory_reset(store: &KeyValueStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("this wipes all settings and cached data; pass --yes to confirm");
    }
    let removed = store.clear().await?;
    println!("factory reset complete, {removed} keys removed");
    Ok(())
}
