//! Reshelf main entry point
//!
//! This is the command-line interface for the Reshelf bookmark archive.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use reshelf::config::{
    default_config_path, load_config_with_hash, resolve_database_path, validate_fetch_config,
    Config,
};
use reshelf::import::read_bookmark_file;
use reshelf::output::{
    print_import_report, print_refresh_report, print_search_results, HIGHLIGHT_CLOSE,
    HIGHLIGHT_OPEN,
};
use reshelf::storage::{BookmarkStore, Storage};
use reshelf::{run_refresh, RefreshOptions, StrategyRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Reshelf: keeps a bookmark archive searchable
///
/// Imports browser bookmark exports, re-fetches the saved pages and keeps a
/// full-text index of their content.
#[derive(Parser, Debug)]
#[command(name = "reshelf")]
#[command(version)]
#[command(about = "Bookmark archive with full-text search", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the bookmark database (overrides the configuration)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a Netscape bookmark HTML export
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Re-fetch stored bookmarks and update their content
    Fetch(FetchArgs),

    /// Full-text search over titles, URLs and content
    Search {
        #[arg(required = true, value_name = "TERMS")]
        terms: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Concurrent connections
    #[arg(long)]
    threads: Option<u32>,

    /// Attempts per bookmark, including the first
    #[arg(long)]
    retry: Option<u32>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Pause between attempts in milliseconds
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Background slots for retrying fetches (0 disables early release)
    #[arg(long)]
    early_release_slots: Option<u32>,

    /// Only fetch bookmarks that have no content yet
    #[arg(long)]
    uncached: bool,

    /// Rewrite content even when the page looks unchanged
    #[arg(long)]
    overwrite: bool,

    /// Only re-fetch bookmarks handled by a newer site strategy
    #[arg(long)]
    outdated: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let start = Instant::now();
    let result = run(cli).await;

    match &result {
        Ok(()) => tracing::info!("Finished task in {:.3} seconds", start.elapsed().as_secs_f64()),
        Err(e) => tracing::error!("{:#}", e),
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database.path = Some(db.to_string_lossy().into_owned());
    }

    match cli.command {
        Command::Import { file } => handle_import(&config, &file),
        Command::Fetch(args) => handle_fetch(config, args).await,
        Command::Search { terms } => handle_search(&config, &terms),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reshelf=info,warn"),
            1 => EnvFilter::new("reshelf=debug,info"),
            2 => EnvFilter::new("reshelf=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the given config file, else the default one if present, else defaults
fn load_configuration(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.is_file()),
    };

    let Some(path) = path else {
        tracing::debug!("No configuration file, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

fn open_store(config: &Config) -> anyhow::Result<BookmarkStore> {
    let path = resolve_database_path(config)?;
    tracing::debug!("Opening database {}", path.display());
    BookmarkStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Handles `import`: parses the export and inserts it in one transaction
fn handle_import(config: &Config, file: &Path) -> anyhow::Result<()> {
    let entries = read_bookmark_file(file)
        .with_context(|| format!("Failed to import {}", file.display()))?;
    tracing::info!("Found {} bookmarks in {}", entries.len(), file.display());

    let mut store = open_store(config)?;
    let report = store.import_entries(&entries)?;

    print_import_report(&report);
    Ok(())
}

/// Handles `fetch`: the refresh run
async fn handle_fetch(mut config: Config, args: FetchArgs) -> anyhow::Result<()> {
    let fetch = &mut config.fetch;
    if let Some(threads) = args.threads {
        fetch.threads = threads;
    }
    if let Some(retries) = args.retry {
        fetch.retries = retries;
    }
    if let Some(timeout) = args.timeout {
        fetch.timeout = timeout;
    }
    if let Some(delay) = args.retry_delay {
        fetch.retry_delay = delay;
    }
    if let Some(slots) = args.early_release_slots {
        fetch.early_release_slots = slots;
    }
    validate_fetch_config(fetch)?;

    if fetch.accept_invalid_certs {
        tracing::warn!("TLS certificate validation is disabled (accept-invalid-certs = true)");
    }

    let mut options = RefreshOptions::from_config(fetch);
    options.uncached_only = args.uncached;
    options.overwrite = args.overwrite;
    options.outdated_only = args.outdated;

    let registry = Arc::new(StrategyRegistry::builtin()?);
    let mut store = open_store(&config)?;

    let report = run_refresh(&mut store, registry, options).await?;
    print_refresh_report(&report);
    Ok(())
}

/// Handles `search`: ranked full-text query
fn handle_search(config: &Config, terms: &[String]) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let results = store.search(&terms.join(" "), HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE)?;
    print_search_results(&results);
    Ok(())
}
