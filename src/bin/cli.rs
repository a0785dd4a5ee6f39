//! Feed Crawler CLI
//!
//! Local execution entry point; one subcommand per scheduled job.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use feedcrawler::{
    error::Result,
    models::{Config, SourceDescriptor, SourceKind},
    pipeline,
    services::{AnthropicClassifier, CrossrefFetcher, FeedFetcher},
    storage::{LocalStorage, RecordStorage},
    utils::http,
};

/// Environment variable overriding `research.mailto`.
const CROSSREF_EMAIL_VAR: &str = "CROSSREF_EMAIL";

/// feedcrawler - News and Journal Digest Crawler
#[derive(Parser, Debug)]
#[command(
    name = "feedcrawler",
    version,
    about = "Deduplicating news and journal crawler"
)]
struct Cli {
    /// Path to storage directory holding sources, memory logs and output
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl news feeds into the news log
    News,

    /// Crawl journals through Crossref into the research log
    Research,

    /// Filter the past window of news for relevance
    Filter,

    /// Validate configuration and source tables
    Validate,

    /// Show memory log and snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let mut config = Config::load_or_default(&config_path);
    if let Some(mailto) = std::env::var(CROSSREF_EMAIL_VAR)
        .ok()
        .filter(|m| !m.trim().is_empty())
    {
        config.research.mailto = Some(mailto);
    }

    log::info!("Using storage directory {}", cli.storage_dir.display());
    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::News => {
            config.validate()?;
            let client = http::create_async_client(&config.crawler)?;
            let fetcher = FeedFetcher::new(client);
            pipeline::run_crawl(&config.news.settings(), &storage, &fetcher, Utc::now()).await?;
        }

        Command::Research => {
            config.validate()?;
            let client = http::create_async_client(&config.crawler)?;
            let fetcher = CrossrefFetcher::new(client, &config.research);
            pipeline::run_crawl(&config.research.settings(), &storage, &fetcher, Utc::now())
                .await?;
        }

        Command::Filter => {
            config.validate()?;
            let client = http::create_async_client(&config.crawler)?;
            // Fails before any network I/O when the key is absent.
            let classifier = AnthropicClassifier::from_env(client, &config.relevance)?;
            let report = pipeline::run_filter(&config, &storage, &classifier, Utc::now()).await?;
            if let Some(message) = &report.summary.message {
                log::info!("{}", message);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            for (file, kind) in [
                (&config.news.sources_file, SourceKind::Feed),
                (&config.research.sources_file, SourceKind::Journal),
            ] {
                let sources = storage.load_sources(file).await?.into_strict()?;
                SourceDescriptor::validate_table(&sources, kind)?;
                let active = sources.iter().filter(|s| s.active).count();
                log::info!("✓ {} ({} sources, {} active)", file, sources.len(), active);
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            for settings in [config.news.settings(), config.research.settings()] {
                let memory = storage.load_log(&settings.log_file).await?;
                match memory.newest_observation() {
                    Some(newest) => log::info!(
                        "[{}] {} records in {}, newest observed {}",
                        settings.label,
                        memory.len(),
                        settings.log_file,
                        newest
                    ),
                    None => log::info!("[{}] {} is empty", settings.label, settings.log_file),
                }

                match storage.read_snapshot(&settings.output_file).await? {
                    Some(snapshot) => log::info!(
                        "[{}] snapshot {} generated {} with {} records",
                        settings.label,
                        settings.output_file,
                        snapshot.generated_at,
                        snapshot.record_count
                    ),
                    None => log::info!("[{}] no snapshot yet", settings.label),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
