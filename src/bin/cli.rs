//! sucatalog CLI
//!
//! Local execution entry point: refresh the catalog cache, then publish new
//! releases to the record stores.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sucatalog::{
    config,
    error::Result,
    models::Platform,
    pipeline,
    services::{ConditionalFetcher, catalog},
    storage::CatalogCache,
    utils::http,
};
use tokio::io::AsyncReadExt;

/// sucatalog - Software update catalog tracker
#[derive(Parser, Debug)]
#[command(
    name = "sucatalog",
    version,
    about = "Track software update catalogs and publish new releases"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sucatalog.toml")]
    config: PathBuf,

    /// Override the catalog cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Override the feed list file
    #[arg(long)]
    feeds: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh every feed in the feed list into the cache
    Crawl,

    /// Publish releases not yet present in the record stores
    Publish {
        /// Catalog files (default: NUL-separated list on stdin)
        paths: Vec<PathBuf>,

        /// Resolve and select without pushing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse catalog files and list their releases
    Parse {
        /// Catalog files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Validate configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Catalog paths from stdin, separated by NUL bytes.
async fn read_paths_from_stdin() -> Result<Vec<PathBuf>> {
    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await?;
    Ok(input
        .split(|b| *b == 0)
        .filter(|p| !p.is_empty())
        .map(|p| PathBuf::from(String::from_utf8_lossy(p).into_owned()))
        .collect())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = config::load_config(&cli.config)?;
    if let Some(cache_dir) = cli.cache_dir {
        config.paths.cache_dir = cache_dir;
    }
    if let Some(feeds) = cli.feeds {
        config.paths.feed_list = feeds;
    }

    match cli.command {
        Command::Crawl => {
            let feeds = pipeline::load_feed_list(&config.paths.feed_list).await?;
            log::info!(
                "Loaded {} feeds from {}",
                feeds.len(),
                config.paths.feed_list.display()
            );

            let cache = CatalogCache::new(&config.paths.cache_dir);
            let fetcher = ConditionalFetcher::new(config.fetcher.clone(), cache)?;
            let summary = pipeline::run_crawler(&fetcher, &feeds).await;
            if summary.failed > 0 {
                log::warn!("{} feeds failed; see errors above", summary.failed);
            }
        }

        Command::Publish { paths, dry_run } => {
            let paths = if paths.is_empty() {
                read_paths_from_stdin().await?
            } else {
                paths
            };
            log::info!("{} catalogs to process", paths.len());

            let token = if dry_run {
                config.publisher.token()
            } else {
                Some(config.publisher.require_token()?)
            };
            let client = http::create_async_client(&config.fetcher)?;
            let stores = config::record_stores(&config, &client, token);

            pipeline::run_publish(&stores, &paths, dry_run).await?;
        }

        Command::Parse { paths } => {
            for path in &paths {
                let parsed = catalog::parse_file(path)?;
                log::info!("{}: {} releases", path.display(), parsed.len());
                for platform in Platform::ALL {
                    for record in parsed.for_platform(platform) {
                        let line = serde_json::json!({
                            "platform": platform,
                            "identifier": record.identifier,
                            "record": record,
                        });
                        println!("{line}");
                    }
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({} record stores)", config.stores.len());
        }
    }

    log::info!("Done!");

    Ok(())
}
