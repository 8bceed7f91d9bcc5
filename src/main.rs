//! Registry-Harvest main entry point
//!
//! This is the command-line interface for the Registry-Harvest ingester.

use anyhow::{bail, Context};
use clap::Parser;
use registry_harvest::config::{load_config_with_hash, validate, Config};
use registry_harvest::crawler::{CrawlController, CrawlEvent};
use registry_harvest::proxy::ProxyPool;
use registry_harvest::region::{Region, REGIONS};
use registry_harvest::storage::{open_proxy_store, ProgressStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Registry-Harvest: a resilient business-registry ingester
///
/// Walks every listing page of one region of the business registry through
/// a rotating proxy pool, classifies each company homepage's CMS and writes
/// the result as a semicolon-separated CSV file.
#[derive(Parser, Debug)]
#[command(name = "registry-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resilient business-registry ingester", long_about = None)]
struct Cli {
    /// Region to crawl, by name or site code (see --list-regions)
    #[arg(value_name = "REGION", required_unless_present_any = ["list_regions", "refresh_proxies"])]
    region: Option<String>,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore and reset the resume checkpoint
    #[arg(long)]
    fresh: bool,

    /// Send every request directly instead of through proxies
    #[arg(long)]
    no_proxy: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["list_regions", "refresh_proxies"])]
    dry_run: bool,

    /// Print the known regions and exit
    #[arg(long, conflicts_with = "refresh_proxies")]
    list_regions: bool,

    /// Rebuild the proxy pool from the public sources and exit
    #[arg(long)]
    refresh_proxies: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if cli.list_regions {
        print_regions();
        return Ok(());
    }

    let mut config = load(cli.config.as_deref())?;
    if cli.no_proxy {
        config.proxy.enabled = false;
    }

    if cli.refresh_proxies {
        return handle_refresh_proxies(&config).await;
    }

    let Some(query) = cli.region.as_deref() else {
        bail!("no region given");
    };
    let region = Region::find(query)
        .with_context(|| format!("unknown region '{}' (try --list-regions)", query))?;

    if cli.dry_run {
        handle_dry_run(&config, &region);
        return Ok(());
    }

    handle_crawl(config, region, cli.fresh).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("registry_harvest=info,warn"),
            1 => EnvFilter::new("registry_harvest=debug,info"),
            2 => EnvFilter::new("registry_harvest=trace,debug"),
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

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

fn print_regions() {
    println!("{:<28} CODE", "REGION");
    for region in REGIONS.iter() {
        println!("{:<28} {}", region.name, region.code);
    }
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config, region: &Region) {
    println!("=== Registry-Harvest Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Region: {} ({})", region.name, region.code);

    println!("\nFetching:");
    println!("  Request spacing: {}ms", config.fetch.min_delay_ms);
    println!("  Attempts per page: {}", config.fetch.max_retries);
    println!(
        "  Page delay: {}-{}ms",
        config.crawl.page_delay_min_ms, config.crawl.page_delay_max_ms
    );

    println!("\nProxies:");
    if config.proxy.enabled {
        println!("  Store: {}", config.proxy.store_path);
        for source in &config.proxy.sources {
            println!("  - {:?} {}", source.format, source.url);
        }
    } else {
        println!("  Disabled (direct connection)");
    }

    println!("\nOutput:");
    println!("  CSV directory: {}", config.output.csv_dir);
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --refresh-proxies mode
async fn handle_refresh_proxies(config: &Config) -> anyhow::Result<()> {
    if !config.proxy.enabled {
        bail!("proxy use is disabled; nothing to refresh");
    }

    let store = Arc::new(open_proxy_store(Path::new(&config.proxy.store_path))?);
    let pool = ProxyPool::new(config, store)?;
    let size = pool.refresh().await;

    println!("✓ Proxy pool holds {} validated proxies", size);
    for proxy in pool.snapshot() {
        println!("  - {}", proxy.proxy_url());
    }
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, region: Region, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous checkpoint)");
        ProgressStore::new(&config.output.checkpoint_path)
            .reset()
            .context("failed to reset checkpoint")?;
    }

    let controller = Arc::new(CrawlController::from_config(config).await?);

    let fetcher = controller.fetcher();
    tracing::info!(
        "Requests spaced {}ms apart, {} proxies in rotation",
        fetcher.limiter().min_delay().as_millis(),
        fetcher.pool().len()
    );
    if let Some(store) = controller.progress_store() {
        tracing::debug!("Checkpointing to {}", store.path().display());
    }

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stopping after the current page...");
            stop.stop();
        }
    });

    let mut events = controller.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CrawlEvent::Progress {
                    processed,
                    pages_loaded,
                    total_pages,
                }) => {
                    tracing::info!(
                        "Progress: {} companies, {}/{} pages",
                        processed,
                        pages_loaded,
                        total_pages
                    );
                }
                Ok(CrawlEvent::Message(text)) => tracing::debug!("{}", text),
                Ok(CrawlEvent::Finished(_)) | Ok(CrawlEvent::Failed(_)) => break,
                Err(RecvError::Lagged(n)) => tracing::debug!("Skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = controller.start(region).await;
    let _ = reporter.await;

    match result {
        Ok(report) => {
            println!(
                "✓ {}: {} companies from {}/{} pages ({})",
                report.region.name,
                report.export.records,
                report.pages_loaded,
                report.total_pages,
                report.status
            );
            println!("  Saved to: {}", report.export.path.display());
            println!(
                "  TYPO3 likely: {}, Shopware likely/possibly: {}, probe errors: {}",
                report.export.platform_a_likely,
                report.export.platform_b_candidates,
                report.export.probe_errors
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e).context(format!("crawl of {} failed", region.name))
        }
    }
}
