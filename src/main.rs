mod archiver;
mod config;
mod delay;
mod extractor;
mod fetcher;
mod identity;
mod loader;
mod models;
mod parser;
mod scrape;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use scraper::Html;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::archiver::CompositeSink;
use crate::config::ScrapeConfig;
use crate::delay::{DelayPolicy, sleep_secs};
use crate::fetcher::{PageFetcher, ReqwestTransport};
use crate::identity::{BrowserCatalog, FixedUserAgent, UserAgentSource};
use crate::parser::ListingSelectors;

#[derive(Parser)]
#[command(name = "newegg-deals")]
#[command(about = "Scrape Newegg deal listings into CSV, JSON and SQLite")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through the deals API and write CSV + JSON
    Scrape {
        /// Output directory, repeat to write the same files to several places
        #[arg(short, long = "out", default_value = ".")]
        out: Vec<PathBuf>,
        #[arg(long, default_value_t = config::MAX_PAGES)]
        max_pages: u32,
        #[arg(long, default_value_t = config::MIN_PRODUCTS)]
        min_products: usize,
        #[arg(long, default_value_t = config::MAX_RETRIES)]
        max_retries: u32,
        /// Use the slower delay ranges
        #[arg(long)]
        cautious: bool,
        /// Send this user agent instead of rotating browser ones
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Load the newest scraped CSV into the SQLite products table
    Load {
        #[arg(long, default_value = config::DATABASE_FILE)]
        db: PathBuf,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = config::OUTPUT_PREFIX)]
        prefix: String,
    },
    /// Fetch the HTML deals page and print what the selectors find
    Listing {
        #[arg(long, default_value = config::DEALS_PAGE_URL)]
        url: String,
        #[arg(long, default_value_t = config::LISTING_LIMIT)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "newegg_deals_scraper=debug"
    } else {
        "newegg_deals_scraper=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Scrape { out, max_pages, min_products, max_retries, cautious, user_agent } => {
            let config = ScrapeConfig {
                max_pages,
                min_products,
                max_retries,
                delay: if cautious { DelayPolicy::cautious() } else { DelayPolicy::default() },
                output_dirs: out,
                ..ScrapeConfig::default()
            };
            let agents: Box<dyn UserAgentSource> = match user_agent {
                Some(ua) => Box::new(FixedUserAgent(ua)),
                None => Box::new(BrowserCatalog),
            };
            run_scrape(&config, agents)
        }
        Commands::Load { db, dir, prefix } => run_load(&db, &dir, &prefix),
        Commands::Listing { url, limit } => run_listing(&url, limit),
    }
}

fn run_scrape(config: &ScrapeConfig, agents: Box<dyn UserAgentSource>) -> Result<()> {
    let transport = ReqwestTransport::new(config.timeout)?;
    let fetcher = PageFetcher::new(transport, config.delay, config.max_retries).with_user_agents(agents);

    let outcome = scrape::run(&fetcher, config);

    let sink = CompositeSink::from_dirs(&config.output_dirs);
    let stamp = chrono::Local::now().naive_local();
    let saved = archiver::save_products(&sink, &outcome.records, &config.output_prefix, stamp);

    info!("Scraping summary:");
    info!("Total products scraped: {}", outcome.records.len());
    info!("Pages fetched: {} ({})", outcome.pages_fetched, outcome.stop);
    if let Some(path) = &saved.csv {
        info!("- CSV: {}", path.display());
    }
    if let Some(path) = &saved.json {
        info!("- JSON: {}", path.display());
    }
    Ok(())
}

fn run_load(db: &Path, dir: &Path, prefix: &str) -> Result<()> {
    let mut conn = Connection::open(db)?;
    loader::rebuild_table(&conn)?;
    info!("Database and table created successfully");

    let latest = loader::find_latest_csv(dir, prefix)?;
    info!("Found CSV file: {}", latest.display());

    let report = loader::load_csv(&mut conn, &latest)?;
    if report.skipped > 0 {
        warn!("Skipped {} rows from {}", report.skipped, report.source.display());
    }

    info!("Total products in database: {}", loader::count_products(&conn)?);
    let sample = loader::sample_products(&conn, 5)?;
    if sample.is_empty() {
        info!("No products found in database!");
    }
    for p in sample {
        info!("{} {} | ${} | rating {} | {}", p.id, p.title, p.price, p.rating, p.seller);
        if !p.bullet_description.is_empty() {
            debug!("   {}", p.bullet_description);
        }
    }
    Ok(())
}

fn run_listing(url: &str, limit: usize) -> Result<()> {
    let policy = DelayPolicy::listing();
    let transport = ReqwestTransport::new(config::REQUEST_TIMEOUT)?;
    info!("Fetching main page: {}", url);
    let Some(html) = fetcher::fetch_html(&transport, url, &policy)? else {
        warn!("Failed to get webpage content");
        return Ok(());
    };

    let doc = Html::parse_document(&html);
    let selectors = ListingSelectors::new()?;

    for product in parser::parse_listing(&doc, &selectors, limit) {
        info!(
            "Product {}: name={:?} price={:?} rating={:?} seller={:?}",
            product.position, product.name, product.price, product.rating, product.seller
        );
    }

    let containers = selectors.containers(&doc);
    let links = parser::product_links(&doc, &selectors, limit);
    for (i, (container, link)) in containers.iter().zip(links).enumerate() {
        sleep_secs(policy.retry_delay(&mut rand::rng()));
        match link {
            Some(href) => info!("Product {} URL: {}", i + 1, href),
            None => info!("Product {}: no link found", i + 1),
        }
        debug!("Container HTML: {}", parser::preview(container, 200));
    }
    Ok(())
}
