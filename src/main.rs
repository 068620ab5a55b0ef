mod db;
mod discover;
mod extract;
mod fetch;
mod reconcile;
mod taxonomy;

use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(name = "recipe_scraper", about = "Recipe crawler with a change-detecting store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the crawl queue with the listing start pages
    Init,
    /// Walk listing pages and queue discovered recipe URLs
    Discover,
    /// Fetch queued recipe pages, ingesting each as it arrives
    Crawl {
        /// Max pages to fetch (default: all due pages)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Re-fetch already-visited pages too (freshness re-crawl)
        #[arg(long)]
        refresh: bool,
    },
    /// Re-run extraction + reconciliation over stored page snapshots
    Process {
        /// Max snapshots to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Discover + crawl in one pipeline
    Run {
        /// Max pages to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Re-fetch already-visited pages too
        #[arg(long)]
        refresh: bool,
    },
    /// Show crawl and store statistics
    Stats,
    /// Recipe store overview table
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Derived category taxonomy
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let seeds: Vec<(String, String)> = discover::START_URLS
                .iter()
                .map(|url| (url.to_string(), "listing".to_string()))
                .collect();
            let inserted = db::insert_pages(&conn, &seeds)?;
            println!("Seeded {} listing pages ({} total).", inserted, seeds.len());
            Ok(())
        }
        Commands::Discover => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let listings = db::fetch_listing_urls(&conn)?;
            if listings.is_empty() {
                println!("No listing pages. Run 'init' first.");
                return Ok(());
            }
            let queued = discover_into_queue(&conn, &listings).await?;
            println!("Queued {} new recipe pages.", queued);
            Ok(())
        }
        Commands::Crawl { limit, refresh } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_recipe_pages(&conn, limit, refresh)?;
            if pages.is_empty() {
                println!("No pages due. Run 'discover' first, or pass --refresh to re-crawl.");
                return Ok(());
            }
            println!("Crawling {} pages (streaming to store)...", pages.len());
            let stats = fetch::crawl_pages_streaming(&conn, pages).await?;
            println!("Done: {} fetched ({} ok, {} errors).", stats.total, stats.ok, stats.errors);
            stats.counts.print();
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let snapshots = db::fetch_snapshots(&conn, limit)?;
            if snapshots.is_empty() {
                println!("No page snapshots. Run 'crawl' first.");
                return Ok(());
            }
            println!("Processing {} snapshots...", snapshots.len());
            let counts = process_snapshots(&conn, &snapshots)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit, refresh } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;

            // Phase 1: Discover
            let listings = db::fetch_listing_urls(&conn)?;
            if listings.is_empty() {
                println!("No listing pages. Run 'init' first.");
                return Ok(());
            }
            let t_discover = Instant::now();
            let queued = discover_into_queue(&conn, &listings).await?;
            println!(
                "Queued {} new recipe pages in {:.1}s",
                queued,
                t_discover.elapsed().as_secs_f64()
            );

            // Phase 2: Crawl + ingest (streaming)
            let pages = db::fetch_recipe_pages(&conn, limit, refresh)?;
            if pages.is_empty() {
                println!("Nothing due to crawl.");
                return Ok(());
            }
            let t_crawl = Instant::now();
            println!("Pipeline: crawling {} pages...", pages.len());
            let stats = fetch::crawl_pages_streaming(&conn, pages).await?;
            println!(
                "Crawled {} pages ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_crawl.elapsed().as_secs_f64()
            );
            stats.counts.print();
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Listings:   {}", s.listings);
            println!("Queued:     {}", s.queued);
            println!("Visited:    {}", s.visited);
            println!("Snapshots:  {}", s.snapshots);
            println!("Errors:     {}", s.errors);
            println!("Recipes:    {}", s.recipes);
            println!("Categories: {}", s.categories);
            Ok(())
        }
        Commands::Overview { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No recipes stored.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:<24} | {:<18} | {:>6} | {:>5} | {:<20}",
                "#", "Recipe", "Title", "Author", "Raters", "Score", "Updated"
            );
            println!("{}", "-".repeat(120));

            for (i, r) in rows.iter().enumerate() {
                let sid = truncate(&r.sid, 28);
                let title = truncate(&r.title, 24);
                let author = truncate(&r.created_by, 18);
                let raters = r.rating.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
                let updated = r.record_updated_at.get(..10).unwrap_or(&r.record_updated_at);

                println!(
                    "{:>3} | {:<28} | {:<24} | {:<18} | {:>6} | {:>5.1} | {:<20}",
                    i + 1, sid, title, author, raters, r.reviews_score, updated
                );
            }

            println!("\n{} recipes shown.", rows.len());
            Ok(())
        }
        Commands::Categories => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let categories = db::fetch_categories(&conn)?;
            if categories.is_empty() {
                println!("No categories aggregated yet.");
                return Ok(());
            }
            for (category, subs) in &categories {
                println!("{}: {}", category, subs.join(", "));
            }
            println!("\n{} categories.", categories.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn discover_into_queue(conn: &rusqlite::Connection, listings: &[String]) -> anyhow::Result<usize> {
    let urls = discover::discover_recipe_urls(listings).await?;
    let pages: Vec<(String, String)> = urls
        .into_iter()
        .map(|url| (url, "recipe".to_string()))
        .collect();
    db::insert_pages(conn, &pages)
}

/// Offline re-extraction over stored snapshots: assemble in parallel,
/// reconcile serially on this thread (the store writer).
fn process_snapshots(
    conn: &rusqlite::Connection,
    snapshots: &[db::PageSnapshot],
) -> anyhow::Result<reconcile::IngestCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(snapshots.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = reconcile::IngestCounts::default();
    let now = chrono::Utc::now();

    for chunk in snapshots.chunks(200) {
        let assembled: Vec<_> = chunk
            .par_iter()
            .map(|snap| {
                let doc = scraper::Html::parse_document(&snap.html);
                (snap.url.clone(), extract::assemble(&doc, &snap.url))
            })
            .collect();

        for (url, result) in assembled {
            let outcome = match result {
                Ok(recipe) => {
                    let outcome = reconcile::reconcile(conn, &recipe, now)?;
                    taxonomy::aggregate(conn, &recipe.tags)?;
                    outcome
                }
                Err(skip) => {
                    warn!(ident = %skip.ident, url, "skipping snapshot: {}", skip.reason);
                    reconcile::Outcome::Skipped(format!("{}: {}", skip.ident, skip.reason))
                }
            };
            counts.record(&outcome);
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
