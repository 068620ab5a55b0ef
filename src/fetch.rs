use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::FetchRow;
use crate::reconcile::{self, IngestCounts};

const CONCURRENCY: usize = 10;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
pub const USER_AGENT: &str = concat!("recipe_scraper/", env!("CARGO_PKG_VERSION"));

/// Crawl stats returned after completion.
pub struct CrawlStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    pub counts: IngestCounts,
}

/// Fetch recipe pages concurrently; each page is snapshotted and ingested
/// as its response arrives. The single writer loop keeps reconciliations
/// serialized per sid, so re-crawls cannot race their own lookups.
pub async fn crawl_pages_streaming(
    conn: &Connection,
    pages: Vec<(i64, String)>,
) -> Result<CrawlStats> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send results, main loop persists and ingests
    let (tx, mut rx) = tokio::sync::mpsc::channel::<FetchRow>(CONCURRENCY * 2);

    for (page_id, url) in pages {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let row = fetch_with_retry(&client, page_id, &url).await;
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;
    let mut counts = IngestCounts::default();

    // Prepare statements once, reuse for each row
    let mut snapshot_stmt = conn.prepare(
        "INSERT OR REPLACE INTO page_data (page_id, url, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut visit_stmt = conn.prepare(
        "UPDATE pages SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
    )?;

    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }

        snapshot_stmt.execute(rusqlite::params![
            row.page_id,
            row.url,
            row.html,
            row.status,
            row.error,
            row.latency_ms,
        ])?;
        visit_stmt.execute(rusqlite::params![row.page_id])?;

        if let Some(html) = &row.html {
            let outcome = reconcile::ingest(conn, html, &row.url, Utc::now())?;
            counts.record(&outcome);
            if counts.ingested() > 0 && counts.ingested() % 10 == 0 {
                info!("Ingested {} records.", counts.ingested());
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Crawled {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(CrawlStats {
        total,
        ok,
        errors,
        counts,
    })
}

async fn fetch_with_retry(client: &Client, page_id: i64, url: &str) -> FetchRow {
    for attempt in 0..=MAX_RETRIES {
        let row = fetch_one(client, page_id, url).await;

        let should_retry = matches!(row.status, Some(429) | Some(500) | Some(502) | Some(503));
        if !should_retry || attempt == MAX_RETRIES {
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Got {} on {} (attempt {}/{}), backing off {:.1}s",
            row.status.unwrap_or_default(),
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    fetch_one(client, page_id, url).await
}

/// One GET. Failures land in the row's error column instead of bubbling up,
/// so a bad page never aborts the crawl.
async fn fetch_one(client: &Client, page_id: i64, url: &str) -> FetchRow {
    let start = Instant::now();
    let response = client.get(url).send().await;
    let elapsed = start.elapsed().as_millis() as i64;

    match response {
        Ok(resp) => {
            let status = resp.status();
            match resp.text().await {
                Ok(body) if status.is_success() => FetchRow {
                    page_id,
                    url: url.to_string(),
                    html: Some(body),
                    status: Some(status.as_u16() as i32),
                    error: None,
                    latency_ms: Some(elapsed),
                },
                Ok(_) => FetchRow {
                    page_id,
                    url: url.to_string(),
                    html: None,
                    status: Some(status.as_u16() as i32),
                    error: Some(format!("HTTP {}", status)),
                    latency_ms: Some(elapsed),
                },
                Err(e) => FetchRow {
                    page_id,
                    url: url.to_string(),
                    html: None,
                    status: Some(status.as_u16() as i32),
                    error: Some(e.to_string()),
                    latency_ms: Some(elapsed),
                },
            }
        }
        Err(e) => FetchRow {
            page_id,
            url: url.to_string(),
            html: None,
            status: e.status().map(|s| s.as_u16() as i32),
            error: Some(e.to_string()),
            latency_ms: Some(elapsed),
        },
    }
}

/// Fetch a single page body, erroring on non-success status. Used for the
/// sequential listing walk.
pub async fn fetch_page(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {} for {}", status, url);
    }
    Ok(resp.text().await?)
}
