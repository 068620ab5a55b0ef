use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use scraper::Html;
use tracing::{debug, info, warn};

use crate::db::{self, Recipe};
use crate::extract;
use crate::taxonomy;

/// What one ingestion did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted(String),
    Updated(String),
    Unchanged(String),
    Skipped(String),
}

/// Ingest one fetched page: assemble a candidate record, reconcile it
/// against the recipe store, and fold its tags into the taxonomy. A page
/// that fails the completeness gate becomes `Skipped`; only store failures
/// are errors.
pub fn ingest(conn: &Connection, html: &str, url: &str, now: DateTime<Utc>) -> Result<Outcome> {
    let doc = Html::parse_document(html);
    let recipe = match extract::assemble(&doc, url) {
        Ok(recipe) => recipe,
        Err(skip) => {
            warn!(ident = %skip.ident, url, "skipping document: {}", skip.reason);
            return Ok(Outcome::Skipped(format!("{}: {}", skip.ident, skip.reason)));
        }
    };

    let outcome = reconcile(conn, &recipe, now)?;
    taxonomy::aggregate(conn, &recipe.tags)?;
    Ok(outcome)
}

/// Decide insert / update / freshness-touch for one candidate record.
///
/// The comparison covers every content field and none of the timestamps:
/// `source_updated_at` advances on every observation, `record_updated_at`
/// only when content differs, `record_created_at` is written once. This
/// lets downstream consumers tell staleness from volatility.
pub fn reconcile(conn: &Connection, candidate: &Recipe, now: DateTime<Utc>) -> Result<Outcome> {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    match db::get_recipe(conn, &candidate.sid)? {
        None => {
            db::insert_recipe(conn, candidate, &stamp)?;
            info!(sid = %candidate.sid, "inserted new record");
            Ok(Outcome::Inserted(candidate.sid.clone()))
        }
        Some(stored) if stored.recipe != *candidate => {
            db::update_recipe(conn, candidate, &stamp)?;
            info!(sid = %candidate.sid, "content changed, record updated");
            Ok(Outcome::Updated(candidate.sid.clone()))
        }
        Some(_) => {
            db::touch_recipe(conn, &candidate.sid, &stamp)?;
            debug!(sid = %candidate.sid, "no changes, freshness touch");
            Ok(Outcome::Unchanged(candidate.sid.clone()))
        }
    }
}

/// Running tally of ingestion outcomes, for progress reporting. The core
/// itself holds no counters; callers fold `Outcome` values into this.
#[derive(Debug, Default)]
pub struct IngestCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl IngestCounts {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Inserted(_) => self.inserted += 1,
            Outcome::Updated(_) => self.updated += 1,
            Outcome::Unchanged(_) => self.unchanged += 1,
            Outcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Records that actually reached the store.
    pub fn ingested(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn print(&self) {
        println!(
            "Ingested {} records: {} inserted, {} updated, {} unchanged ({} skipped).",
            self.ingested(),
            self.inserted,
            self.updated,
            self.unchanged,
            self.skipped,
        );
    }
}

// ── Tests ──
