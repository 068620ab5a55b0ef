use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

const DB_PATH: &str = "data/recipes.sqlite";

pub fn connect() -> Result<Connection> {
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            kind       TEXT NOT NULL CHECK(kind IN ('listing','recipe')),
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(kind, visited);

        -- Latest fetched snapshot per queued page
        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            page_id    INTEGER UNIQUE NOT NULL REFERENCES pages(id),
            url        TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Canonical recipe documents, one per sid.
        -- Sequence-valued fields are JSON arrays.
        CREATE TABLE IF NOT EXISTS recipes (
            sid               TEXT PRIMARY KEY,
            title             TEXT NOT NULL,
            image             TEXT,
            created_by        TEXT,
            created_at        TEXT,
            rating            INTEGER,
            reviews_score     REAL NOT NULL DEFAULT 0,
            reviews_count     INTEGER NOT NULL DEFAULT 0,
            information       TEXT NOT NULL,
            ingredients       TEXT NOT NULL,
            instructions      TEXT NOT NULL,
            reviews           TEXT NOT NULL,
            tags              TEXT NOT NULL,
            source_updated_at TEXT NOT NULL,
            record_created_at TEXT NOT NULL,
            record_updated_at TEXT NOT NULL
        );

        -- Derived taxonomy, one row per category; subcategories is a JSON
        -- array with set semantics (grow-only, no duplicates).
        CREATE TABLE IF NOT EXISTS categories (
            category      TEXT PRIMARY KEY,
            subcategories TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Crawl queue ──

pub fn insert_pages(conn: &Connection, pages: &[(String, String)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO pages (url, kind) VALUES (?1, ?2)")?;
        for (url, kind) in pages {
            count += stmt.execute(rusqlite::params![url, kind])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_listing_urls(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM pages WHERE kind = 'listing' ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Recipe pages due for a crawl. `refresh` re-delivers already-visited pages
/// so stored records get their freshness touch.
pub fn fetch_recipe_pages(
    conn: &Connection,
    limit: Option<usize>,
    refresh: bool,
) -> Result<Vec<(i64, String)>> {
    let mut sql = String::from("SELECT id, url FROM pages WHERE kind = 'recipe'");
    if !refresh {
        sql.push_str(" AND visited = 0");
    }
    sql.push_str(" ORDER BY id");
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct FetchRow {
    pub page_id: i64,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

pub fn fetch_snapshots(conn: &Connection, limit: Option<usize>) -> Result<Vec<PageSnapshot>> {
    let sql = format!(
        "SELECT url, html FROM page_data WHERE html IS NOT NULL ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PageSnapshot {
                url: row.get(0)?,
                html: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Recipe documents ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub category: String,
    pub subcategory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub text: Option<String>,
    pub info: Vec<String>,
}

/// A candidate recipe document as assembled from one page. Carries no
/// timestamps; those belong to the stored copy and are managed by the
/// reconciliation step. Derived `PartialEq` is the change-detection
/// comparison: every field here is content-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub sid: String,
    pub title: String,
    pub image: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub rating: Option<i64>,
    pub reviews_score: f64,
    pub reviews_count: i64,
    pub information: Vec<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub reviews: Vec<Review>,
    pub tags: Vec<Tag>,
}

pub struct StoredRecipe {
    pub recipe: Recipe,
    pub source_updated_at: String,
    pub record_created_at: String,
    pub record_updated_at: String,
}

pub fn get_recipe(conn: &Connection, sid: &str) -> Result<Option<StoredRecipe>> {
    struct Raw {
        sid: String,
        title: String,
        image: Option<String>,
        created_by: Option<String>,
        created_at: Option<String>,
        rating: Option<i64>,
        reviews_score: f64,
        reviews_count: i64,
        information: String,
        ingredients: String,
        instructions: String,
        reviews: String,
        tags: String,
        source_updated_at: String,
        record_created_at: String,
        record_updated_at: String,
    }

    let raw = conn
        .query_row(
            "SELECT sid, title, image, created_by, created_at, rating,
                    reviews_score, reviews_count, information, ingredients,
                    instructions, reviews, tags,
                    source_updated_at, record_created_at, record_updated_at
             FROM recipes WHERE sid = ?1",
            [sid],
            |row| {
                Ok(Raw {
                    sid: row.get(0)?,
                    title: row.get(1)?,
                    image: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: row.get(4)?,
                    rating: row.get(5)?,
                    reviews_score: row.get(6)?,
                    reviews_count: row.get(7)?,
                    information: row.get(8)?,
                    ingredients: row.get(9)?,
                    instructions: row.get(10)?,
                    reviews: row.get(11)?,
                    tags: row.get(12)?,
                    source_updated_at: row.get(13)?,
                    record_created_at: row.get(14)?,
                    record_updated_at: row.get(15)?,
                })
            },
        )
        .optional()?;

    let Some(raw) = raw else { return Ok(None) };

    Ok(Some(StoredRecipe {
        recipe: Recipe {
            sid: raw.sid,
            title: raw.title,
            image: raw.image,
            created_by: raw.created_by,
            created_at: raw.created_at,
            rating: raw.rating,
            reviews_score: raw.reviews_score,
            reviews_count: raw.reviews_count,
            information: serde_json::from_str(&raw.information)
                .context("bad information JSON")?,
            ingredients: serde_json::from_str(&raw.ingredients)
                .context("bad ingredients JSON")?,
            instructions: serde_json::from_str(&raw.instructions)
                .context("bad instructions JSON")?,
            reviews: serde_json::from_str(&raw.reviews).context("bad reviews JSON")?,
            tags: serde_json::from_str(&raw.tags).context("bad tags JSON")?,
        },
        source_updated_at: raw.source_updated_at,
        record_created_at: raw.record_created_at,
        record_updated_at: raw.record_updated_at,
    }))
}

/// First insertion: all three timestamps start equal.
pub fn insert_recipe(conn: &Connection, r: &Recipe, stamp: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO recipes
         (sid, title, image, created_by, created_at, rating,
          reviews_score, reviews_count, information, ingredients,
          instructions, reviews, tags,
          source_updated_at, record_created_at, record_updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?14,?14)",
        rusqlite::params![
            r.sid,
            r.title,
            r.image,
            r.created_by,
            r.created_at,
            r.rating,
            r.reviews_score,
            r.reviews_count,
            serde_json::to_string(&r.information)?,
            serde_json::to_string(&r.ingredients)?,
            serde_json::to_string(&r.instructions)?,
            serde_json::to_string(&r.reviews)?,
            serde_json::to_string(&r.tags)?,
            stamp,
        ],
    )?;
    Ok(())
}

/// Content change: replace comparable fields, advance record_updated_at and
/// source_updated_at together. record_created_at is never touched.
pub fn update_recipe(conn: &Connection, r: &Recipe, stamp: &str) -> Result<()> {
    conn.execute(
        "UPDATE recipes SET
            title = ?2, image = ?3, created_by = ?4, created_at = ?5,
            rating = ?6, reviews_score = ?7, reviews_count = ?8,
            information = ?9, ingredients = ?10, instructions = ?11,
            reviews = ?12, tags = ?13,
            source_updated_at = ?14, record_updated_at = ?14
         WHERE sid = ?1",
        rusqlite::params![
            r.sid,
            r.title,
            r.image,
            r.created_by,
            r.created_at,
            r.rating,
            r.reviews_score,
            r.reviews_count,
            serde_json::to_string(&r.information)?,
            serde_json::to_string(&r.ingredients)?,
            serde_json::to_string(&r.instructions)?,
            serde_json::to_string(&r.reviews)?,
            serde_json::to_string(&r.tags)?,
            stamp,
        ],
    )?;
    Ok(())
}

/// Freshness touch: the page was re-observed with identical content.
pub fn touch_recipe(conn: &Connection, sid: &str, stamp: &str) -> Result<()> {
    conn.execute(
        "UPDATE recipes SET source_updated_at = ?2 WHERE sid = ?1",
        rusqlite::params![sid, stamp],
    )?;
    Ok(())
}

// ── Taxonomy ──

pub fn get_category(conn: &Connection, category: &str) -> Result<Option<Vec<String>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT subcategories FROM categories WHERE category = ?1",
            [category],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(json) => Ok(Some(
            serde_json::from_str(&json).context("bad subcategories JSON")?,
        )),
        None => Ok(None),
    }
}

pub fn insert_category(conn: &Connection, category: &str, subcategories: &[String]) -> Result<()> {
    conn.execute(
        "INSERT INTO categories (category, subcategories) VALUES (?1, ?2)",
        rusqlite::params![category, serde_json::to_string(subcategories)?],
    )?;
    Ok(())
}

pub fn update_category(conn: &Connection, category: &str, subcategories: &[String]) -> Result<()> {
    conn.execute(
        "UPDATE categories SET subcategories = ?2 WHERE category = ?1",
        rusqlite::params![category, serde_json::to_string(subcategories)?],
    )?;
    Ok(())
}

// ── Overview ──

pub struct OverviewRow {
    pub sid: String,
    pub title: String,
    pub created_by: String,
    pub rating: Option<i64>,
    pub reviews_score: f64,
    pub reviews_count: i64,
    pub record_updated_at: String,
}

pub fn fetch_overview(conn: &Connection, limit: usize) -> Result<Vec<OverviewRow>> {
    let mut stmt = conn.prepare(
        "SELECT sid, title, COALESCE(created_by,''), rating,
                reviews_score, reviews_count, record_updated_at
         FROM recipes
         ORDER BY record_updated_at DESC, sid
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(OverviewRow {
                sid: row.get(0)?,
                title: row.get(1)?,
                created_by: row.get(2)?,
                rating: row.get(3)?,
                reviews_score: row.get(4)?,
                reviews_count: row.get(5)?,
                record_updated_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_categories(conn: &Connection) -> Result<Vec<(String, Vec<String>)>> {
    let mut stmt =
        conn.prepare("SELECT category, subcategories FROM categories ORDER BY category")?;
    let raw: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(category, json)| {
            let subs = serde_json::from_str(&json).context("bad subcategories JSON")?;
            Ok((category, subs))
        })
        .collect()
}

// ── Stats ──

pub struct Stats {
    pub listings: usize,
    pub queued: usize,
    pub visited: usize,
    pub snapshots: usize,
    pub errors: usize,
    pub recipes: usize,
    pub categories: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let listings: usize = conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE kind = 'listing'",
        [],
        |r| r.get(0),
    )?;
    let queued: usize = conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE kind = 'recipe'",
        [],
        |r| r.get(0),
    )?;
    let visited: usize = conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE kind = 'recipe' AND visited = 1",
        [],
        |r| r.get(0),
    )?;
    let snapshots: usize = conn.query_row("SELECT COUNT(*) FROM page_data", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let recipes: usize = conn.query_row("SELECT COUNT(*) FROM recipes", [], |r| r.get(0))?;
    let categories: usize = conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
    Ok(Stats {
        listings,
        queued,
        visited,
        snapshots,
        errors,
        recipes,
        categories,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe() -> Recipe {
        Recipe {
            sid: "choc-cake".into(),
            title: "Chocolate Cake".into(),
            image: Some("https://assets.example.com/cake.jpg".into()),
            created_by: Some("Maya Ortiz".into()),
            created_at: Some("January 4, 2024".into()),
            rating: Some(142),
            reviews_score: 4.2,
            reviews_count: 57,
            information: vec!["Total Time: 1 hour".into(), String::new()],
            ingredients: vec!["2 cups flour".into(), "1 cup cocoa".into()],
            instructions: vec!["<div><p>Mix.</p></div>".into()],
            reviews: vec![Review {
                text: Some("Came out great.".into()),
                info: vec!["anon".into(), "4/5".into()],
            }],
            tags: vec![Tag {
                category: "desserts".into(),
                subcategory: "cake".into(),
            }],
        }
    }

    #[test]
    fn recipe_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let recipe = sample_recipe();
        insert_recipe(&conn, &recipe, "2024-05-01T00:00:00Z").unwrap();

        let stored = get_recipe(&conn, "choc-cake").unwrap().unwrap();
        assert_eq!(stored.recipe, recipe);
        assert_eq!(stored.record_created_at, "2024-05-01T00:00:00Z");
        assert_eq!(stored.record_updated_at, "2024-05-01T00:00:00Z");
        assert_eq!(stored.source_updated_at, "2024-05-01T00:00:00Z");
    }

    #[test]
    fn missing_recipe_is_none() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert!(get_recipe(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn update_preserves_created_at() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut recipe = sample_recipe();
        insert_recipe(&conn, &recipe, "2024-05-01T00:00:00Z").unwrap();

        recipe.ingredients.push("pinch of salt".into());
        update_recipe(&conn, &recipe, "2024-05-02T00:00:00Z").unwrap();

        let stored = get_recipe(&conn, "choc-cake").unwrap().unwrap();
        assert_eq!(stored.recipe, recipe);
        assert_eq!(stored.record_created_at, "2024-05-01T00:00:00Z");
        assert_eq!(stored.record_updated_at, "2024-05-02T00:00:00Z");
        assert_eq!(stored.source_updated_at, "2024-05-02T00:00:00Z");
    }

    #[test]
    fn touch_only_moves_source_timestamp() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        insert_recipe(&conn, &sample_recipe(), "2024-05-01T00:00:00Z").unwrap();
        touch_recipe(&conn, "choc-cake", "2024-05-03T00:00:00Z").unwrap();

        let stored = get_recipe(&conn, "choc-cake").unwrap().unwrap();
        assert_eq!(stored.record_updated_at, "2024-05-01T00:00:00Z");
        assert_eq!(stored.source_updated_at, "2024-05-03T00:00:00Z");
    }

    #[test]
    fn queue_ignores_duplicate_urls() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let pages = vec![
            ("https://example.com/recipes/a".to_string(), "recipe".to_string()),
            ("https://example.com/recipes/a".to_string(), "recipe".to_string()),
            ("https://example.com/recipes/b".to_string(), "recipe".to_string()),
        ];
        assert_eq!(insert_pages(&conn, &pages).unwrap(), 2);
        assert_eq!(insert_pages(&conn, &pages).unwrap(), 0);
    }
}
