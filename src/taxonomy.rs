use anyhow::Result;
use rusqlite::Connection;

use crate::db::{self, Tag};

/// Fold one record's tag observations into the taxonomy. Subcategories are
/// unioned into their category's stored set; re-applying the same tag list
/// is a no-op. The taxonomy only ever grows.
pub fn aggregate(conn: &Connection, tags: &[Tag]) -> Result<()> {
    for (category, observed) in group_by_category(tags) {
        match db::get_category(conn, &category)? {
            None => db::insert_category(conn, &category, &observed)?,
            Some(mut stored) => {
                let before = stored.len();
                for sub in observed {
                    if !stored.contains(&sub) {
                        stored.push(sub);
                    }
                }
                if stored.len() > before {
                    db::update_category(conn, &category, &stored)?;
                }
            }
        }
    }
    Ok(())
}

/// Observed subcategories per category, first-seen order, deduped within
/// the record.
fn group_by_category(tags: &[Tag]) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for tag in tags {
        match grouped.iter_mut().find(|(c, _)| c == &tag.category) {
            Some((_, subs)) => {
                if !subs.contains(&tag.subcategory) {
                    subs.push(tag.subcategory.clone());
                }
            }
            None => grouped.push((tag.category.clone(), vec![tag.subcategory.clone()])),
        }
    }
    grouped
}

// ── Tests ──
