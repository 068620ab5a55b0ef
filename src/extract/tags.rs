use scraper::{Html, Selector};

use crate::db::Tag;

const TAG_LINKS: &str = r#"div[data-testid="TagCloudWrapper"] a"#;

/// (category, subcategory) pairs from tag-cloud link paths. Only hrefs with
/// exactly two path segments qualify; anything else is navigation chrome.
/// Duplicates are kept here — set semantics belong to the taxonomy store,
/// not the per-record tag list.
pub fn extract(doc: &Html) -> Vec<Tag> {
    let sel = Selector::parse(TAG_LINKS).unwrap();
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let parts: Vec<&str> = href.trim_matches('/').split('/').collect();
            match parts.as_slice() {
                [category, subcategory] => Some(Tag {
                    category: (*category).to_string(),
                    subcategory: (*subcategory).to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

// ── Tests ──
