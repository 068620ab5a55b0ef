use scraper::{Html, Selector};

use super::direct_text;

const INFO_ITEMS: &str = r#"div[data-testid="InfoSliceList"] ul li"#;
const ITEM_BLOCKS: &str = "div p";

/// "label: value" entries from the info slice list, one per list item. An
/// item whose child paragraphs are all empty still yields an entry (the
/// empty string), keeping the stored sequence aligned with rendered slots.
pub fn extract(doc: &Html) -> Vec<String> {
    let items = Selector::parse(INFO_ITEMS).unwrap();
    let blocks = Selector::parse(ITEM_BLOCKS).unwrap();
    doc.select(&items)
        .map(|item| {
            let parts: Vec<&str> = item
                .select(&blocks)
                .filter_map(direct_text)
                .filter(|t| !t.is_empty())
                .collect();
            parts.join(": ")
        })
        .collect()
}

// ── Tests ──
