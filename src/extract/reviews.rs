use scraper::{Html, Selector};

use super::{children_named, direct_text};

use crate::db::Review;

const REVIEWS_LIST: &str = r#"div[data-journey-hook="recipe-footer"] #reviews ul"#;

/// Reader reviews. Only direct list items containing at least one paragraph
/// count (layout-only items carry none). The first direct paragraph is the
/// review body; paragraphs inside a nested list are the structured metadata
/// (reviewer, date, rating) in document order.
pub fn extract(doc: &Html) -> Vec<Review> {
    let list_sel = Selector::parse(REVIEWS_LIST).unwrap();
    let p_sel = Selector::parse("p").unwrap();
    let Some(list) = doc.select(&list_sel).next() else {
        return Vec::new();
    };

    children_named(list, "li")
        .filter(|li| li.select(&p_sel).next().is_some())
        .map(|li| Review {
            text: children_named(li, "p")
                .next()
                .and_then(direct_text)
                .map(str::to_string),
            info: children_named(li, "ul")
                .flat_map(|ul| children_named(ul, "li"))
                .flat_map(|item| children_named(item, "p"))
                .filter_map(direct_text)
                .map(str::to_string)
                .collect(),
        })
        .collect()
}

// ── Tests ──
