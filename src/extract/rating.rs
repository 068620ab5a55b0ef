use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

static RATING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d+)\)").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

const RATING_CELL: &str =
    r#"div[data-testid="RatingWrapper"] > div:first-of-type > p:nth-of-type(2)"#;
const REVIEW_PARAGRAPHS: &str = r#"div[data-testid="RatingWrapper"] p"#;

/// Parenthesized rater tally, e.g. "Average rating (142)" -> 142. The value
/// is a count, not a star score; it is stored exactly as the page shows it.
pub fn extract(doc: &Html) -> Option<i64> {
    let sel = Selector::parse(RATING_CELL).unwrap();
    let el = doc.select(&sel).next()?;
    let text: String = el.text().collect();
    let caps = RATING_RE.captures(&text)?;
    caps[1].parse().ok()
}

/// Average score and review count from the first two paragraphs of the
/// rating container. Anything missing or unparseable defaults to zero;
/// this never fails.
pub fn review_aggregate(doc: &Html) -> (f64, i64) {
    let sel = Selector::parse(REVIEW_PARAGRAPHS).unwrap();
    let mut paragraphs = doc.select(&sel);
    let (Some(first), Some(second)) = (paragraphs.next(), paragraphs.next()) else {
        return (0.0, 0);
    };

    let score = first
        .text()
        .collect::<String>()
        .trim()
        .parse::<f64>()
        .unwrap_or(0.0);
    let count = DIGITS_RE
        .find(&second.text().collect::<String>())
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(0);
    (score, count)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rating_wrapper: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div data-testid="RatingWrapper">{}</div></body></html>"#,
            rating_wrapper
        ))
    }

    #[test]
    fn parenthesized_tally() {
        let doc = page("<div><p>4.2</p><p>Average rating (142)</p></div>");
        assert_eq!(extract(&doc), Some(142));
    }

    #[test]
    fn no_parenthesized_number_is_none() {
        let doc = page("<div><p>4.2</p><p>Average rating</p></div>");
        assert_eq!(extract(&doc), None);
    }

    #[test]
    fn missing_element_is_none() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert_eq!(extract(&doc), None);
    }

    #[test]
    fn aggregate_reads_score_and_count() {
        let doc = page("<div><p> 4.2 </p><p>57 reviews</p></div>");
        assert_eq!(review_aggregate(&doc), (4.2, 57));
    }

    #[test]
    fn aggregate_defaults_when_container_sparse() {
        // a single paragraph is not enough to trust either number
        let doc = page("<div><p>4.2</p></div>");
        assert_eq!(review_aggregate(&doc), (0.0, 0));
    }

    #[test]
    fn aggregate_defaults_on_unparseable_score() {
        let doc = page("<div><p>n/a</p><p>no reviews yet</p></div>");
        assert_eq!(review_aggregate(&doc), (0.0, 0));
    }
}
