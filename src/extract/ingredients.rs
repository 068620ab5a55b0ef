use scraper::{Html, Selector};

use super::first_text;

const INGREDIENT_NODES: &str = r#"div[data-testid="IngredientList"] div"#;
const HEADING_MARKER: &str = "####";
const NUTRITION_MARKER: &str = "Nutritional analysis";

/// Ingredient lines. The first node of the container is a non-ingredient
/// header and is skipped; empty lines, markdown-heading noise, and the
/// trailing nutrition disclaimer (which reuses the same markup) are dropped.
pub fn extract(doc: &Html) -> Vec<String> {
    let sel = Selector::parse(INGREDIENT_NODES).unwrap();
    doc.select(&sel)
        .skip(1)
        .filter_map(first_text)
        .map(str::trim)
        .filter(|t| {
            !t.is_empty() && !t.starts_with(HEADING_MARKER) && !t.contains(NUTRITION_MARKER)
        })
        .map(str::to_string)
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page(nodes: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div data-testid="IngredientList">{}</div></body></html>"#,
            nodes
        ))
    }

    #[test]
    fn header_noise_and_disclaimer_filtered() {
        let doc = page(
            "<div>Ingredients</div>\
             <div>2 cups flour</div>\
             <div>#### Equipment</div>\
             <div>Nutritional analysis: 200 cal per serving</div>",
        );
        assert_eq!(extract(&doc), vec!["2 cups flour".to_string()]);
    }

    #[test]
    fn order_preserved_and_text_trimmed() {
        let doc = page(
            "<div>Ingredients</div>\
             <div>  2 cups flour </div>\
             <div>1 cup cocoa</div>\
             <div>3 eggs</div>",
        );
        assert_eq!(
            extract(&doc),
            vec![
                "2 cups flour".to_string(),
                "1 cup cocoa".to_string(),
                "3 eggs".to_string()
            ]
        );
    }

    #[test]
    fn whitespace_only_nodes_dropped() {
        let doc = page("<div>Ingredients</div><div>   </div><div>1 cup cocoa</div>");
        assert_eq!(extract(&doc), vec!["1 cup cocoa".to_string()]);
    }

    #[test]
    fn missing_container_is_empty() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert!(extract(&doc).is_empty());
    }
}
