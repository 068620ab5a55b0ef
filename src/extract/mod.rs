pub mod fields;
pub mod information;
pub mod ingredients;
pub mod instructions;
pub mod rating;
pub mod reviews;
pub mod tags;

use std::fmt;

use scraper::{ElementRef, Html};

use crate::db::Recipe;

/// Why a document failed the completeness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incomplete {
    MissingTitle,
    NoIngredients,
    NoInstructions,
}

impl fmt::Display for Incomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Incomplete::MissingTitle => "no title",
            Incomplete::NoIngredients => "empty ingredient list",
            Incomplete::NoInstructions => "empty instruction list",
        };
        f.write_str(s)
    }
}

/// A document rejected by the gate, identified by its resolved sid.
#[derive(Debug)]
pub struct Skipped {
    pub ident: String,
    pub reason: Incomplete,
}

/// Run every field extractor against one parsed page and assemble a
/// candidate record. Partially rendered pages are common on broad crawls;
/// the gate keeps them from overwriting good prior data with blanks.
pub fn assemble(doc: &Html, url: &str) -> Result<Recipe, Skipped> {
    let sid = fields::sid(doc, url);
    let title = fields::resolve(doc, fields::TITLE);
    let ingredients = ingredients::extract(doc);
    let instructions = instructions::extract(doc);

    let gate = |reason| Skipped {
        ident: sid.clone(),
        reason,
    };
    let Some(title) = title else {
        return Err(gate(Incomplete::MissingTitle));
    };
    if ingredients.is_empty() {
        return Err(gate(Incomplete::NoIngredients));
    }
    if instructions.is_empty() {
        return Err(gate(Incomplete::NoInstructions));
    }

    let (reviews_score, reviews_count) = rating::review_aggregate(doc);

    Ok(Recipe {
        sid,
        title,
        image: fields::resolve(doc, fields::IMAGE),
        created_by: fields::resolve(doc, fields::CREATED_BY),
        created_at: fields::resolve(doc, fields::CREATED_AT),
        rating: rating::extract(doc),
        reviews_score,
        reviews_count,
        information: information::extract(doc),
        ingredients,
        instructions,
        reviews: reviews::extract(doc),
        tags: tags::extract(doc),
    })
}

// ── Node helpers shared by the field parsers ──

/// First text node under `el` in document order, descendants included.
pub(crate) fn first_text(el: ElementRef<'_>) -> Option<&str> {
    el.text().next()
}

/// First direct child text node of `el`; text inside child elements does
/// not count.
pub(crate) fn direct_text(el: ElementRef<'_>) -> Option<&str> {
    el.children().find_map(|node| match node.value() {
        scraper::Node::Text(text) => Some(&**text),
        _ => None,
    })
}

/// Direct element children of `el` with the given tag name.
pub(crate) fn children_named<'a>(
    el: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == name)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fixture: &str) -> Html {
        let html =
            std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn choc_cake_assembles() {
        let doc = parse("choc_cake");
        let recipe =
            assemble(&doc, "https://www.example.com/recipes/food/views/choc-cake").unwrap();

        assert_eq!(recipe.sid, "choc-cake");
        assert_eq!(recipe.title, "Double Chocolate Cake");
        assert_eq!(recipe.created_by.as_deref(), Some("Maya Ortiz"));
        assert_eq!(recipe.created_at.as_deref(), Some("January 4, 2024"));
        assert_eq!(recipe.rating, Some(142));
        assert_eq!(recipe.reviews_score, 4.2);
        assert_eq!(recipe.reviews_count, 57);
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.instructions.len(), 2);
        assert!(recipe.instructions.iter().all(|s| s.starts_with("<div")));
        assert!(recipe.instructions.iter().all(|s| !s.contains("class=")));
        assert_eq!(recipe.reviews.len(), 2);
        assert_eq!(recipe.tags.len(), 2);
    }

    #[test]
    fn choc_cake_information_entries() {
        let doc = parse("choc_cake");
        let recipe =
            assemble(&doc, "https://www.example.com/recipes/food/views/choc-cake").unwrap();
        assert_eq!(
            recipe.information,
            vec![
                "Total Time: 1 hour 30 minutes".to_string(),
                "Yield: 12 servings".to_string(),
                // layout-only slot survives as a placeholder
                String::new(),
            ]
        );
    }

    #[test]
    fn partial_page_fails_gate() {
        let doc = parse("partial");
        let err = assemble(&doc, "https://www.example.com/recipes/food/views/partial-page")
            .unwrap_err();
        assert_eq!(err.reason, Incomplete::NoIngredients);
        assert_eq!(err.ident, "partial-page");
    }

    #[test]
    fn blank_page_fails_on_title() {
        let doc = Html::parse_document("<html><body></body></html>");
        let err = assemble(&doc, "https://www.example.com/recipes/food/views/blank").unwrap_err();
        assert_eq!(err.reason, Incomplete::MissingTitle);
        assert_eq!(err.ident, "blank");
    }

    #[test]
    fn direct_text_skips_nested_elements() {
        let doc = Html::parse_fragment("<p>outer <span>inner</span></p>");
        let p = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "p")
            .unwrap();
        assert_eq!(direct_text(p), Some("outer "));
        assert_eq!(first_text(p), Some("outer "));
    }
}
