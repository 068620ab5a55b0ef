use scraper::{ElementRef, Html, Selector};

const INSTRUCTION_STEPS: &str = r#"div[data-testid="InstructionsWrapper"] ol li"#;

/// One normalized fragment per instruction step, in document order.
pub fn extract(doc: &Html) -> Vec<String> {
    let sel = Selector::parse(INSTRUCTION_STEPS).unwrap();
    doc.select(&sel)
        .map(|el| normalize_fragment(&el.html()))
        .collect()
}

/// Re-serialize a markup fragment with presentational attributes stripped
/// from the root node and the root tag rewritten to a neutral `<div>`.
/// The source attaches auto-generated class names to structural elements;
/// without stripping them, every upstream styling deploy would register as
/// a content change in the stored record.
///
/// A fragment with no root element (bare text) passes through unchanged.
pub fn normalize_fragment(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let root = fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| !matches!(el.value().name(), "html" | "head" | "body"));
    let Some(root) = root else {
        return raw.to_string();
    };

    let mut out = String::from("<div");
    for (name, value) in root.value().attrs() {
        if name == "class" || name == "style" {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    out.push_str(&root.inner_html());
    out.push_str("</div>");
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_stripped_and_tag_rewritten() {
        let normalized = normalize_fragment(r#"<li class="step__item-a8f3">Fold in eggs.</li>"#);
        assert_eq!(normalized, "<div>Fold in eggs.</div>");
    }

    #[test]
    fn style_stripped_other_attributes_kept() {
        let normalized =
            normalize_fragment(r#"<li style="color:red" data-step="2">Whisk.</li>"#);
        assert_eq!(normalized, r#"<div data-step="2">Whisk.</div>"#);
    }

    #[test]
    fn nested_markup_survives() {
        let normalized = normalize_fragment(
            r#"<li class="x"><p>Bake at <b>350°F</b> for 30 minutes.</p></li>"#,
        );
        assert_eq!(normalized, "<div><p>Bake at <b>350°F</b> for 30 minutes.</p></div>");
    }

    #[test]
    fn bare_text_passes_through() {
        assert_eq!(normalize_fragment("just text"), "just text");
    }

    #[test]
    fn repeated_normalization_is_stable() {
        let once = normalize_fragment(r#"<li class="a">Stir.</li>"#);
        let twice = normalize_fragment(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn steps_extracted_in_order() {
        let doc = Html::parse_document(
            r#"<html><body><div data-testid="InstructionsWrapper"><ol>
                <li class="step-1"><p>Mix the dry ingredients.</p></li>
                <li class="step-2"><p>Add the wet ingredients.</p></li>
            </ol></div></body></html>"#,
        );
        let steps = extract(&doc);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].contains("Mix the dry ingredients."));
        assert!(steps[1].contains("Add the wet ingredients."));
        assert!(steps.iter().all(|s| s.starts_with("<div>")));
    }
}
