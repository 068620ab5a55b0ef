use scraper::{Html, Selector};

/// One lookup strategy in a fallback chain: a CSS selector plus how to pull
/// a value out of the first match.
#[derive(Clone, Copy)]
pub enum Lookup {
    /// Text content of the first matching element.
    Text(&'static str),
    /// Named attribute of the first matching element.
    Attr(&'static str, &'static str),
}

pub const CANONICAL_URL: &[Lookup] = &[
    Lookup::Attr(r#"meta[property="og:url"]"#, "content"),
    Lookup::Attr(r#"link[rel="canonical"]"#, "href"),
];

pub const TITLE: &[Lookup] = &[
    Lookup::Text(".page__main-content h1"),
    Lookup::Text(r#"h1[data-testid="ContentHeaderHed"]"#),
    Lookup::Attr(r#"meta[property="og:title"]"#, "content"),
];

pub const IMAGE: &[Lookup] = &[
    Lookup::Attr(".page__main-content picture img", "src"),
    Lookup::Attr(r#"meta[property="og:image"]"#, "content"),
];

pub const CREATED_BY: &[Lookup] = &[
    Lookup::Text(r#".page__main-content a[data-testid="BylineName"]"#),
    Lookup::Text(".page__main-content a"),
];

pub const CREATED_AT: &[Lookup] = &[
    Lookup::Text(".page__main-content time"),
    Lookup::Attr(".page__main-content time", "datetime"),
];

/// Try each lookup in order; the first non-empty value wins. Absent fields
/// are normal (markup varies across page generations) and surface as None.
pub fn resolve(doc: &Html, chain: &[Lookup]) -> Option<String> {
    chain.iter().find_map(|lookup| {
        let value = match lookup {
            Lookup::Text(css) => {
                let sel = Selector::parse(css).unwrap();
                doc.select(&sel)
                    .next()
                    .map(|el| el.text().collect::<String>())
            }
            Lookup::Attr(css, attr) => {
                let sel = Selector::parse(css).unwrap();
                doc.select(&sel)
                    .next()
                    .and_then(|el| el.value().attr(attr))
                    .map(str::to_string)
            }
        };
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Stable identifier: last path segment of the canonical URL, falling back
/// to the fetched URL when the page carries no canonical meta.
pub fn sid(doc: &Html, url: &str) -> String {
    let canonical = resolve(doc, CANONICAL_URL);
    last_segment(canonical.as_deref().unwrap_or(url)).to_string()
}

fn last_segment(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

// ── Tests ──
