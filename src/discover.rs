use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::fetch;

/// Seed listing pages: gallery pages plus paginated category listings.
pub const START_URLS: &[&str] = &[
    // Meals
    "https://www.epicurious.com/recipes-menus/best-breakfast-recipes-gallery",
    "https://www.epicurious.com/type/lunch",
    "https://www.epicurious.com/recipes-menus/easy-dinner-ideas",
    "https://www.epicurious.com/recipes-menus/71-easy-dessert-recipes-for-baking-beginners-and-tired-cooks-gallery",
    "https://www.epicurious.com/recipes-menus/easy-cocktails-recipes-drinks-gallery",
    // Extras
    "https://www.epicurious.com/recipes-menus/batch-cocktails",
    "https://www.epicurious.com/holidays-events/easiest-thanksgiving-recipes-gallery",
];

// Two listing markups in the wild; galleries first, summary lists as the
// fallback. Only summary lists paginate.
const GALLERY_LINKS: &str = ".grid-layout__content ul li.gallery__slides__slide a";
const SUMMARY_LINKS: &str = ".summary-list__items .summary-item__hed-link";
const NEXT_PAGE: &str =
    r#".summary-list__items div[data-testid="summary-list_call-to-action"] div div > div:nth-of-type(3) a"#;

const MAX_LISTING_PAGES: usize = 200;

/// Walk the queued listing pages, following pagination until exhausted (or
/// the page budget runs out), and return every discovered recipe URL.
pub async fn discover_recipe_urls(listings: &[String]) -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .user_agent(fetch::USER_AGENT)
        .build()?;

    let mut queue: VecDeque<String> = listings.iter().cloned().collect();
    let mut seen: HashSet<String> = queue.iter().cloned().collect();
    let mut found: Vec<String> = Vec::new();
    let mut walked = 0usize;

    while let Some(url) = queue.pop_front() {
        if walked >= MAX_LISTING_PAGES {
            warn!("Listing page budget ({}) reached, stopping walk", MAX_LISTING_PAGES);
            break;
        }
        walked += 1;

        let base = match Url::parse(&url) {
            Ok(u) => u,
            Err(e) => {
                warn!(url = %url, "bad listing URL: {}", e);
                continue;
            }
        };
        let html = match fetch::fetch_page(&client, &url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, "listing fetch failed: {:#}", e);
                continue;
            }
        };

        let doc = Html::parse_document(&html);
        let (links, next) = harvest_listing(&doc, &base);
        info!(url = %url, "Found {} recipe links", links.len());

        for link in links {
            if seen.insert(link.clone()) {
                found.push(link);
            }
        }
        if let Some(next) = next {
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }

    Ok(found)
}

/// Recipe links out of one listing page, plus the next listing page if the
/// markup paginates. Relative hrefs resolve against the page URL.
pub fn harvest_listing(doc: &Html, base: &Url) -> (Vec<String>, Option<String>) {
    let mut links = select_hrefs(doc, GALLERY_LINKS, base);
    if links.is_empty() {
        links = select_hrefs(doc, SUMMARY_LINKS, base);
    }
    let next = select_hrefs(doc, NEXT_PAGE, base).into_iter().next();
    (links, next)
}

fn select_hrefs(doc: &Html, css: &str, base: &Url) -> Vec<String> {
    let sel = Selector::parse(css).unwrap();
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .collect()
}

// ── Tests ──
