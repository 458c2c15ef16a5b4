//! Catalogue page extraction

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Extracts the detail page URLs linked from a catalogue page
///
/// Relative hrefs are resolved against the catalogue page's own URL. A
/// catalogue page with no product links is treated as a parse failure; the
/// site never serves an empty catalogue page.
///
/// # Arguments
///
/// * `html` - The catalogue page HTML
/// * `page_url` - The catalogue page URL, used as the resolution base
pub fn extract_child_urls(html: &str, page_url: &str) -> Result<Vec<String>, String> {
    let base = Url::parse(page_url).map_err(|e| format!("Invalid page URL {}: {}", page_url, e))?;

    let document = Html::parse_document(html);
    let selector = Selector::parse("article.product_pod h3 a").unwrap();

    let mut urls = Vec::new();
    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        match base.join(href) {
            Ok(resolved) => urls.push(resolved.to_string()),
            Err(e) => {
                debug!(href = %href, error = %e, "Skipping unresolvable product link");
            }
        }
    }

    if urls.is_empty() {
        return Err("No product links found on catalogue page".to_string());
    }

    Ok(urls)
}

/// Reads the total page count from the catalogue pager
///
/// The pager renders as "Page X of N". Single-page catalogues have no pager
/// element at all, so a missing or unparsable pager means one page.
pub fn total_pages(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let selector = Selector::parse("li.current").unwrap();

    document
        .select(&selector)
        .next()
        .and_then(|pager| {
            let text = pager.text().collect::<String>();
            text.trim()
                .rsplit(' ')
                .next()
                .and_then(|n| n.parse::<u32>().ok())
        })
        .unwrap_or(1)
}
