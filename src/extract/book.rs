//! Detail page extraction

use crate::extract::{content_hash, BookCandidate};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Extracts a book candidate from a detail page
///
/// # Arguments
///
/// * `html` - The detail page HTML
/// * `page_url` - The detail page URL; becomes the record identity
///
/// # Returns
///
/// * `Ok(BookCandidate)` - All required fields were present
/// * `Err(String)` - What was missing or malformed
pub fn extract_book(html: &str, page_url: &str) -> Result<BookCandidate, String> {
    let base = Url::parse(page_url).map_err(|e| format!("Invalid page URL {}: {}", page_url, e))?;
    let document = Html::parse_document(html);

    let title = select_text(&document, ".product_main h1")
        .ok_or_else(|| "Missing title".to_string())?;

    let table = product_table(&document);
    let price_incl_tax = parse_price(
        table
            .get("Price (incl. tax)")
            .ok_or_else(|| "Missing price (incl. tax)".to_string())?,
    )?;
    let price_excl_tax = parse_price(
        table
            .get("Price (excl. tax)")
            .ok_or_else(|| "Missing price (excl. tax)".to_string())?,
    )?;
    let num_reviews = table
        .get("Number of reviews")
        .ok_or_else(|| "Missing review count".to_string())?
        .parse::<i64>()
        .map_err(|e| format!("Bad review count: {}", e))?;

    let availability = select_text(&document, ".product_main .availability")
        .ok_or_else(|| "Missing availability".to_string())?;

    let category = {
        let selector = Selector::parse("ul.breadcrumb li a").unwrap();
        document
            .select(&selector)
            .last()
            .map(element_text)
            .ok_or_else(|| "Missing breadcrumb category".to_string())?
    };

    let rating = {
        let selector = Selector::parse("p.star-rating").unwrap();
        document
            .select(&selector)
            .next()
            .and_then(star_rating_class)
            .ok_or_else(|| "Missing star rating".to_string())?
    };

    let image_url = {
        let selector = Selector::parse("div.item.active img").unwrap();
        let src = document
            .select(&selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .ok_or_else(|| "Missing cover image".to_string())?;
        base.join(src)
            .map_err(|e| format!("Bad image URL {}: {}", src, e))?
            .to_string()
    };

    // The description sits in the <p> following the section anchor; books
    // without a description simply omit the anchor.
    let description = select_text(&document, "#product_description + p");

    Ok(BookCandidate {
        source_url: page_url.to_string(),
        content_hash: content_hash(html),
        title,
        description,
        category,
        price_incl_tax,
        price_excl_tax,
        availability,
        num_reviews,
        rating,
        image_url,
    })
}

/// Collects the product information table into header -> value pairs
fn product_table(document: &Html) -> HashMap<String, String> {
    let row_selector = Selector::parse("table tr").unwrap();
    let th_selector = Selector::parse("th").unwrap();
    let td_selector = Selector::parse("td").unwrap();

    let mut table = HashMap::new();
    for row in document.select(&row_selector) {
        let header = row.select(&th_selector).next().map(element_text);
        let value = row.select(&td_selector).next().map(element_text);
        if let (Some(header), Some(value)) = (header, value) {
            table.insert(header, value);
        }
    }
    table
}

/// First match's text, whitespace-collapsed; None if absent or empty
fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).unwrap();
    let text = document.select(&selector).next().map(element_text)?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The rating word is carried as the second class, e.g. `star-rating Three`
fn star_rating_class(element: ElementRef<'_>) -> Option<String> {
    element
        .value()
        .classes()
        .find(|class| *class != "star-rating")
        .map(str::to_string)
}

/// Parses a price like `£51.77`, tolerating any currency prefix
fn parse_price(raw: &str) -> Result<f64, String> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits
        .parse::<f64>()
        .map_err(|_| format!("Bad price: {}", raw))
}
