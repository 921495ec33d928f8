use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::DetailError;
use crate::models::{AttractionDetails, Location};
use crate::requests::PageFetcher;
use crate::tree_search::TreeSearch;

/// Looks up an attraction's location, review count and number of review pages.
#[async_trait]
pub trait DetailExtractor: Send + Sync {
    async fn details(&self, url: &str) -> Result<AttractionDetails, DetailError>;
}

/// Reads attraction details from the schema.org JSON-LD block of the
/// attraction page.
pub struct HtmlDetailExtractor {
    fetcher: Arc<dyn PageFetcher>,
    reviews_per_page: usize,
}

const LD_JSON_SELECTOR: &str = r#"script[type="application/ld+json"]"#;
// No attraction comes anywhere near this many review pages.
const MAX_PAGES: usize = 1_000_000;

impl HtmlDetailExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, reviews_per_page: usize) -> Self {
        Self {
            fetcher,
            reviews_per_page: reviews_per_page.max(1),
        }
    }

    pub fn parse_details(&self, html: &str, url: &str) -> Result<AttractionDetails, DetailError> {
        let selector = Selector::parse(LD_JSON_SELECTOR).map_err(|e| DetailError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let document = Html::parse_document(html);
        let blocks: Vec<Value> = document
            .select(&selector)
            .filter_map(|node| serde_json::from_str(&node.text().collect::<String>()).ok())
            .collect();

        let num_reviews = blocks
            .iter()
            .flat_map(|block| TreeSearch::new(block, "aggregateRating"))
            .find_map(|rating| rating.get("reviewCount").and_then(as_count))
            .ok_or_else(|| DetailError::NotFound {
                url: url.to_string(),
            })?;
        let page_count = u64::try_from(num_reviews)
            .ok()
            .map(|count| count.div_ceil(self.reviews_per_page as u64))
            .and_then(|pages| usize::try_from(pages).ok())
            .filter(|&pages| pages <= MAX_PAGES)
            .ok_or_else(|| DetailError::Malformed {
                url: url.to_string(),
                reason: format!("implausible review count {num_reviews}"),
            })?;

        let location = blocks
            .iter()
            .flat_map(|block| TreeSearch::new(block, "geo"))
            .find_map(as_location);

        Ok(AttractionDetails {
            location,
            num_reviews,
            page_count,
        })
    }
}

#[async_trait]
impl DetailExtractor for HtmlDetailExtractor {
    async fn details(&self, url: &str) -> Result<AttractionDetails, DetailError> {
        let html = self.fetcher.fetch_text(url).await?;
        self.parse_details(&html, url)
    }
}

// Counts show up as numbers or as display strings like "12,345".
fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn as_coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_location(geo: &Value) -> Option<Location> {
    Some(Location {
        lat: geo.get("latitude").and_then(as_coordinate)?,
        lon: geo.get("longitude").and_then(as_coordinate)?,
    })
}
